//! Runs the producers against the system-memory backend, no window needed.

use std::time::{Duration, Instant};

use anyhow::Result;
use swarm_engine::backend::headless::HeadlessBackend;
use swarm_engine::time::FrameClock;

use crate::config::{BufferKindSetting, DemoConfig};
use crate::swarm::Swarm;

/// Uniform window size emulated when the config does not ask for storage
/// buffers; matches the common 64 KiB uniform binding limit.
pub const HEADLESS_WINDOW_LIMIT: u64 = 64 * 1024;

const STEP_MICROS: u64 = 16_667;
const STEP: Duration = Duration::from_micros(STEP_MICROS);

/// Simulated time between the run's start and `frame`.
fn frame_offset(frame: u64) -> Duration {
    Duration::from_micros(STEP_MICROS.saturating_mul(frame))
}

pub fn run(config: &DemoConfig, frames: u64) -> Result<()> {
    let mut backend = match config.buffer_kind {
        BufferKindSetting::Unbounded => HeadlessBackend::unbounded(),
        BufferKindSetting::Auto | BufferKindSetting::Bounded => {
            HeadlessBackend::bounded(HEADLESS_WINDOW_LIMIT)
        }
    };

    let mut swarm = Swarm::init(
        &mut backend,
        config,
        &"cell-quad".to_string(),
        &"cell-material".to_string(),
        &"debris-cube".to_string(),
        &"debris-material".to_string(),
    )?;

    for m in swarm.managers() {
        let l = m.layout();
        log::info!(
            "{}: {} windows, {} per window, {} bytes",
            m.label(),
            l.window_count,
            l.capacity_per_window,
            l.total_buffer_size
        );
    }

    let mut clock = FrameClock::with_clamps(Duration::ZERO, STEP);
    let start = Instant::now();
    clock.tick_at(start);

    let mut result = Ok(());
    for frame in 1..=frames {
        let time = clock.tick_at(start + frame_offset(frame));
        let counts = match swarm.update(&mut backend, &time) {
            Ok(c) => c,
            Err(e) => {
                result = Err(e);
                break;
            }
        };
        let writes = backend.take_writes();
        let record = backend.render_frame(&swarm.sources());

        let commands: usize = record.sources.iter().map(|s| s.commands.len()).sum();
        let visible: u64 = record.sources.iter().map(|s| s.total_visible()).sum();
        if frame % 60 == 0 || frame == frames {
            log::info!(
                "frame {frame}: {} cells, {} fragments, {} copies, {commands} draws, {visible} visible",
                counts.cells,
                counts.fragments,
                writes.len()
            );
        }
    }

    swarm.shutdown(&mut backend);

    let stats = backend.arena_stats();
    log::info!(
        "arena: {} scopes, peak {} commands / {} visible",
        stats.scopes_opened,
        stats.peak_commands,
        stats.peak_visible
    );
    if backend.live_buffers() + backend.live_batches() + backend.live_meshes() + backend.live_materials() != 0 {
        log::warn!("backend resources still registered after shutdown");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_offsets_are_fixed_steps() {
        assert_eq!(frame_offset(0), Duration::ZERO);
        assert_eq!(frame_offset(1), STEP);
        assert_eq!(frame_offset(60), STEP * 60);
    }

    #[test]
    fn frame_offsets_do_not_wrap_past_u32() {
        let frame = u32::MAX as u64 + 2;
        assert_eq!(frame_offset(frame), Duration::from_micros(STEP_MICROS * frame));
        assert!(frame_offset(frame) > frame_offset(u32::MAX as u64));
    }
}
