//! Windowed demo: both managers rendered through the wgpu backend.

use anyhow::Result;
use glam::Vec3;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowId;

use swarm_engine::backend::gpu::{self, MaterialDesc, MeshData, View, WgpuBackend};
use swarm_engine::core::{App, AppControl, FrameCtx};
use swarm_engine::device::Gpu;

use crate::config::DemoConfig;
use crate::swarm::Swarm;

const REPORT_INTERVAL: f64 = 2.0;

struct GpuState {
    backend: WgpuBackend,
    swarm: Swarm,
}

impl GpuState {
    fn new(gpu: &Gpu<'_>, config: &DemoConfig) -> Result<Self> {
        let kind = gpu::select_buffer_kind(
            &gpu.limits(),
            gpu.supports_vertex_storage(),
            config.buffer_kind.into(),
        );
        let mut backend = WgpuBackend::new(gpu.device().clone(), gpu.queue().clone(), kind);

        let cell_mesh = MeshData::ground_quad("cell", 1.0);
        let cell_material = MaterialDesc::new("cell").with_ambient(0.6);
        let debris_mesh = MeshData::cube("debris", 0.5);
        let debris_material = MaterialDesc::new("debris").with_ambient(0.2);

        let swarm = Swarm::init(
            &mut backend,
            config,
            &cell_mesh,
            &cell_material,
            &debris_mesh,
            &debris_material,
        )?;
        Ok(Self { backend, swarm })
    }
}

pub struct SwarmApp {
    config: DemoConfig,
    state: Option<GpuState>,
    next_report: f64,
}

impl SwarmApp {
    pub fn new(config: DemoConfig) -> Self {
        Self {
            config,
            state: None,
            next_report: REPORT_INTERVAL,
        }
    }
}

impl App for SwarmApp {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.state.is_none() {
            match GpuState::new(ctx.gpu, &self.config) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    log::error!("{e:#}");
                    return AppControl::Exit;
                }
            }
        }
        let Some(state) = self.state.as_mut() else {
            return AppControl::Exit;
        };

        let counts = match state.swarm.update(&mut state.backend, &ctx.time) {
            Ok(c) => c,
            Err(e) => {
                log::error!("{e:#}");
                return AppControl::Exit;
            }
        };

        let size = ctx.gpu.size();
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        let radius = state.swarm.grid_half_extent() * 1.6;
        let angle = ctx.time.elapsed as f32 * 0.08;
        let eye = Vec3::new(angle.cos() * radius, radius * 0.55, angle.sin() * radius);
        let view = View::look_at(eye, Vec3::ZERO, 45f32.to_radians(), aspect);

        let (backend, swarm) = (&mut state.backend, &state.swarm);
        let mut stats = None;
        let control = ctx.render(|rctx, target| {
            stats = Some(backend.render_frame(rctx, target, &view, &swarm.sources()));
        });

        if ctx.time.elapsed >= self.next_report {
            self.next_report = ctx.time.elapsed + REPORT_INTERVAL;
            let stats = stats.unwrap_or_default();
            log::info!(
                "{:.1} fps: {} cells, {} fragments, {} draws",
                1.0 / ctx.time.dt.max(1e-6),
                counts.cells,
                counts.fragments,
                stats.draw_calls
            );
        }
        control
    }

    fn on_shutdown(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.swarm.shutdown(&mut state.backend);
            log::info!("instance managers shut down");
        }
    }
}
