use glam::{Affine3A, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use swarm_engine::instancing::{InstanceRecord, MirrorView};

use crate::config::BurstSettings;

const RESTITUTION: f32 = 0.4;
const GROUND_FRICTION: f32 = 0.8;

#[derive(Debug, Copy, Clone)]
struct Fragment {
    position: Vec3,
    velocity: Vec3,
    rotation: Quat,
    /// Axis scaled by angular speed (rad/s).
    spin: Vec3,
    scale: f32,
    color: [f32; 3],
    age: f32,
    lifetime: f32,
}

impl Fragment {
    fn record(&self) -> InstanceRecord {
        let life = (self.age / self.lifetime).clamp(0.0, 1.0);
        // Shrink over the last fifth of the lifetime.
        let fade = ((1.0 - life) * 5.0).min(1.0);
        let transform = Affine3A::from_scale_rotation_translation(
            Vec3::splat(self.scale * fade),
            self.rotation,
            self.position,
        );
        let [r, g, b] = self.color;
        InstanceRecord::from_affine(transform, [r, g, b, fade])
    }
}

/// Debris bursts thrown up from random points, falling under gravity and
/// expiring after their lifetime.
pub struct FragmentBurst {
    settings: BurstSettings,
    fragments: Vec<Fragment>,
    rng: StdRng,
    spawn_accum: f32,
    half_extent: f32,
}

impl FragmentBurst {
    /// Bursts spawn inside `[-half_extent, half_extent]` on X and Z.
    pub fn new(settings: BurstSettings, seed: u64, half_extent: f32) -> Self {
        Self {
            fragments: Vec::with_capacity(settings.max_fragments as usize),
            settings,
            rng: StdRng::seed_from_u64(seed),
            spawn_accum: 0.0,
            half_extent: half_extent.max(0.0),
        }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.fragments.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn max_fragments(&self) -> u32 {
        self.settings.max_fragments
    }

    /// Spawns one burst at `origin`; returns how many fragments fit.
    pub fn spawn_burst(&mut self, origin: Vec3) -> u32 {
        let room = self.settings.max_fragments.saturating_sub(self.len());
        let count = self.settings.fragments_per_burst.min(room);

        let hue = self.rng.random_range(0.0..1.0f32);
        for _ in 0..count {
            let dir = Vec3::new(
                self.rng.random_range(-1.0f32..1.0),
                self.rng.random_range(0.6f32..1.0),
                self.rng.random_range(-1.0f32..1.0),
            )
            .normalize_or(Vec3::Y);
            let speed = self.rng.random_range(3.0f32..9.0);
            let axis = Vec3::new(
                self.rng.random_range(-1.0f32..1.0),
                self.rng.random_range(-1.0f32..1.0),
                self.rng.random_range(-1.0f32..1.0),
            )
            .normalize_or(Vec3::X);
            let jitter = self.rng.random_range(-0.08f32..0.08);

            self.fragments.push(Fragment {
                position: origin,
                velocity: dir * speed,
                rotation: Quat::IDENTITY,
                spin: axis * self.rng.random_range(2.0f32..10.0),
                scale: self.rng.random_range(0.08f32..0.22),
                color: hue_color(hue + jitter),
                age: 0.0,
                lifetime: self.settings.lifetime * self.rng.random_range(0.6f32..1.0),
            });
        }
        count
    }

    /// Advances the simulation by `dt` seconds, spawning bursts at the
    /// configured rate and dropping expired fragments.
    pub fn step(&mut self, dt: f32) {
        self.spawn_accum += dt * self.settings.bursts_per_second;
        while self.spawn_accum >= 1.0 {
            self.spawn_accum -= 1.0;
            let h = self.half_extent;
            let origin = if h > 0.0 {
                Vec3::new(self.rng.random_range(-h..h), 0.0, self.rng.random_range(-h..h))
            } else {
                Vec3::ZERO
            };
            self.spawn_burst(origin);
        }

        let gravity = self.settings.gravity;
        for f in &mut self.fragments {
            f.age += dt;
            f.velocity.y -= gravity * dt;
            f.position += f.velocity * dt;

            let floor = 0.5 * f.scale;
            if f.position.y < floor {
                f.position.y = floor;
                f.velocity.y = -f.velocity.y * RESTITUTION;
                f.velocity.x *= GROUND_FRICTION;
                f.velocity.z *= GROUND_FRICTION;
                f.spin *= GROUND_FRICTION;
            }
            f.rotation = (Quat::from_scaled_axis(f.spin * dt) * f.rotation).normalize();
        }
        self.fragments.retain(|f| f.age < f.lifetime);
    }

    /// Writes up to `limit` fragments and returns how many were written.
    pub fn write(&self, view: &mut MirrorView<'_>, limit: u32) -> u32 {
        let n = self.len().min(limit).min(view.slot_count());
        for (i, f) in self.fragments.iter().take(n as usize).enumerate() {
            view.write(i as u32, &f.record());
        }
        n
    }
}

fn hue_color(h: f32) -> [f32; 3] {
    let h = h.rem_euclid(1.0) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [r, g, b]
}
