use glam::{Affine3A, Quat, Vec3};
use swarm_engine::instancing::{InstanceRecord, MirrorView};

use crate::config::GridSettings;

const TEAL: [f32; 3] = [0.10, 0.55, 0.60];
const AMBER: [f32; 3] = [0.95, 0.60, 0.15];

/// Flat ground cells that pulse in a ring travelling out from the center.
#[derive(Debug, Clone)]
pub struct CellGrid {
    columns: u32,
    rows: u32,
    spacing: f32,
}

impl CellGrid {
    pub fn new(settings: &GridSettings) -> Self {
        Self {
            columns: settings.columns.max(1),
            rows: settings.rows.max(1),
            spacing: settings.spacing,
        }
    }

    pub fn len(&self) -> u32 {
        self.columns.saturating_mul(self.rows)
    }

    /// Half the grid's width along X.
    pub fn half_extent(&self) -> f32 {
        0.5 * self.columns.max(self.rows) as f32 * self.spacing
    }

    pub fn record(&self, index: u32, t: f32) -> InstanceRecord {
        let col = index % self.columns;
        let row = index / self.columns;
        let x = (col as f32 - 0.5 * (self.columns - 1) as f32) * self.spacing;
        let z = (row as f32 - 0.5 * (self.rows - 1) as f32) * self.spacing;

        let dist = (x * x + z * z).sqrt();
        let wave = 0.5 + 0.5 * (dist * 0.35 - t * 2.5).sin();

        let size = 0.5 * self.spacing * (0.75 + 0.2 * wave);
        let transform = Affine3A::from_scale_rotation_translation(
            Vec3::new(size, 1.0, size),
            Quat::IDENTITY,
            Vec3::new(x, 0.02 * wave, z),
        );

        let mix = |a: f32, b: f32| a + (b - a) * wave;
        let color = [mix(TEAL[0], AMBER[0]), mix(TEAL[1], AMBER[1]), mix(TEAL[2], AMBER[2]), 1.0];
        InstanceRecord::from_affine(transform, color)
    }

    /// Writes up to `limit` cells and returns how many were written.
    pub fn write(&self, view: &mut MirrorView<'_>, limit: u32, t: f32) -> u32 {
        let n = self.len().min(limit).min(view.slot_count());
        for i in 0..n {
            view.write(i, &self.record(i, t));
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(columns: u32, rows: u32) -> CellGrid {
        CellGrid::new(&GridSettings {
            columns,
            rows,
            spacing: 2.0,
        })
    }

    #[test]
    fn grid_is_centered() {
        let g = grid(3, 3);
        let center = g.record(4, 0.0);
        assert_eq!(center.object_to_world[0][3], 0.0);
        assert_eq!(center.object_to_world[2][3], 0.0);

        let corner = g.record(0, 0.0);
        assert_eq!(corner.object_to_world[0][3], -2.0);
        assert_eq!(corner.object_to_world[2][3], -2.0);
    }

    #[test]
    fn cells_stay_opaque_and_flat() {
        let g = grid(4, 5);
        for i in 0..g.len() {
            let r = g.record(i, 1.3);
            assert_eq!(r.color[3], 1.0);
            // Y axis keeps unit scale.
            assert_eq!(r.object_to_world[1][1], 1.0);
        }
    }

    #[test]
    fn len_saturates() {
        assert_eq!(grid(u32::MAX, 2).len(), u32::MAX);
        assert_eq!(grid(7, 3).len(), 21);
    }
}
