//! The two instance managers and the producers that feed them.

use anyhow::{Context, Result};
use swarm_engine::backend::RenderBackend;
use swarm_engine::instancing::{DrawCommandSource, InstanceConfig, InstanceManager, MotionVectorMode};
use swarm_engine::time::FrameTime;

use crate::config::DemoConfig;
use crate::producers::{CellGrid, FragmentBurst};

pub const GRID_LAYER: u32 = 1 << 0;
pub const DEBRIS_LAYER: u32 = 1 << 1;

/// Instances published by one [`Swarm::update`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SwarmCounts {
    pub cells: u32,
    pub fragments: u32,
}

/// Ground grid plus debris, each in its own manager.
pub struct Swarm {
    grid: CellGrid,
    bursts: FragmentBurst,
    cells: InstanceManager,
    debris: InstanceManager,
}

impl Swarm {
    pub fn init<B: RenderBackend>(
        backend: &mut B,
        config: &DemoConfig,
        cell_mesh: &B::Mesh,
        cell_material: &B::Material,
        debris_mesh: &B::Mesh,
        debris_material: &B::Material,
    ) -> Result<Self> {
        let grid = CellGrid::new(&config.grid);
        let bursts = FragmentBurst::new(config.bursts.clone(), config.seed, grid.half_extent() * 0.8);

        let cells = InstanceManager::init(
            backend,
            cell_mesh,
            cell_material,
            InstanceConfig {
                layer_mask: GRID_LAYER,
                motion_vectors: MotionVectorMode::ForceNone,
                ..InstanceConfig::new("cells", grid.len())
            },
        )
        .context("failed to create cell instances")?;

        let debris = match InstanceManager::init(
            backend,
            debris_mesh,
            debris_material,
            InstanceConfig {
                layer_mask: DEBRIS_LAYER,
                cast_shadows: true,
                motion_vectors: MotionVectorMode::Object,
                ..InstanceConfig::new("debris", bursts.max_fragments())
            },
        ) {
            Ok(m) => m,
            Err(e) => {
                let mut cells = cells;
                cells.shutdown(backend);
                return Err(e).context("failed to create debris instances");
            }
        };

        Ok(Self {
            grid,
            bursts,
            cells,
            debris,
        })
    }

    /// Steps the producers, rewrites both mirrors and uploads them.
    pub fn update<B: RenderBackend>(&mut self, backend: &mut B, time: &FrameTime) -> Result<SwarmCounts> {
        self.bursts.step(time.dt);

        let limit = self.cells.max_instances();
        let cells = self.grid.write(&mut self.cells.mirror_mut(), limit, time.elapsed as f32);
        self.cells.upload(backend, cells)?;

        let limit = self.debris.max_instances();
        let fragments = self.bursts.write(&mut self.debris.mirror_mut(), limit);
        self.debris.upload(backend, fragments)?;

        Ok(SwarmCounts { cells, fragments })
    }

    pub fn sources(&self) -> [&dyn DrawCommandSource; 2] {
        [&self.cells, &self.debris]
    }

    pub fn grid_half_extent(&self) -> f32 {
        self.grid.half_extent()
    }

    pub fn managers(&self) -> [&InstanceManager; 2] {
        [&self.cells, &self.debris]
    }

    pub fn shutdown<B: RenderBackend>(&mut self, backend: &mut B) {
        self.debris.shutdown(backend);
        self.cells.shutdown(backend);
    }
}
