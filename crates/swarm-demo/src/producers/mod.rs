//! Instance producers: CPU-side simulations that fill a manager's mirror.

mod burst;
mod grid;

pub use burst::FragmentBurst;
pub use grid::CellGrid;
