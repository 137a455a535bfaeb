//! Swarm engine crate.
//!
//! Windowed GPU instance buffers and the draw commands that render them,
//! plus the platform + GPU runtime used to drive them.
//!
//! - [`instancing`]: layout planning, mirror, upload and draw synthesis
//! - [`backend`]: the render backend contract and its headless/wgpu backends
//! - [`window`], [`device`], [`core`], [`time`], [`render`]: runtime loop

pub mod backend;
pub mod instancing;

pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
