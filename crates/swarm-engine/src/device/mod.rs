//! GPU device + surface management.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue for a window, keeps the
//! surface configured across resizes and hands out one encoder per frame.
//! Device capabilities relevant to instance buffers are exposed so callers
//! can pick a buffer kind.

mod gpu;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
