//! Per-frame rendering handles.
//!
//! Backends receive a [`RenderCtx`] describing the surface and a
//! [`RenderTarget`] to record into. Both are only valid for one frame.

mod ctx;

pub use ctx::{RenderCtx, RenderTarget};
