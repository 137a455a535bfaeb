//! Core engine-facing contracts.
//!
//! The interface between the runtime (platform loop) and applications: an
//! [`App`] trait driven once per frame, and a [`FrameCtx`] that hands out a
//! render target for the window being drawn.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
