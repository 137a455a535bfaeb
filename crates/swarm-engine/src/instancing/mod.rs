//! Windowed instance buffers.
//!
//! An [`InstanceManager`] keeps every instance of one mesh/material pair in a
//! single GPU buffer, split into windows the backend can address. Producers
//! fill a system-memory mirror, [`InstanceManager::upload`] copies the live
//! prefix, and the backend pulls one draw command per window through
//! [`DrawCommandSource`].
//!
//! Layout of the mirror and the GPU buffer is identical:
//! - `layout`: window sizing and SoA field offsets
//! - `mirror`: producer-facing writable view
//! - `upload`: bulk + per-field tail copies
//! - `synth` / `arena`: draw commands in frame-scoped scratch memory

mod arena;
mod commands;
mod error;
mod layout;
mod manager;
mod mirror;
mod synth;
mod upload;

pub use arena::{ArenaStats, FrameAlloc, FrameArena, FrameScope};
pub use commands::{
    DrawCommand, DrawCommandSource, DrawOutput, DrawRange, FilterSettings, MotionVectorMode,
    ShadowCasting,
};
pub use error::InstancingError;
pub use layout::{BufferKind, FLOAT4_SIZE, INSTANCE_RECORD_SIZE, InstanceField, WindowLayout};
pub use manager::{InstanceConfig, InstanceManager};
pub use mirror::{Float4, InstanceRecord, MirrorBuffer, MirrorView};
pub use synth::{SynthInput, synthesize};
pub use upload::{CopyRange, UploadPlan};
