//! Render backend contract.
//!
//! The instance manager never talks to a graphics API directly. It programs a
//! backend through [`RenderBackend`]: one buffer allocation, one batch per
//! window, one mesh and one material registration. The backend later pulls
//! draw commands from a [`DrawCommandSource`](crate::instancing::DrawCommandSource)
//! once per frame.
//!
//! Two implementations ship with the crate:
//! - [`headless::HeadlessBackend`]: system-memory buffers, records every call
//! - [`gpu::WgpuBackend`]: uniform/storage buffers on a wgpu device

pub mod headless;
pub mod gpu;

use crate::instancing::{BufferKind, InstanceField};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Opaque GPU buffer handle.
    BufferHandle
);
handle!(
    /// Opaque handle to one registered window batch.
    BatchHandle
);
handle!(
    /// Opaque mesh registration handle.
    MeshHandle
);
handle!(
    /// Opaque material registration handle.
    MaterialHandle
);

/// Backend failures surfaced to the manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("buffer of {size} bytes exceeds the backend limit of {limit} bytes")]
    BufferTooLarge { size: u64, limit: u64 },
}

/// Where one instance field lives inside a window.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttributeDesc {
    pub field: InstanceField,
    /// Byte offset of the field array relative to the window start.
    pub offset: u64,
    /// Advances once per instance rather than per vertex.
    pub per_instance: bool,
}

/// Axis-aligned bounds handed to the backend for coarse culling.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub center: [f32; 3],
    pub extents: [f32; 3],
}

impl Aabb {
    /// Bounds no backend will ever cull.
    pub const INFINITE: Aabb = Aabb {
        center: [0.0; 3],
        extents: [f32::MAX; 3],
    };

    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.extents.iter().all(|e| *e == f32::MAX)
    }
}

/// One window of the shared instance buffer, registered as its own batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDesc {
    pub attributes: [AttributeDesc; 3],
    pub buffer: BufferHandle,
    pub kind: BufferKind,
    /// Byte offset of the window within `buffer`.
    pub offset: u64,
    /// Window stride in bytes.
    pub window_size: u64,
    pub capacity: u32,
    pub bounds: Aabb,
}

/// Operations the instance manager needs from a renderer.
///
/// Buffer writes use byte offsets into the buffer returned by
/// [`create_buffer`](Self::create_buffer); offsets and lengths are always
/// multiples of 16.
pub trait RenderBackend {
    /// Backend-specific mesh description.
    type Mesh;
    /// Backend-specific material description.
    type Material;

    /// How this backend exposes instance data to shaders.
    fn buffer_kind(&self) -> BufferKind;

    /// Buffer sizes are rounded up to a multiple of this.
    fn allocation_granularity(&self) -> u64;

    fn create_buffer(&mut self, size: u64, kind: BufferKind) -> Result<BufferHandle, BackendError>;
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn register_batch(&mut self, desc: &BatchDesc) -> BatchHandle;
    fn remove_batch(&mut self, batch: BatchHandle);

    fn register_mesh(&mut self, mesh: &Self::Mesh) -> MeshHandle;
    fn unregister_mesh(&mut self, mesh: MeshHandle);

    fn register_material(&mut self, material: &Self::Material) -> MaterialHandle;
    fn unregister_material(&mut self, material: MaterialHandle);
}
