use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{
    Aabb, AttributeDesc, BatchDesc, BatchHandle, BufferHandle, MaterialHandle, MeshHandle,
    RenderBackend,
};

use super::arena::FrameScope;
use super::commands::{DrawCommandSource, DrawOutput, FilterSettings, MotionVectorMode, ShadowCasting};
use super::layout::{BufferKind, INSTANCE_RECORD_SIZE, InstanceField, WindowLayout, round_up};
use super::mirror::{MirrorBuffer, MirrorView};
use super::synth::{self, SynthInput};
use super::upload::UploadPlan;
use super::InstancingError;

/// Construction parameters for an [`InstanceManager`].
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Used in log messages.
    pub label: String,
    pub max_instances: u32,
    /// Bytes per instance used for window capacity. At least 112.
    pub record_size: u64,
    /// Overrides the backend's preferred buffer kind.
    pub buffer_kind: Option<BufferKind>,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub layer_mask: u32,
    pub motion_vectors: MotionVectorMode,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            label: "instances".to_string(),
            max_instances: 1024,
            record_size: INSTANCE_RECORD_SIZE,
            buffer_kind: None,
            cast_shadows: false,
            receive_shadows: true,
            layer_mask: 1,
            motion_vectors: MotionVectorMode::Camera,
        }
    }
}

impl InstanceConfig {
    pub fn new(label: impl Into<String>, max_instances: u32) -> Self {
        Self {
            label: label.into(),
            max_instances,
            ..Self::default()
        }
    }

    fn filter(&self) -> FilterSettings {
        FilterSettings {
            layer_mask: self.layer_mask,
            shadow_casting: if self.cast_shadows { ShadowCasting::On } else { ShadowCasting::Off },
            receive_shadows: self.receive_shadows,
            motion_vectors: self.motion_vectors,
            depth_sorted: false,
        }
    }
}

/// Owns one windowed instance buffer for a single mesh/material pair.
///
/// Frame protocol:
/// 1. producers write instances through [`mirror_mut`](Self::mirror_mut)
/// 2. the caller commits them with [`upload`](Self::upload)
/// 3. the backend pulls draw commands via [`DrawCommandSource`]
///
/// Upload takes `&mut self` and synthesis `&self`, so a synthesis pass can
/// never observe a half-applied upload.
///
/// Backend resources are not released on drop; call
/// [`shutdown`](Self::shutdown) with the backend that created them.
#[derive(Debug)]
pub struct InstanceManager {
    label: String,
    kind: BufferKind,
    layout: WindowLayout,
    filter: FilterSettings,

    buffer: BufferHandle,
    batches: Vec<BatchHandle>,
    mesh: MeshHandle,
    material: MaterialHandle,

    mirror: MirrorBuffer,
    instance_count: u32,
    initialized: bool,
    warned_uninitialized: AtomicBool,
}

impl InstanceManager {
    /// Plans the layout and registers every backend resource.
    ///
    /// Nothing is registered when planning or allocation fails.
    pub fn init<B: RenderBackend>(
        backend: &mut B,
        mesh: &B::Mesh,
        material: &B::Material,
        config: InstanceConfig,
    ) -> Result<Self, InstancingError> {
        let kind = config.buffer_kind.unwrap_or_else(|| backend.buffer_kind());
        let layout = WindowLayout::plan(config.max_instances, config.record_size, kind)?;

        let granularity = backend.allocation_granularity().max(1);
        let buffer = backend.create_buffer(round_up(layout.total_buffer_size, granularity), kind)?;
        let mirror = MirrorBuffer::zeroed(layout.total_buffer_size);

        let attributes = InstanceField::ALL.map(|field| AttributeDesc {
            field,
            offset: field.base_offset(layout.capacity_per_window),
            per_instance: true,
        });

        let batches = (0..layout.window_count)
            .map(|window| {
                backend.register_batch(&BatchDesc {
                    attributes,
                    buffer,
                    kind,
                    offset: layout.window_offset(window),
                    window_size: layout.aligned_window_size,
                    capacity: layout.capacity_per_window,
                    bounds: Aabb::INFINITE,
                })
            })
            .collect();

        let mesh = backend.register_mesh(mesh);
        let material = backend.register_material(material);

        log::info!(
            "{}: {} windows x {} instances ({} bytes, {:?})",
            config.label,
            layout.window_count,
            layout.capacity_per_window,
            layout.total_buffer_size,
            kind
        );

        Ok(Self {
            filter: config.filter(),
            label: config.label,
            kind,
            layout,
            buffer,
            batches,
            mesh,
            material,
            mirror,
            instance_count: 0,
            initialized: true,
            warned_uninitialized: AtomicBool::new(false),
        })
    }

    /// Releases batches, material, mesh, GPU buffer and mirror, in that order.
    ///
    /// Subsequent calls are no-ops.
    pub fn shutdown<B: RenderBackend>(&mut self, backend: &mut B) {
        if !self.initialized {
            return;
        }

        for batch in self.batches.drain(..) {
            backend.remove_batch(batch);
        }
        backend.unregister_material(self.material);
        backend.unregister_mesh(self.mesh);
        backend.destroy_buffer(self.buffer);
        self.mirror = MirrorBuffer::default();

        self.instance_count = 0;
        self.initialized = false;
        log::debug!("{}: shut down", self.label);
    }

    /// Publishes the first `instance_count` mirror instances to the GPU.
    ///
    /// Over-capacity requests fail without touching any state.
    pub fn upload<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        instance_count: u32,
    ) -> Result<UploadPlan, InstancingError> {
        if !self.initialized {
            return Err(InstancingError::NotInitialized);
        }
        if instance_count > self.layout.max_instances {
            return Err(InstancingError::OverCapacity {
                requested: instance_count,
                max: self.layout.max_instances,
            });
        }

        self.instance_count = instance_count;

        let plan = UploadPlan::new(&self.layout, instance_count);
        for copy in plan.copies() {
            backend.write_buffer(self.buffer, copy.offset, self.mirror.bytes(copy.offset, copy.len));
        }

        log::trace!(
            "{}: uploaded {} instances in {} copies ({} bytes)",
            self.label,
            instance_count,
            plan.copy_count(),
            plan.bytes()
        );
        Ok(plan)
    }

    /// Writable mirror for producers. Empty after shutdown.
    pub fn mirror_mut(&mut self) -> MirrorView<'_> {
        MirrorView::new(&mut self.mirror, &self.layout)
    }

    /// Read-only mirror bytes.
    #[inline]
    pub fn mirror(&self) -> &MirrorBuffer {
        &self.mirror
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    #[inline]
    pub fn max_instances(&self) -> u32 {
        self.layout.max_instances
    }

    #[inline]
    pub fn layout(&self) -> &WindowLayout {
        &self.layout
    }

    #[inline]
    pub fn buffer_kind(&self) -> BufferKind {
        self.kind
    }

    #[inline]
    pub fn filter(&self) -> FilterSettings {
        self.filter
    }

    #[inline]
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    #[inline]
    pub fn batches(&self) -> &[BatchHandle] {
        &self.batches
    }

    #[inline]
    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    #[inline]
    pub fn material(&self) -> MaterialHandle {
        self.material
    }
}

impl DrawCommandSource for InstanceManager {
    fn synthesize<'s>(&self, scope: &'s mut FrameScope<'_>) -> DrawOutput<'s> {
        if !self.initialized {
            if !self.warned_uninitialized.swap(true, Ordering::Relaxed) {
                log::warn!("{}: draw commands requested after shutdown; emitting none", self.label);
            }
            return DrawOutput::empty();
        }

        let input = SynthInput {
            instance_count: self.instance_count,
            capacity_per_window: self.layout.capacity_per_window,
            batches: &self.batches,
            mesh: self.mesh,
            material: self.material,
            filter: self.filter,
        };
        synth::synthesize(&input, scope)
    }
}

impl Drop for InstanceManager {
    fn drop(&mut self) {
        if self.initialized {
            log::warn!("{}: dropped without shutdown; backend resources leak", self.label);
        }
    }
}
