//! wgpu renderer for windowed instance buffers.
//!
//! Bounded buffers are bound one uniform window at a time; unbounded buffers
//! are a single read-only storage buffer. Each registered batch owns a bind
//! group covering its window, so a draw command maps to exactly one
//! `draw_indexed` whose instance range selects entries of the frame's
//! visibility list.

mod material;
mod mesh;
mod pipeline;
mod view;

use std::collections::HashMap;

use winit::dpi::PhysicalSize;

use crate::instancing::{BufferKind, DrawCommandSource, FLOAT4_SIZE, FrameArena};
use crate::render::{RenderCtx, RenderTarget};

use super::{
    BackendError, BatchDesc, BatchHandle, BufferHandle, MaterialHandle, MeshHandle, RenderBackend,
};

use self::material::GpuMaterial;
use self::mesh::GpuMesh;
use self::pipeline::{DEPTH_FORMAT, Layouts, PipelineKey};

pub use material::MaterialDesc;
pub use mesh::{MeshData, MeshVertex};
pub use view::View;

/// Which binding model [`select_buffer_kind`] should pick.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum BufferPreference {
    /// Storage buffers when the device can read them from the vertex stage.
    #[default]
    Auto,
    Bounded,
    Unbounded,
}

/// Upper bound on a uniform window. Some drivers report multi-gigabyte
/// uniform bindings; the window is also a fixed-size shader array.
pub const MAX_UNIFORM_WINDOW: u64 = 64 * 1024;

/// Largest uniform window the device can bind at aligned offsets.
pub fn uniform_window_limit(limits: &wgpu::Limits) -> u64 {
    let align = (limits.min_uniform_buffer_offset_alignment as u64).max(FLOAT4_SIZE);
    let binding = (limits.max_uniform_buffer_binding_size as u64).min(MAX_UNIFORM_WINDOW);
    binding / align * align
}

/// Resolves a [`BufferPreference`] against device capabilities.
///
/// `vertex_storage` is whether the adapter supports storage buffers in the
/// vertex stage.
pub fn select_buffer_kind(
    limits: &wgpu::Limits,
    vertex_storage: bool,
    preference: BufferPreference,
) -> BufferKind {
    let bounded = BufferKind::Bounded {
        window_byte_limit: uniform_window_limit(limits),
    };
    let storage_ok = vertex_storage && limits.max_storage_buffers_per_shader_stage > 0;

    match preference {
        BufferPreference::Bounded => bounded,
        BufferPreference::Unbounded if storage_ok => BufferKind::Unbounded,
        BufferPreference::Unbounded => {
            log::warn!("storage buffers unavailable in the vertex stage; using uniform windows");
            bounded
        }
        BufferPreference::Auto if storage_ok => BufferKind::Unbounded,
        BufferPreference::Auto => bounded,
    }
}

/// Counters for one [`WgpuBackend::render_frame`] call.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub sources: u32,
    pub draw_calls: u32,
    pub instances: u64,
    /// Ranges skipped because their layer mask missed the view's culling mask.
    pub culled_ranges: u32,
}

struct GpuBatch {
    bind_group: wgpu::BindGroup,
    kind: BufferKind,
    capacity: u32,
    window_size: u64,
}

struct DepthTarget {
    size: PhysicalSize<u32>,
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

#[derive(Debug, Copy, Clone)]
struct PendingDraw {
    key: PipelineKey,
    batch: BatchHandle,
    mesh: MeshHandle,
    material: MaterialHandle,
    first_slot: u32,
    slot_count: u32,
}

/// [`RenderBackend`] on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    kind: BufferKind,
    max_buffer_size: u64,
    max_storage_binding_size: u64,

    layouts: Layouts,
    camera_ubo: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    next_id: u32,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    batches: HashMap<BatchHandle, GpuBatch>,
    meshes: HashMap<MeshHandle, GpuMesh>,
    materials: HashMap<MaterialHandle, GpuMaterial>,

    slot_vbo: Option<wgpu::Buffer>,
    slot_capacity: usize,
    depth: Option<DepthTarget>,

    arena: FrameArena,
    draws: Vec<PendingDraw>,
    slots: Vec<u32>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, kind: BufferKind) -> Self {
        let limits = device.limits();
        let layouts = Layouts::new(&device);

        let camera_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("swarm camera ubo"),
            size: std::mem::size_of::<view::CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("swarm camera bind group"),
            layout: &layouts.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_ubo.as_entire_binding(),
            }],
        });

        log::info!("wgpu instance backend: {kind:?}");

        Self {
            device,
            queue,
            kind,
            max_buffer_size: limits.max_buffer_size,
            max_storage_binding_size: limits.max_storage_buffer_binding_size as u64,
            layouts,
            camera_ubo,
            camera_bind_group,
            pipelines: HashMap::new(),
            next_id: 0,
            buffers: HashMap::new(),
            batches: HashMap::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            slot_vbo: None,
            slot_capacity: 0,
            depth: None,
            arena: FrameArena::new(),
            draws: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Pulls draw commands from every source and records one render pass.
    ///
    /// The pass clears color and depth, so an empty frame still presents the
    /// clear color.
    pub fn render_frame(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        view: &View,
        sources: &[&dyn DrawCommandSource],
    ) -> FrameStats {
        let mut stats = FrameStats {
            sources: sources.len() as u32,
            ..FrameStats::default()
        };

        self.draws.clear();
        self.slots.clear();
        {
            let mut scope = self.arena.scope();
            for source in sources {
                let out = source.synthesize(&mut scope);
                let base = self.slots.len() as u32;
                self.slots.extend_from_slice(out.visible);

                for range in out.ranges {
                    if !view.accepts_layer(range.filter.layer_mask) {
                        stats.culled_ranges += 1;
                        continue;
                    }
                    let start = range.draw_command_offset as usize;
                    let end = start + range.draw_command_count as usize;
                    for cmd in &out.commands[start..end] {
                        let Some(batch) = self.batches.get(&cmd.batch) else {
                            log::debug!("draw command for unknown batch {:?}", cmd.batch);
                            continue;
                        };
                        if cmd.visible_count == 0 {
                            continue;
                        }
                        self.draws.push(PendingDraw {
                            key: PipelineKey::new(
                                batch.kind,
                                batch.capacity,
                                batch.window_size,
                                ctx.surface_format,
                            ),
                            batch: cmd.batch,
                            mesh: cmd.mesh,
                            material: cmd.material,
                            first_slot: base + cmd.visible_offset,
                            slot_count: cmd.visible_count,
                        });
                    }
                }
            }
        }

        // Mutating methods must happen before borrowing resources for the pass.
        self.ensure_depth(ctx.size);
        self.ensure_pipelines();
        self.ensure_slot_capacity(self.slots.len());
        self.queue
            .write_buffer(&self.camera_ubo, 0, bytemuck::bytes_of(&view.uniform()));
        if let Some(slot_vbo) = self.slot_vbo.as_ref() {
            if !self.slots.is_empty() {
                self.queue
                    .write_buffer(slot_vbo, 0, bytemuck::cast_slice(&self.slots));
            }
        }

        let Some(depth) = self.depth.as_ref() else { return stats };
        let Some(slot_vbo) = self.slot_vbo.as_ref() else { return stats };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("swarm instanced pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(view.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_bind_group(0, &self.camera_bind_group, &[]);
        rpass.set_vertex_buffer(1, slot_vbo.slice(..));

        let mut bound_key = None;
        for draw in &self.draws {
            let (Some(batch), Some(mesh), Some(material), Some(pipeline)) = (
                self.batches.get(&draw.batch),
                self.meshes.get(&draw.mesh),
                self.materials.get(&draw.material),
                self.pipelines.get(&draw.key),
            ) else {
                continue;
            };

            if bound_key != Some(draw.key) {
                rpass.set_pipeline(pipeline);
                bound_key = Some(draw.key);
            }
            rpass.set_bind_group(1, &batch.bind_group, &[]);
            rpass.set_bind_group(2, &material.bind_group, &[]);
            rpass.set_vertex_buffer(0, mesh.vbo.slice(..));
            rpass.set_index_buffer(mesh.ibo.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(
                0..mesh.index_count,
                0,
                draw.first_slot..draw.first_slot + draw.slot_count,
            );

            stats.draw_calls += 1;
            stats.instances += draw.slot_count as u64;
        }

        log::trace!(
            "frame: {} draws, {} instances, {} culled ranges",
            stats.draw_calls,
            stats.instances,
            stats.culled_ranges
        );
        stats
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn arena_stats(&self) -> crate::instancing::ArenaStats {
        self.arena.stats()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_pipelines(&mut self) {
        for draw in &self.draws {
            if self.pipelines.contains_key(&draw.key) {
                continue;
            }
            log::debug!("building instanced pipeline {:?}", draw.key);
            let pipeline = pipeline::build(&self.device, &self.layouts, &draw.key);
            self.pipelines.insert(draw.key, pipeline);
        }
    }

    fn ensure_depth(&mut self, size: PhysicalSize<u32>) {
        let size = PhysicalSize::new(size.width.max(1), size.height.max(1));
        if self.depth.as_ref().is_some_and(|d| d.size == size) {
            return;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("swarm depth"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some(DepthTarget {
            size,
            _texture: texture,
            view,
        });
    }

    fn ensure_slot_capacity(&mut self, required: usize) {
        if required <= self.slot_capacity && self.slot_vbo.is_some() {
            return;
        }

        let new_cap = required.next_power_of_two().max(1024);
        self.slot_vbo = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("swarm visible slot vbo"),
            size: (new_cap * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.slot_capacity = new_cap;
    }
}

impl RenderBackend for WgpuBackend {
    type Mesh = MeshData;
    type Material = MaterialDesc;

    fn buffer_kind(&self) -> BufferKind {
        self.kind
    }

    fn allocation_granularity(&self) -> u64 {
        wgpu::COPY_BUFFER_ALIGNMENT
    }

    fn create_buffer(&mut self, size: u64, kind: BufferKind) -> Result<BufferHandle, BackendError> {
        let limit = match kind {
            BufferKind::Bounded { .. } => self.max_buffer_size,
            BufferKind::Unbounded => self.max_buffer_size.min(self.max_storage_binding_size),
        };
        if size > limit {
            return Err(BackendError::BufferTooLarge { size, limit });
        }

        let binding = match kind {
            BufferKind::Bounded { .. } => wgpu::BufferUsages::UNIFORM,
            BufferKind::Unbounded => wgpu::BufferUsages::STORAGE,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("swarm instance buffer"),
            size,
            usage: binding | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let handle = BufferHandle::from_raw(self.next());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        let Some(target) = self.buffers.get(&buffer) else {
            log::error!("write to unknown buffer {buffer:?}");
            return;
        };
        self.queue.write_buffer(target, offset, bytes);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(b) = self.buffers.remove(&buffer) {
            b.destroy();
        }
    }

    fn register_batch(&mut self, desc: &BatchDesc) -> BatchHandle {
        let handle = BatchHandle::from_raw(self.next());

        let Some(buffer) = self.buffers.get(&desc.buffer) else {
            log::error!("batch registered against unknown buffer {:?}", desc.buffer);
            return handle;
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("swarm instance window bind group"),
            layout: self.layouts.instances(desc.kind),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: desc.offset,
                    size: wgpu::BufferSize::new(desc.window_size),
                }),
            }],
        });

        self.batches.insert(
            handle,
            GpuBatch {
                bind_group,
                kind: desc.kind,
                capacity: desc.capacity,
                window_size: desc.window_size,
            },
        );
        handle
    }

    fn remove_batch(&mut self, batch: BatchHandle) {
        self.batches.remove(&batch);
    }

    fn register_mesh(&mut self, mesh: &MeshData) -> MeshHandle {
        let handle = MeshHandle::from_raw(self.next());
        self.meshes.insert(handle, GpuMesh::new(&self.device, mesh));
        handle
    }

    fn unregister_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
    }

    fn register_material(&mut self, material: &MaterialDesc) -> MaterialHandle {
        let handle = MaterialHandle::from_raw(self.next());
        self.materials.insert(
            handle,
            GpuMaterial::new(&self.device, &self.layouts.material, material),
        );
        handle
    }

    fn unregister_material(&mut self, material: MaterialHandle) {
        self.materials.remove(&material);
    }
}
