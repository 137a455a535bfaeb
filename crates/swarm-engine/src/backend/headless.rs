//! System-memory backend.
//!
//! Buffers are plain byte vectors and every call is recorded, which makes it
//! the reference backend for tests and for running producers without a GPU.

use std::collections::HashMap;

use crate::instancing::{
    ArenaStats, BufferKind, DrawCommand, DrawCommandSource, DrawRange, FrameArena,
};

use super::{
    BackendError, BatchDesc, BatchHandle, BufferHandle, MaterialHandle, MeshHandle, RenderBackend,
};

/// A recorded `write_buffer` call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferWrite {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub len: u64,
}

/// A recorded release, in call order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Release {
    Batch(BatchHandle),
    Material(MaterialHandle),
    Mesh(MeshHandle),
    Buffer(BufferHandle),
}

/// Owned copy of one source's draw output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    pub ranges: Vec<DrawRange>,
    pub commands: Vec<DrawCommand>,
    pub visible_len: usize,
}

impl SourceRecord {
    pub fn total_visible(&self) -> u64 {
        self.commands.iter().map(|c| c.visible_count as u64).sum()
    }
}

/// What a [`HeadlessBackend::render_frame`] call consumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameRecord {
    pub frame_index: u64,
    pub sources: Vec<SourceRecord>,
}

#[derive(Debug)]
struct HeadlessBuffer {
    kind: BufferKind,
    bytes: Vec<u8>,
}

/// Default cap on [`HeadlessBackend::writes`] entries.
pub const DEFAULT_WRITE_LOG_LIMIT: usize = 1 << 16;

/// Backend that keeps everything in system memory.
///
/// Uploads are appended to a write log until [`take_writes`] drains it.
/// Long-running callers should drain it every frame; once the log holds
/// `write_log_limit` entries further writes still land in the buffers but
/// are only counted in [`dropped_writes`].
///
/// [`take_writes`]: HeadlessBackend::take_writes
/// [`dropped_writes`]: HeadlessBackend::dropped_writes
#[derive(Debug)]
pub struct HeadlessBackend {
    kind: BufferKind,
    granularity: u64,
    max_buffer_size: u64,

    next_id: u32,
    buffers: HashMap<BufferHandle, HeadlessBuffer>,
    batches: HashMap<BatchHandle, BatchDesc>,
    meshes: HashMap<MeshHandle, String>,
    materials: HashMap<MaterialHandle, String>,

    writes: Vec<BufferWrite>,
    write_log_limit: usize,
    dropped_writes: u64,
    releases: Vec<Release>,

    arena: FrameArena,
    frame_index: u64,
}

impl HeadlessBackend {
    pub fn new(kind: BufferKind) -> Self {
        Self {
            kind,
            granularity: 4,
            max_buffer_size: 1 << 30,
            next_id: 0,
            buffers: HashMap::new(),
            batches: HashMap::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            writes: Vec::new(),
            write_log_limit: DEFAULT_WRITE_LOG_LIMIT,
            dropped_writes: 0,
            releases: Vec::new(),
            arena: FrameArena::new(),
            frame_index: 0,
        }
    }

    /// Emulates a device with uniform-buffer windows of `window_byte_limit` bytes.
    pub fn bounded(window_byte_limit: u64) -> Self {
        Self::new(BufferKind::Bounded { window_byte_limit })
    }

    pub fn unbounded() -> Self {
        Self::new(BufferKind::Unbounded)
    }

    pub fn with_granularity(mut self, granularity: u64) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_write_log_limit(mut self, limit: usize) -> Self {
        self.write_log_limit = limit;
        self
    }

    pub fn with_max_buffer_size(mut self, max_buffer_size: u64) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    /// Invokes every source with one frame scope and records the output.
    pub fn render_frame(&mut self, sources: &[&dyn DrawCommandSource]) -> FrameRecord {
        let mut record = FrameRecord {
            frame_index: self.frame_index,
            sources: Vec::with_capacity(sources.len()),
        };
        {
            let mut scope = self.arena.scope();
            for source in sources {
                let out = source.synthesize(&mut scope);
                record.sources.push(SourceRecord {
                    ranges: out.ranges.to_vec(),
                    commands: out.commands.to_vec(),
                    visible_len: out.visible.len(),
                });
            }
        }
        self.frame_index += 1;
        record
    }

    pub fn buffer_bytes(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.bytes.as_slice())
    }

    pub fn buffer_kind_of(&self, buffer: BufferHandle) -> Option<BufferKind> {
        self.buffers.get(&buffer).map(|b| b.kind)
    }

    pub fn batch(&self, batch: BatchHandle) -> Option<&BatchDesc> {
        self.batches.get(&batch)
    }

    pub fn writes(&self) -> &[BufferWrite] {
        &self.writes
    }

    /// Returns and clears the write log.
    pub fn take_writes(&mut self) -> Vec<BufferWrite> {
        std::mem::take(&mut self.writes)
    }

    /// Writes applied while the log was full.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for HeadlessBackend {
    type Mesh = String;
    type Material = String;

    fn buffer_kind(&self) -> BufferKind {
        self.kind
    }

    fn allocation_granularity(&self) -> u64 {
        self.granularity
    }

    fn create_buffer(&mut self, size: u64, kind: BufferKind) -> Result<BufferHandle, BackendError> {
        if size > self.max_buffer_size {
            return Err(BackendError::BufferTooLarge {
                size,
                limit: self.max_buffer_size,
            });
        }
        let handle = BufferHandle::from_raw(self.next());
        self.buffers.insert(
            handle,
            HeadlessBuffer {
                kind,
                bytes: vec![0; size as usize],
            },
        );
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        let Some(target) = self.buffers.get_mut(&buffer) else {
            log::error!("write to unknown buffer {buffer:?}");
            return;
        };
        let end = offset as usize + bytes.len();
        if end > target.bytes.len() {
            log::error!(
                "write of {} bytes at {offset} overflows {}-byte buffer",
                bytes.len(),
                target.bytes.len()
            );
            return;
        }
        target.bytes[offset as usize..end].copy_from_slice(bytes);
        if self.writes.len() >= self.write_log_limit {
            if self.dropped_writes == 0 {
                log::warn!(
                    "headless write log full ({} entries); drain it with take_writes",
                    self.write_log_limit
                );
            }
            self.dropped_writes += 1;
            return;
        }
        self.writes.push(BufferWrite {
            buffer,
            offset,
            len: bytes.len() as u64,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.releases.push(Release::Buffer(buffer));
    }

    fn register_batch(&mut self, desc: &BatchDesc) -> BatchHandle {
        let handle = BatchHandle::from_raw(self.next());
        self.batches.insert(handle, desc.clone());
        handle
    }

    fn remove_batch(&mut self, batch: BatchHandle) {
        self.batches.remove(&batch);
        self.releases.push(Release::Batch(batch));
    }

    fn register_mesh(&mut self, mesh: &String) -> MeshHandle {
        let handle = MeshHandle::from_raw(self.next());
        self.meshes.insert(handle, mesh.clone());
        handle
    }

    fn unregister_mesh(&mut self, mesh: MeshHandle) {
        self.meshes.remove(&mesh);
        self.releases.push(Release::Mesh(mesh));
    }

    fn register_material(&mut self, material: &String) -> MaterialHandle {
        let handle = MaterialHandle::from_raw(self.next());
        self.materials.insert(handle, material.clone());
        handle
    }

    fn unregister_material(&mut self, material: MaterialHandle) {
        self.materials.remove(&material);
        self.releases.push(Release::Material(material));
    }
}
