//! System-memory mirror of the GPU instance buffer.
//!
//! The mirror has exactly the same byte layout as the GPU buffer. Producers
//! write it directly (through [`MirrorView`]) and the upload scheduler copies
//! byte ranges out of it.

use glam::Affine3A;

use super::layout::{FLOAT4_SIZE, InstanceField, WindowLayout};

/// One 16-byte element of the mirror.
pub type Float4 = [f32; 4];

/// Zero-initialized, float4-granular backing store.
#[derive(Default)]
pub struct MirrorBuffer {
    float4s: Vec<Float4>,
}

impl std::fmt::Debug for MirrorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorBuffer")
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

impl MirrorBuffer {
    /// Allocates a zeroed mirror of `total_size` bytes (multiple of 16).
    pub fn zeroed(total_size: u64) -> Self {
        debug_assert_eq!(total_size % FLOAT4_SIZE, 0);
        Self {
            float4s: vec![[0.0; 4]; (total_size / FLOAT4_SIZE) as usize],
        }
    }

    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.float4s.len() as u64 * FLOAT4_SIZE
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.float4s)
    }

    /// Byte range `[offset, offset + len)` of the mirror.
    ///
    /// # Panics
    /// Panics if the range exceeds the mirror.
    #[inline]
    pub fn bytes(&self, offset: u64, len: u64) -> &[u8] {
        &self.as_bytes()[offset as usize..(offset + len) as usize]
    }

    #[inline]
    pub(crate) fn float4s_mut(&mut self) -> &mut [Float4] {
        &mut self.float4s
    }
}

/// Writable view of the mirror handed to producers.
///
/// `float4s` is the raw buffer; `total_size` and `aligned_window_size` are
/// enough to compute any `(window, field, slot)` offset by hand. The typed
/// `write_*` helpers do that arithmetic with the manager's layout.
pub struct MirrorView<'a> {
    pub float4s: &'a mut [Float4],
    pub total_size: u64,
    pub aligned_window_size: u64,
    pub capacity_per_window: u32,
}

impl<'a> MirrorView<'a> {
    pub(crate) fn new(buffer: &'a mut MirrorBuffer, layout: &WindowLayout) -> Self {
        let total_size = buffer.size_bytes();
        Self {
            float4s: buffer.float4s_mut(),
            total_size,
            aligned_window_size: layout.aligned_window_size,
            capacity_per_window: layout.capacity_per_window,
        }
    }

    /// Raw byte view of the mirror.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut *self.float4s)
    }

    /// Number of instance slots the mirror can hold.
    #[inline]
    pub fn slot_count(&self) -> u32 {
        let windows = self.total_size.checked_div(self.aligned_window_size).unwrap_or(0);
        (windows * self.capacity_per_window as u64).min(u32::MAX as u64) as u32
    }

    /// Float4 index of `field` for the flat `instance` index.
    #[inline]
    pub fn float4_index(&self, instance: u32, field: InstanceField) -> usize {
        let window = (instance / self.capacity_per_window) as u64;
        let slot = (instance % self.capacity_per_window) as u64;
        let byte = window * self.aligned_window_size
            + field.base_offset(self.capacity_per_window)
            + slot * field.width();
        (byte / FLOAT4_SIZE) as usize
    }

    /// # Panics
    /// Panics if `instance` lies outside the mirror.
    pub fn write_object_to_world(&mut self, instance: u32, rows: [Float4; 3]) {
        let at = self.float4_index(instance, InstanceField::ObjectToWorld);
        self.float4s[at..at + 3].copy_from_slice(&rows);
    }

    /// # Panics
    /// Panics if `instance` lies outside the mirror.
    pub fn write_world_to_object(&mut self, instance: u32, rows: [Float4; 3]) {
        let at = self.float4_index(instance, InstanceField::WorldToObject);
        self.float4s[at..at + 3].copy_from_slice(&rows);
    }

    /// # Panics
    /// Panics if `instance` lies outside the mirror.
    pub fn write_color(&mut self, instance: u32, color: Float4) {
        let at = self.float4_index(instance, InstanceField::Color);
        self.float4s[at] = color;
    }

    /// Writes all three fields of `record` into `instance`'s slot.
    pub fn write(&mut self, instance: u32, record: &InstanceRecord) {
        self.write_object_to_world(instance, record.object_to_world);
        self.write_world_to_object(instance, record.world_to_object);
        self.write_color(instance, record.color);
    }
}

/// Logical instance record (7 float4s).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InstanceRecord {
    /// Rows of the affine object-to-world matrix (`[m0, m1, m2, t]` per row).
    pub object_to_world: [Float4; 3],
    /// Rows of the inverse transform.
    pub world_to_object: [Float4; 3],
    /// Linear RGBA.
    pub color: Float4,
}

impl InstanceRecord {
    /// Builds a record from an affine transform; the inverse rows are derived.
    ///
    /// Singular transforms (zero scale) get an all-zero inverse.
    pub fn from_affine(transform: Affine3A, color: Float4) -> Self {
        let inverse = if transform.matrix3.determinant().abs() > f32::EPSILON {
            transform.inverse()
        } else {
            Affine3A::ZERO
        };
        Self {
            object_to_world: affine_rows(&transform),
            world_to_object: affine_rows(&inverse),
            color,
        }
    }
}

fn affine_rows(a: &Affine3A) -> [Float4; 3] {
    let (x, y, z, t) = (a.matrix3.x_axis, a.matrix3.y_axis, a.matrix3.z_axis, a.translation);
    [
        [x.x, y.x, z.x, t.x],
        [x.y, y.y, z.y, t.y],
        [x.z, y.z, z.z, t.z],
    ]
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::instancing::layout::{BufferKind, INSTANCE_RECORD_SIZE};

    fn bounded_layout() -> WindowLayout {
        WindowLayout::plan(1200, INSTANCE_RECORD_SIZE, BufferKind::Bounded { window_byte_limit: 65536 })
            .unwrap()
    }

    #[test]
    fn zeroed_mirror_spans_whole_buffer() {
        let l = bounded_layout();
        let m = MirrorBuffer::zeroed(l.total_buffer_size);
        assert_eq!(m.size_bytes(), 3 * 65536);
        assert!(m.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn view_reports_layout_numbers() {
        let l = bounded_layout();
        let mut m = MirrorBuffer::zeroed(l.total_buffer_size);
        let view = MirrorView::new(&mut m, &l);
        assert_eq!(view.total_size, l.total_buffer_size);
        assert_eq!(view.aligned_window_size, 65536);
        assert_eq!(view.slot_count(), 3 * 585);
    }

    #[test]
    fn color_write_lands_at_contract_offset() {
        let l = bounded_layout();
        let mut m = MirrorBuffer::zeroed(l.total_buffer_size);
        {
            let mut view = MirrorView::new(&mut m, &l);
            view.write_color(590, [1.0, 0.5, 0.25, 1.0]);
        }
        let offset = l.slot_offset(1, InstanceField::Color, 5);
        let bytes = m.bytes(offset, 16);
        let color: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(color, &[1.0, 0.5, 0.25, 1.0]);
    }

    #[test]
    fn record_write_fills_three_regions() {
        let l = bounded_layout();
        let mut m = MirrorBuffer::zeroed(l.total_buffer_size);
        let record = InstanceRecord::from_affine(
            Affine3A::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            [0.0, 1.0, 0.0, 1.0],
        );
        MirrorView::new(&mut m, &l).write(0, &record);

        let o2w: &[f32] = bytemuck::cast_slice(m.bytes(0, 48));
        assert_eq!(&o2w[0..4], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(&o2w[8..12], &[0.0, 0.0, 1.0, 3.0]);

        let w2o: &[f32] = bytemuck::cast_slice(m.bytes(585 * 48, 48));
        assert_eq!(&w2o[0..4], &[1.0, 0.0, 0.0, -1.0]);

        let color: &[f32] = bytemuck::cast_slice(m.bytes(585 * 96, 16));
        assert_eq!(color, &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn inverse_rows_undo_transform() {
        let t = Affine3A::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(4.0, -1.0, 0.5),
        );
        let r = InstanceRecord::from_affine(t, [1.0; 4]);
        let p = Vec3::new(0.3, 0.2, -0.9);

        let apply = |rows: &[Float4; 3], v: Vec3| {
            Vec3::new(
                rows[0][0] * v.x + rows[0][1] * v.y + rows[0][2] * v.z + rows[0][3],
                rows[1][0] * v.x + rows[1][1] * v.y + rows[1][2] * v.z + rows[1][3],
                rows[2][0] * v.x + rows[2][1] * v.y + rows[2][2] * v.z + rows[2][3],
            )
        };
        let back = apply(&r.world_to_object, apply(&r.object_to_world, p));
        assert!((back - p).length() < 1e-5);
    }

    #[test]
    fn singular_transform_gets_zero_inverse() {
        let r = InstanceRecord::from_affine(Affine3A::from_scale(Vec3::ZERO), [1.0; 4]);
        assert_eq!(r.world_to_object, [[0.0; 4]; 3]);
    }
}
