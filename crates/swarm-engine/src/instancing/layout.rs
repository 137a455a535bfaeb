//! Window layout planning.
//!
//! The GPU buffer is split into equally sized windows. Each window stores its
//! instances as three field arrays (SoA):
//!
//! ```text
//! window offset 0                         : object-to-world rows  (capacity × 3 × 16 B)
//! window offset capacity × 3 × 16         : world-to-object rows  (capacity × 3 × 16 B)
//! window offset capacity × 3 × 2 × 16     : colors                (capacity × 16 B)
//! ```
//!
//! Producers writing the mirror buffer rely on these offsets, so they are part
//! of the public contract.

use super::InstancingError;

/// Size of one float4 element in bytes.
pub const FLOAT4_SIZE: u64 = 16;

/// Bytes occupied by one instance's fields (7 float4s).
pub const INSTANCE_RECORD_SIZE: u64 = 7 * FLOAT4_SIZE;

/// How the backend exposes the instance buffer to shaders.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    /// Shaders can address at most `window_byte_limit` bytes at once
    /// (uniform/constant buffers). The buffer is split into several windows.
    Bounded { window_byte_limit: u64 },
    /// Shaders can address the whole buffer (storage buffers). One window.
    Unbounded,
}

impl BufferKind {
    #[inline]
    pub fn is_bounded(self) -> bool {
        matches!(self, BufferKind::Bounded { .. })
    }
}

/// One of the three per-instance field regions inside a window.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InstanceField {
    ObjectToWorld,
    WorldToObject,
    Color,
}

impl InstanceField {
    /// Fields in storage order.
    pub const ALL: [InstanceField; 3] = [
        InstanceField::ObjectToWorld,
        InstanceField::WorldToObject,
        InstanceField::Color,
    ];

    /// Number of float4s this field occupies per instance.
    #[inline]
    pub const fn float4s(self) -> u64 {
        match self {
            InstanceField::ObjectToWorld | InstanceField::WorldToObject => 3,
            InstanceField::Color => 1,
        }
    }

    /// Per-instance width in bytes.
    #[inline]
    pub const fn width(self) -> u64 {
        self.float4s() * FLOAT4_SIZE
    }

    /// Byte offset of this field's array, relative to the start of a window.
    #[inline]
    pub const fn base_offset(self, capacity_per_window: u32) -> u64 {
        let cap = capacity_per_window as u64;
        match self {
            InstanceField::ObjectToWorld => 0,
            InstanceField::WorldToObject => cap * 3 * FLOAT4_SIZE,
            InstanceField::Color => cap * 3 * 2 * FLOAT4_SIZE,
        }
    }
}

/// Resolved buffer partitioning.
///
/// Computed once at init; upload and synthesis only read the plain numbers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WindowLayout {
    pub max_instances: u32,
    pub record_size: u64,
    pub aligned_window_size: u64,
    pub capacity_per_window: u32,
    pub window_count: u32,
    pub total_buffer_size: u64,
}

impl WindowLayout {
    /// Plans the window partitioning for `max_instances` records of
    /// `record_size` bytes.
    ///
    /// Bounded limits that are not a multiple of 16 are rounded down.
    pub fn plan(
        max_instances: u32,
        record_size: u64,
        kind: BufferKind,
    ) -> Result<Self, InstancingError> {
        if max_instances == 0 {
            return Err(InstancingError::ZeroInstances);
        }
        if record_size < INSTANCE_RECORD_SIZE {
            return Err(InstancingError::RecordTooSmall {
                record_size,
                required: INSTANCE_RECORD_SIZE,
            });
        }

        let (aligned_window_size, capacity_per_window, window_count) = match kind {
            BufferKind::Bounded { window_byte_limit } => {
                let aligned = round_down(window_byte_limit, FLOAT4_SIZE);
                if record_size > aligned {
                    return Err(InstancingError::RecordExceedsWindow {
                        record_size,
                        window_byte_limit,
                        aligned_window_size: aligned,
                    });
                }
                let capacity = (aligned / record_size).min(u32::MAX as u64) as u32;
                (aligned, capacity, max_instances.div_ceil(capacity))
            }
            BufferKind::Unbounded => {
                let size = round_up(max_instances as u64 * record_size, FLOAT4_SIZE);
                (size, max_instances, 1)
            }
        };

        Ok(Self {
            max_instances,
            record_size,
            aligned_window_size,
            capacity_per_window,
            window_count,
            total_buffer_size: window_count as u64 * aligned_window_size,
        })
    }

    /// Byte offset of `window` within the GPU buffer.
    #[inline]
    pub fn window_offset(&self, window: u32) -> u64 {
        window as u64 * self.aligned_window_size
    }

    /// Byte offset of `field`'s array for `window` within the GPU buffer.
    #[inline]
    pub fn field_offset(&self, window: u32, field: InstanceField) -> u64 {
        self.window_offset(window) + field.base_offset(self.capacity_per_window)
    }

    /// Byte offset of `slot`'s `field` in `window`.
    #[inline]
    pub fn slot_offset(&self, window: u32, field: InstanceField, slot: u32) -> u64 {
        self.field_offset(window, field) + slot as u64 * field.width()
    }

    /// Maps a flat instance index to its `(window, slot)` pair.
    #[inline]
    pub fn locate(&self, instance: u32) -> (u32, u32) {
        (
            instance / self.capacity_per_window,
            instance % self.capacity_per_window,
        )
    }

    /// Number of windows touched by `instance_count` instances.
    #[inline]
    pub fn windows_for(&self, instance_count: u32) -> u32 {
        instance_count.div_ceil(self.capacity_per_window)
    }
}

#[inline]
pub(crate) fn round_up(value: u64, multiple: u64) -> u64 {
    value.div_ceil(multiple) * multiple
}

#[inline]
fn round_down(value: u64, multiple: u64) -> u64 {
    value / multiple * multiple
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIFORM_LIMIT: BufferKind = BufferKind::Bounded { window_byte_limit: 65536 };

    // ── unbounded ─────────────────────────────────────────────────────────

    #[test]
    fn unbounded_single_window_holds_everything() {
        let l = WindowLayout::plan(1000, INSTANCE_RECORD_SIZE, BufferKind::Unbounded).unwrap();
        assert_eq!(l.capacity_per_window, 1000);
        assert_eq!(l.window_count, 1);
        assert_eq!(l.aligned_window_size, 112_000);
        assert_eq!(l.total_buffer_size, 112_000);
    }

    #[test]
    fn unbounded_rounds_window_to_16_bytes() {
        let l = WindowLayout::plan(3, 120, BufferKind::Unbounded).unwrap();
        assert_eq!(l.aligned_window_size, 368);
        assert_eq!(l.aligned_window_size % FLOAT4_SIZE, 0);
    }

    // ── bounded ───────────────────────────────────────────────────────────

    #[test]
    fn bounded_uniform_limit_partitions_into_windows() {
        let l = WindowLayout::plan(1200, INSTANCE_RECORD_SIZE, UNIFORM_LIMIT).unwrap();
        assert_eq!(l.aligned_window_size, 65536);
        assert_eq!(l.capacity_per_window, 585);
        assert_eq!(l.window_count, 3);
        assert_eq!(l.total_buffer_size, 3 * 65536);
    }

    #[test]
    fn bounded_exact_multiple_needs_no_extra_window() {
        let l = WindowLayout::plan(1170, INSTANCE_RECORD_SIZE, UNIFORM_LIMIT).unwrap();
        assert_eq!(l.window_count, 2);
    }

    #[test]
    fn bounded_limit_rounds_down_to_16() {
        let kind = BufferKind::Bounded { window_byte_limit: 1000 };
        let l = WindowLayout::plan(100, INSTANCE_RECORD_SIZE, kind).unwrap();
        assert_eq!(l.aligned_window_size, 992);
        assert_eq!(l.capacity_per_window, 8);
    }

    #[test]
    fn bounded_record_larger_than_window_is_fatal() {
        let kind = BufferKind::Bounded { window_byte_limit: 100 };
        let err = WindowLayout::plan(10, INSTANCE_RECORD_SIZE, kind).unwrap_err();
        assert_eq!(
            err,
            InstancingError::RecordExceedsWindow {
                record_size: 112,
                window_byte_limit: 100,
                aligned_window_size: 96,
            }
        );
    }

    #[test]
    fn bounded_fit_is_checked_against_the_rounded_limit() {
        let kind = BufferKind::Bounded { window_byte_limit: 120 };
        let err = WindowLayout::plan(10, 116, kind).unwrap_err();
        assert_eq!(
            err,
            InstancingError::RecordExceedsWindow {
                record_size: 116,
                window_byte_limit: 120,
                aligned_window_size: 112,
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("112-byte window"), "{msg}");
        assert!(msg.contains("120-byte limit"), "{msg}");

        let l = WindowLayout::plan(10, 112, kind).unwrap();
        assert_eq!(l.aligned_window_size, 112);
        assert_eq!(l.capacity_per_window, 1);
    }

    #[test]
    fn record_smaller_than_fields_is_rejected() {
        let err = WindowLayout::plan(10, 64, BufferKind::Unbounded).unwrap_err();
        assert!(matches!(err, InstancingError::RecordTooSmall { .. }));
    }

    #[test]
    fn zero_instances_is_rejected() {
        assert_eq!(
            WindowLayout::plan(0, INSTANCE_RECORD_SIZE, UNIFORM_LIMIT),
            Err(InstancingError::ZeroInstances)
        );
    }

    #[test]
    fn layout_invariants_hold_across_sizes() {
        for max in [1u32, 7, 584, 585, 586, 1200, 10_000, 65_537] {
            for record in [112u64, 128, 208, 4096] {
                for kind in [
                    UNIFORM_LIMIT,
                    BufferKind::Bounded { window_byte_limit: 16_384 },
                    BufferKind::Unbounded,
                ] {
                    let l = WindowLayout::plan(max, record, kind).unwrap();
                    assert_eq!(l.window_count as u64 * l.aligned_window_size, l.total_buffer_size);
                    assert!(l.capacity_per_window as u64 * l.window_count as u64 >= max as u64);
                    assert_eq!(l.aligned_window_size % FLOAT4_SIZE, 0);
                    // The three field arrays always fit inside one window.
                    assert!(
                        InstanceField::Color.base_offset(l.capacity_per_window)
                            + l.capacity_per_window as u64 * FLOAT4_SIZE
                            <= l.aligned_window_size
                    );
                }
            }
        }
    }

    // ── offsets ───────────────────────────────────────────────────────────

    #[test]
    fn field_offsets_follow_soa_contract() {
        assert_eq!(InstanceField::ObjectToWorld.base_offset(585), 0);
        assert_eq!(InstanceField::WorldToObject.base_offset(585), 585 * 48);
        assert_eq!(InstanceField::Color.base_offset(585), 585 * 96);
    }

    #[test]
    fn slot_offset_in_second_window() {
        let l = WindowLayout::plan(1200, INSTANCE_RECORD_SIZE, UNIFORM_LIMIT).unwrap();
        assert_eq!(l.locate(590), (1, 5));
        assert_eq!(l.slot_offset(1, InstanceField::Color, 5), 65536 + 585 * 96 + 5 * 16);
        assert_eq!(l.slot_offset(1, InstanceField::WorldToObject, 5), 65536 + 585 * 48 + 5 * 48);
    }

    #[test]
    fn windows_for_rounds_up() {
        let l = WindowLayout::plan(1200, INSTANCE_RECORD_SIZE, UNIFORM_LIMIT).unwrap();
        assert_eq!(l.windows_for(0), 0);
        assert_eq!(l.windows_for(585), 1);
        assert_eq!(l.windows_for(586), 2);
        assert_eq!(l.windows_for(1200), 3);
    }
}
