//! Upload planning: which byte ranges of the mirror reach the GPU this frame.
//!
//! Complete windows are contiguous and fully populated, so they go up as one
//! bulk copy. The trailing partial window is SoA, so its live prefix is three
//! disjoint ranges (one per field); copying them separately avoids sending the
//! stale slots past `instance_count`.

use super::layout::{InstanceField, WindowLayout};

/// A byte range copied from the mirror into the GPU buffer at the same offset.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CopyRange {
    pub offset: u64,
    pub len: u64,
}

/// Copies needed to publish `instance_count` instances.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UploadPlan {
    pub instance_count: u32,
    pub complete_windows: u32,
    pub remainder: u32,
    /// Covers every complete window, starting at offset 0.
    pub bulk: Option<CopyRange>,
    /// Live prefix of each field in the partial window, in field order.
    pub tail: Option<[CopyRange; 3]>,
}

impl UploadPlan {
    /// Plans the copies for `instance_count` instances.
    ///
    /// The caller guarantees `instance_count <= layout.max_instances`.
    pub fn new(layout: &WindowLayout, instance_count: u32) -> Self {
        let capacity = layout.capacity_per_window;
        let complete_windows = instance_count / capacity;
        let remainder = instance_count - complete_windows * capacity;

        let bulk = (complete_windows > 0).then(|| CopyRange {
            offset: 0,
            len: complete_windows as u64 * layout.aligned_window_size,
        });

        let tail = (remainder > 0).then(|| {
            InstanceField::ALL.map(|field| CopyRange {
                offset: layout.field_offset(complete_windows, field),
                len: remainder as u64 * field.width(),
            })
        });

        Self {
            instance_count,
            complete_windows,
            remainder,
            bulk,
            tail,
        }
    }

    /// All copies in issue order.
    pub fn copies(&self) -> impl Iterator<Item = CopyRange> + '_ {
        self.bulk.into_iter().chain(self.tail.into_iter().flatten())
    }

    #[inline]
    pub fn copy_count(&self) -> usize {
        self.copies().count()
    }

    /// Total bytes transferred.
    pub fn bytes(&self) -> u64 {
        self.copies().map(|c| c.len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instancing::layout::{BufferKind, INSTANCE_RECORD_SIZE};

    fn bounded(max: u32) -> WindowLayout {
        WindowLayout::plan(max, INSTANCE_RECORD_SIZE, BufferKind::Bounded { window_byte_limit: 65536 })
            .unwrap()
    }

    #[test]
    fn zero_instances_plans_nothing() {
        let plan = UploadPlan::new(&bounded(1200), 0);
        assert_eq!(plan.copy_count(), 0);
        assert_eq!(plan.bytes(), 0);
    }

    #[test]
    fn full_unbounded_window_is_one_bulk_copy() {
        let l = WindowLayout::plan(1000, INSTANCE_RECORD_SIZE, BufferKind::Unbounded).unwrap();
        let plan = UploadPlan::new(&l, 1000);
        assert_eq!(plan.bulk, Some(CopyRange { offset: 0, len: 112_000 }));
        assert!(plan.tail.is_none());
        assert_eq!(plan.copy_count(), 1);
    }

    #[test]
    fn exact_window_multiple_has_no_tail() {
        let plan = UploadPlan::new(&bounded(1200), 1170);
        assert_eq!(plan.complete_windows, 2);
        assert_eq!(plan.remainder, 0);
        assert_eq!(plan.bulk, Some(CopyRange { offset: 0, len: 2 * 65536 }));
        assert!(plan.tail.is_none());
    }

    #[test]
    fn one_extra_instance_adds_three_field_copies() {
        let plan = UploadPlan::new(&bounded(1200), 1171);
        assert_eq!(plan.complete_windows, 2);
        assert_eq!(plan.remainder, 1);
        assert_eq!(
            plan.tail,
            Some([
                CopyRange { offset: 2 * 65536, len: 48 },
                CopyRange { offset: 2 * 65536 + 585 * 48, len: 48 },
                CopyRange { offset: 2 * 65536 + 585 * 96, len: 16 },
            ])
        );
        assert_eq!(plan.copy_count(), 4);
    }

    #[test]
    fn partial_first_window_has_no_bulk() {
        let plan = UploadPlan::new(&bounded(1200), 10);
        assert!(plan.bulk.is_none());
        assert_eq!(plan.copy_count(), 3);
        assert_eq!(plan.bytes(), 10 * INSTANCE_RECORD_SIZE);
    }

    #[test]
    fn tail_bytes_scale_with_remainder_only() {
        let l = bounded(1200);
        let plan = UploadPlan::new(&l, 600);
        assert_eq!(plan.bytes(), 65536 + 15 * INSTANCE_RECORD_SIZE);
    }
}
