use crate::backend::BackendError;

/// Errors reported by the instance-buffer manager.
///
/// Configuration errors are raised by [`WindowLayout::plan`](super::WindowLayout::plan)
/// and abort `InstanceManager::init`. `OverCapacity` is the only error an
/// initialized manager reports at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstancingError {
    #[error("max_instances must be greater than zero")]
    ZeroInstances,

    #[error("instance record of {record_size} bytes is smaller than the {required} bytes its fields occupy")]
    RecordTooSmall { record_size: u64, required: u64 },

    #[error(
        "instance record of {record_size} bytes does not fit a {aligned_window_size}-byte window \
         ({window_byte_limit}-byte limit rounded down to 16 bytes)"
    )]
    RecordExceedsWindow { record_size: u64, window_byte_limit: u64, aligned_window_size: u64 },

    #[error("upload of {requested} instances exceeds the manager capacity of {max}")]
    OverCapacity { requested: u32, max: u32 },

    #[error("instance manager is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Backend(#[from] BackendError),
}
