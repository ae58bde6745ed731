//! Attachment subsystem error handling
//!
//! Recoverable failures (a target that cannot be resolved, attaching twice)
//! are reported through `AttachmentError`. Measure/fill disagreements during
//! baking are programming defects: they assert in debug builds and surface
//! here only so release builds can refuse the bake loudly.

use thiserror::Error;

use crate::mesh::TargetId;

/// Type alias for attachment operation results
pub type AttachmentResult<T> = Result<T, AttachmentError>;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("invalid attachment target {target:?}: {message}")]
    InvalidTarget { target: TargetId, message: String },

    #[error("attachment is already attached to {target:?}")]
    AlreadyAttached { target: TargetId },

    #[error("pose bake measure/fill mismatch: measured {measured} entries, wrote {written}")]
    BufferSizeMismatch { measured: usize, written: usize },

    #[error("GPU readback failed: {message}")]
    GpuReadbackFailed { message: String },
}

impl AttachmentError {
    pub fn invalid_target(target: TargetId, message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            target,
            message: message.into(),
        }
    }
}
