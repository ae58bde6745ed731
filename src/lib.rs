//! Rigid surface attachments for deforming meshes.
//!
//! A transform is attached to a point on a target mesh's surface by baking
//! the point into triangle-relative poses once; every frame thereafter the
//! transform's world position is re-derived from the mesh's current vertex
//! buffers, so the attachment follows the deforming surface instead of
//! staying at a fixed world coordinate.
//!
//! The per-frame work is batched: all attachments on one target resolve in
//! a single pass, either synchronously on the CPU or in a compute dispatch
//! with on-demand blocking readback.

pub mod attachment;
pub mod constants;
pub mod error;
pub mod mesh;
pub mod resolve;
pub mod transform;

pub use attachment::{
    AttachmentItem, AttachmentSettings, AttachmentState, Pose, PoseBuildSettings,
    ResolveNotification, SchedulingMode, TransformAttachment,
};
pub use error::{AttachmentError, AttachmentResult};
pub use mesh::{MeshBuffers, MeshSnapshot, MeshSnapshotCache, MeshSnapshotProvider, TargetId};
pub use resolve::{AttachmentId, AttachmentRegistry, ReadbackGate, ResolveEvent};
pub use transform::Transform;
