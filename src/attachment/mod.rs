//! Baked attachment data and lifecycle
//!
//! [`Pose`] and [`AttachmentItem`] are the baked, surface-relative form of an
//! attachment point; `builder` produces them with the two-pass measure/fill
//! scheme; [`TransformAttachment`] owns the baked arrays and the
//! attach/detach lifecycle around them.

pub mod builder;
mod pose;
mod transform_attachment;

pub use builder::{bake_into, BakeSummary, PoseBuildSettings};
pub use pose::{AttachmentItem, Pose, TriangleFrame};
pub use transform_attachment::{
    AttachmentSettings, AttachmentState, ResolveNotification, SchedulingMode, TransformAttachment,
};
