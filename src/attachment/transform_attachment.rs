use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::builder::{bake_into, PoseBuildSettings};
use super::{AttachmentItem, Pose};
use crate::error::{AttachmentError, AttachmentResult};
use crate::mesh::{MeshSnapshotProvider, TargetId};
use crate::transform::Transform;

/// Where an attachment's positions get resolved each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingMode {
    /// Resolve synchronously on the invoking thread, write the transform
    /// during the notification pass.
    Cpu,
    /// Resolve in a compute dispatch; the CPU only sees the result after an
    /// explicit readback.
    Gpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    Detached,
    Attached,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttachmentSettings {
    pub scheduling_mode: SchedulingMode,
    /// When set, the attachment is only queued by an explicit
    /// `queue_for_resolve` call instead of every registry tick.
    pub explicit_scheduling: bool,
    /// GPU mode only: after the batch resolves, block on a readback of this
    /// attachment's result slot and write it into the transform.
    pub readback_from_gpu: bool,
    pub pose_build: PoseBuildSettings,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            scheduling_mode: SchedulingMode::Cpu,
            explicit_scheduling: false,
            readback_from_gpu: false,
            pose_build: PoseBuildSettings::default(),
        }
    }
}

/// Passed to resolve callbacks once per attachment per frame, after the
/// attachment's batch has produced results.
pub struct ResolveNotification<'a> {
    pub target: TargetId,
    pub offset_in_batch: u32,
    /// CPU result array of the whole batch, indexed by `offset_in_batch`.
    pub positions_cpu: &'a [Vec3],
    /// GPU results buffer of the batch, if one was dispatched this frame.
    pub positions_gpu: Option<&'a wgpu::Buffer>,
    /// This attachment's resolved world position on the CPU path. `None`
    /// for GPU-scheduled attachments, whose authoritative value lives in
    /// `positions_gpu` until read back.
    pub world_position: Option<Vec3>,
}

pub(crate) type ResolveCallback =
    Box<dyn FnMut(&ResolveNotification<'_>, Option<&mut wgpu::CommandEncoder>) + Send>;

/// A transform rigidly attached to a point on a deforming target mesh.
///
/// Lifecycle mirrors the data model: `attach` bakes poses against the
/// target's current snapshot and transitions to `Attached`; `detach`
/// transitions back, optionally reverting the transform, and keeps the baked
/// data so a later re-attach needs no re-bake of unrelated state.
pub struct TransformAttachment {
    pub transform: Transform,
    pub settings: AttachmentSettings,
    state: AttachmentState,
    target: TargetId,
    poses: Vec<Pose>,
    items: Vec<AttachmentItem>,
    baked_item: Option<AttachmentItem>,
    original_transform: Option<(Vec3, Quat)>,
    pub(crate) offset_in_batch: Option<u32>,
    pub(crate) current_gpu_results: Option<Arc<wgpu::Buffer>>,
    pub(crate) last_resolved_position: Option<Vec3>,
    pub(crate) resolved_callbacks: Vec<ResolveCallback>,
}

impl TransformAttachment {
    pub fn new(target: TargetId, transform: Transform, settings: AttachmentSettings) -> Self {
        Self {
            transform,
            settings,
            state: AttachmentState::Detached,
            target,
            poses: Vec::new(),
            items: Vec::new(),
            baked_item: None,
            original_transform: None,
            offset_in_batch: None,
            current_gpu_results: None,
            last_resolved_position: None,
            resolved_callbacks: Vec::new(),
        }
    }

    pub fn state(&self) -> AttachmentState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.state == AttachmentState::Attached
    }

    /// The attachment target, the analogue of a target renderer handle.
    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn can_attach(&self, provider: &dyn MeshSnapshotProvider) -> bool {
        !self.is_attached()
            && provider
                .target_mesh_info(self.target)
                .map_or(false, |snapshot| snapshot.has_triangles())
    }

    /// Attached and the target still resolves to a snapshot. Queuing skips
    /// attachments for which this is false without detaching them.
    pub fn has_valid_state(&self, provider: &dyn MeshSnapshotProvider) -> bool {
        self.is_attached()
            && self.baked_item.is_some()
            && provider.target_mesh_info(self.target).is_some()
    }

    /// Bake poses against the target's current snapshot and transition to
    /// `Attached`. With `store_position_rotation`, the transform's current
    /// position and rotation are snapshotted for detach-revert.
    pub fn attach(
        &mut self,
        provider: &dyn MeshSnapshotProvider,
        store_position_rotation: bool,
    ) -> AttachmentResult<()> {
        if self.is_attached() {
            return Err(AttachmentError::AlreadyAttached {
                target: self.target,
            });
        }
        let snapshot = provider.target_mesh_info(self.target).ok_or_else(|| {
            AttachmentError::invalid_target(self.target, "no mesh snapshot for target")
        })?;

        let attach_point = snapshot
            .world_to_target()
            .transform_point3(self.transform.position);

        let summary = bake_into(
            &mut self.poses,
            &mut self.items,
            0,
            0,
            attach_point,
            snapshot,
            self.settings.pose_build,
            self.target,
        )?;

        if store_position_rotation {
            self.original_transform = Some((self.transform.position, self.transform.rotation));
        }
        self.baked_item = Some(summary.item);
        self.state = AttachmentState::Attached;
        Ok(())
    }

    /// Transition to `Detached`. With `revert_position_rotation`, restores
    /// the transform snapshotted at attach time. Baked data is retained so
    /// re-attaching an unchanged target reproduces identical poses.
    pub fn detach(&mut self, revert_position_rotation: bool) {
        if revert_position_rotation {
            if let Some((position, rotation)) = self.original_transform {
                self.transform.position = position;
                self.transform.rotation = rotation;
            }
        }
        self.state = AttachmentState::Detached;
        self.offset_in_batch = None;
        self.current_gpu_results = None;
    }

    /// The baked pose range, for holders that persist baked data.
    pub fn baked_poses_and_item(&self) -> Option<(&[Pose], AttachmentItem)> {
        let item = self.baked_item?;
        let start = item.pose_start as usize;
        let end = start + item.pose_count as usize;
        Some((&self.poses[start..end], item))
    }

    /// Offset into the current batch's result buffers. Meaningful only
    /// between the batch's resolve and the end of that frame.
    pub fn offset_in_batch(&self) -> Option<u32> {
        self.offset_in_batch
    }

    /// GPU results buffer this attachment resolved into this frame.
    pub fn gpu_results_buffer(&self) -> Option<&Arc<wgpu::Buffer>> {
        self.current_gpu_results.as_ref()
    }

    /// Last position any resolve path produced for this attachment.
    pub fn last_resolved_position(&self) -> Option<Vec3> {
        self.last_resolved_position
    }

    /// Register a callback fired once per frame after this attachment's
    /// batch resolves. The encoder handle lets the callback enqueue further
    /// GPU work before the frame's commands are submitted.
    pub fn on_resolved(
        &mut self,
        callback: impl FnMut(&ResolveNotification<'_>, Option<&mut wgpu::CommandEncoder>)
            + Send
            + 'static,
    ) {
        self.resolved_callbacks.push(Box::new(callback));
    }
}
