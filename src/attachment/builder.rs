//! Two-pass pose baking
//!
//! Converting an attach point into poses runs the same candidate walk twice:
//! a measure pass that only counts, then a fill pass that writes at final
//! offsets after the destination arrays have grown. Arrays never shrink
//! here, so slots owned by sibling attachments sharing the arena survive a
//! re-bake. Both passes go through [`for_each_candidate`]; that single walk
//! is what guarantees the counts agree.

use glam::Vec3;

use super::{AttachmentItem, Pose, TriangleFrame};
use crate::error::{AttachmentError, AttachmentResult};
use crate::mesh::{MeshSnapshot, TargetId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseBuildSettings {
    /// Restrict candidate triangles to those whose surface contains the
    /// projected attach point. Defaults to the coarse strategy (any triangle
    /// adjacent to the nearest vertex); the strict path is kept behind this
    /// flag and is not the default.
    pub only_allow_pose_triangles_containing_attached_point: bool,
}

impl Default for PoseBuildSettings {
    fn default() -> Self {
        Self {
            only_allow_pose_triangles_containing_attached_point: false,
        }
    }
}

/// Result of a successful bake: the item describing the written pose range,
/// and the measure-pass count it was sized from.
#[derive(Debug, Clone, Copy)]
pub struct BakeSummary {
    pub item: AttachmentItem,
    pub measured_poses: u32,
}

/// Bake `attach_point` (target-local space) against `snapshot`, writing
/// poses at `poses[pose_offset..]` and one item at `items[item_offset]`.
///
/// Fails with `InvalidTarget` when the snapshot has no triangles or no
/// candidate survives selection. A measure/fill count disagreement is a
/// defect: debug builds assert, release builds refuse the bake.
pub fn bake_into(
    poses: &mut Vec<Pose>,
    items: &mut Vec<AttachmentItem>,
    pose_offset: usize,
    item_offset: usize,
    attach_point: Vec3,
    snapshot: &MeshSnapshot,
    settings: PoseBuildSettings,
    target: TargetId,
) -> AttachmentResult<BakeSummary> {
    if !snapshot.has_triangles() {
        return Err(AttachmentError::invalid_target(
            target,
            "target mesh has no triangles",
        ));
    }

    // pass 1: measure
    let mut measured = 0usize;
    for_each_candidate(snapshot, attach_point, settings, target, |_, _| {
        measured += 1;
    })?;

    if measured == 0 {
        return Err(AttachmentError::invalid_target(
            target,
            "no candidate triangles near attach point",
        ));
    }

    grow_to(poses, pose_offset + measured);
    grow_to(items, item_offset + 1);

    // pass 2: fill, identical walk
    let mut written = 0usize;
    for_each_candidate(snapshot, attach_point, settings, target, |triangle, frame| {
        if written < measured {
            poses[pose_offset + written] = Pose {
                triangle,
                local_offset: frame.encode(attach_point),
            };
        }
        written += 1;
    })?;

    if written != measured {
        debug_assert_eq!(
            written, measured,
            "pose bake fill pass diverged from measure pass"
        );
        log::error!(
            "[PoseBuilder] measure/fill mismatch baking against {:?}: measured {}, wrote {}",
            target,
            measured,
            written
        );
        return Err(AttachmentError::BufferSizeMismatch {
            measured,
            written,
        });
    }

    let item = AttachmentItem {
        pose_start: pose_offset as u32,
        pose_count: measured as u32,
    };
    items[item_offset] = item;

    Ok(BakeSummary {
        item,
        measured_poses: measured as u32,
    })
}

/// Deterministic candidate walk shared by both bake passes: the triangles
/// adjacent to the vertex nearest the attach point, visited in ascending
/// triangle-index order, skipping degenerate triangles and (with the strict
/// setting) triangles not containing the projected point.
fn for_each_candidate(
    snapshot: &MeshSnapshot,
    attach_point: Vec3,
    settings: PoseBuildSettings,
    target: TargetId,
    mut visit: impl FnMut(u32, &TriangleFrame),
) -> AttachmentResult<()> {
    let (nearest_vertex, _) = snapshot.lookup.find_nearest(attach_point).ok_or_else(|| {
        AttachmentError::invalid_target(target, "no spatial index / empty vertex buffer")
    })?;

    for &triangle in snapshot.adjacency.triangles_of(nearest_vertex) {
        let vertices = snapshot.buffers.triangle_vertices(triangle);
        let Some(frame) = TriangleFrame::from_vertices(vertices) else {
            continue;
        };
        if settings.only_allow_pose_triangles_containing_attached_point
            && !frame.contains_projected(vertices, attach_point)
        {
            continue;
        }
        visit(triangle, &frame);
    }

    Ok(())
}

/// Grow-only resize; existing slots (sibling attachments') are untouched.
fn grow_to<T: bytemuck::Zeroable + Clone>(buffer: &mut Vec<T>, len: usize) {
    if buffer.len() < len {
        buffer.resize(len, T::zeroed());
    }
}
