//! Synchronous CPU resolution
//!
//! The mirror of the resolve shader: rebuild each pose's triangle frame from
//! the current vertex positions, decode the baked offset, average over the
//! attachment's poses, then move the result into world space. Degenerate
//! triangles are skipped under the same epsilon the shader uses, so both
//! paths agree pose for pose.

use glam::{Affine3A, Vec3};

use crate::attachment::{Pose, TriangleFrame};
use crate::mesh::MeshBuffers;

/// Resolve one attachment's poses against current vertex data, in target
/// local space. `None` when every pose's triangle is currently degenerate;
/// callers keep the last known position in that case.
pub fn resolve_poses_local(poses: &[Pose], buffers: &MeshBuffers) -> Option<Vec3> {
    let mut sum = Vec3::ZERO;
    let mut valid = 0u32;

    for pose in poses {
        let vertices = buffers.triangle_vertices(pose.triangle);
        let Some(frame) = TriangleFrame::from_vertices(vertices) else {
            continue;
        };
        sum += frame.decode(pose.local_offset);
        valid += 1;
    }

    (valid > 0).then(|| sum / valid as f32)
}

/// [`resolve_poses_local`] followed by the target's current local-to-world.
pub fn resolve_poses_world(
    poses: &[Pose],
    buffers: &MeshBuffers,
    target_to_world: Affine3A,
) -> Option<Vec3> {
    resolve_poses_local(poses, buffers).map(|local| target_to_world.transform_point3(local))
}
