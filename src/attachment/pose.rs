use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::DEGENERATE_TRIANGLE_EPSILON;

/// One baked surface-relative pose: an offset expressed in the local frame
/// of a target-mesh triangle. Immutable once baked; resolving it against the
/// triangle's current vertices reproduces the attach point on the deformed
/// surface.
///
/// Layout is load-bearing: 16 bytes, no padding, uploaded verbatim to the
/// resolve shader.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
pub struct Pose {
    pub triangle: u32,
    pub local_offset: [f32; 3],
}

/// A contiguous range of poses belonging to one attachment.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
pub struct AttachmentItem {
    pub pose_start: u32,
    pub pose_count: u32,
}

/// Orthonormal frame of a triangle, derived purely from its vertices.
///
/// `origin = v0`, `e1` along the first edge, `normal` from the edge cross
/// product, `e2 = normal x e1`. The same construction runs in the WGSL
/// resolver, so offsets encoded here decode identically on the GPU.
#[derive(Debug, Clone, Copy)]
pub struct TriangleFrame {
    pub origin: Vec3,
    pub e1: Vec3,
    pub e2: Vec3,
    pub normal: Vec3,
}

impl TriangleFrame {
    /// `None` for degenerate triangles (zero-length edge or zero area).
    pub fn from_vertices([v0, v1, v2]: [Vec3; 3]) -> Option<Self> {
        let edge1 = v1 - v0;
        let cross = edge1.cross(v2 - v0);
        if edge1.length_squared() <= DEGENERATE_TRIANGLE_EPSILON
            || cross.length_squared() <= DEGENERATE_TRIANGLE_EPSILON
        {
            return None;
        }
        let e1 = edge1.normalize();
        let normal = cross.normalize();
        Some(Self {
            origin: v0,
            e1,
            e2: normal.cross(e1),
            normal,
        })
    }

    /// Express `point` in this frame.
    pub fn encode(&self, point: Vec3) -> [f32; 3] {
        let r = point - self.origin;
        [r.dot(self.e1), r.dot(self.e2), r.dot(self.normal)]
    }

    /// Reconstruct a point from a frame-relative offset.
    pub fn decode(&self, offset: [f32; 3]) -> Vec3 {
        self.origin + self.e1 * offset[0] + self.e2 * offset[1] + self.normal * offset[2]
    }

    /// Whether the projection of `point` onto the triangle's plane lies
    /// inside the triangle (barycentric coordinates all within [0, 1]).
    pub fn contains_projected(&self, [v0, v1, v2]: [Vec3; 3], point: Vec3) -> bool {
        let a = v1 - v0;
        let b = v2 - v0;
        let r = point - v0;
        // dotting against in-plane edges projects r implicitly
        let d00 = a.dot(a);
        let d01 = a.dot(b);
        let d11 = b.dot(b);
        let d20 = r.dot(a);
        let d21 = r.dot(b);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() <= DEGENERATE_TRIANGLE_EPSILON {
            return false;
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;
        (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v) && (0.0..=1.0).contains(&w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: [Vec3; 3] = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ];

    #[test]
    fn pose_layouts_match_gpu_contract() {
        assert_eq!(std::mem::size_of::<Pose>(), 16);
        assert_eq!(std::mem::align_of::<Pose>(), 4);
        assert_eq!(std::mem::size_of::<AttachmentItem>(), 8);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let frame = TriangleFrame::from_vertices(TRIANGLE).unwrap();
        let point = Vec3::new(0.3, 0.25, 0.8);
        let decoded = frame.decode(frame.encode(point));
        assert!(decoded.distance(point) < 1e-6);
    }

    #[test]
    fn degenerate_triangles_have_no_frame() {
        let collapsed = [Vec3::ZERO, Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)];
        assert!(TriangleFrame::from_vertices(collapsed).is_none());

        let collinear = [
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];
        assert!(TriangleFrame::from_vertices(collinear).is_none());
    }

    #[test]
    fn containment_test_tracks_projection() {
        let frame = TriangleFrame::from_vertices(TRIANGLE).unwrap();
        // above the surface but projecting inside
        assert!(frame.contains_projected(TRIANGLE, Vec3::new(0.2, 0.2, 5.0)));
        assert!(!frame.contains_projected(TRIANGLE, Vec3::new(1.0, 1.0, 0.0)));
        assert!(!frame.contains_projected(TRIANGLE, Vec3::new(-0.1, 0.2, 0.0)));
    }
}
