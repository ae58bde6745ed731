use glam::Vec3;

/// Per-vertex and index data of the target mesh at its current deformation.
///
/// Positions and the triangle index buffer are what baking and resolution
/// read. Normals travel with the snapshot for consumers that want them; the
/// attachment math derives its frames from triangle edges instead so it
/// stays consistent between the CPU and GPU paths.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Triangle index buffer, three indices per triangle.
    pub triangles: Vec<u32>,
}

impl MeshBuffers {
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, triangles: Vec<u32>) -> Self {
        debug_assert!(triangles.len() % 3 == 0, "index buffer length must be a multiple of 3");
        Self {
            positions,
            normals,
            triangles,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn triangle_indices(&self, triangle: u32) -> [u32; 3] {
        let base = triangle as usize * 3;
        [
            self.triangles[base],
            self.triangles[base + 1],
            self.triangles[base + 2],
        ]
    }

    pub fn triangle_vertices(&self, triangle: u32) -> [Vec3; 3] {
        let [i0, i1, i2] = self.triangle_indices(triangle);
        [
            self.positions[i0 as usize],
            self.positions[i1 as usize],
            self.positions[i2 as usize],
        ]
    }

    /// Positions flattened to `[x, y, z, x, y, z, ..]` for GPU upload.
    pub fn packed_positions(&self) -> Vec<f32> {
        let mut packed = Vec::with_capacity(self.positions.len() * 3);
        for p in &self.positions {
            packed.extend_from_slice(&[p.x, p.y, p.z]);
        }
        packed
    }
}
