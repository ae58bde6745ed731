use super::MeshBuffers;

/// Vertex-to-triangle adjacency of the target mesh.
///
/// Built once per snapshot; the per-vertex triangle lists are in ascending
/// triangle-index order, which is what makes the two bake passes visit
/// candidates identically.
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    vertex_triangles: Vec<Vec<u32>>,
}

impl MeshAdjacency {
    pub fn build(buffers: &MeshBuffers) -> Self {
        let mut vertex_triangles = vec![Vec::new(); buffers.positions.len()];

        for triangle in 0..buffers.triangle_count() as u32 {
            for index in buffers.triangle_indices(triangle) {
                let list: &mut Vec<u32> = &mut vertex_triangles[index as usize];
                // a degenerate triangle can reference the same vertex twice
                if list.last() != Some(&triangle) {
                    list.push(triangle);
                }
            }
        }

        Self { vertex_triangles }
    }

    /// Triangles touching `vertex`, in ascending triangle-index order.
    pub fn triangles_of(&self, vertex: u32) -> &[u32] {
        self.vertex_triangles
            .get(vertex as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
