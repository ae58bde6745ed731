use glam::{Affine3A, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{MeshAdjacency, MeshBuffers, VertexLookup};

/// Identifies an attachment target (a renderer, in engine terms) across the
/// snapshot provider and the attachment registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u64);

/// Everything the attachment pipeline reads about one target mesh: current
/// vertex buffers, triangle adjacency, a nearest-vertex query, and the
/// target's local-to-world transform at snapshot time.
///
/// Snapshots are produced and owned by an external mesh-caching collaborator;
/// this subsystem treats them as read-only. [`MeshSnapshot::update_positions`]
/// and [`MeshSnapshot::set_target_to_world`] exist for that collaborator (and
/// for tests) to push new deformation state in.
#[derive(Debug, Clone)]
pub struct MeshSnapshot {
    pub buffers: MeshBuffers,
    pub adjacency: MeshAdjacency,
    pub lookup: VertexLookup,
    target_to_world: Affine3A,
}

impl MeshSnapshot {
    pub fn new(buffers: MeshBuffers, target_to_world: Affine3A) -> Self {
        let adjacency = MeshAdjacency::build(&buffers);
        let lookup = VertexLookup::build(&buffers.positions);
        Self {
            buffers,
            adjacency,
            lookup,
            target_to_world,
        }
    }

    pub fn has_triangles(&self) -> bool {
        self.buffers.triangle_count() > 0
    }

    pub fn target_to_world(&self) -> Affine3A {
        self.target_to_world
    }

    pub fn world_to_target(&self) -> Affine3A {
        self.target_to_world.inverse()
    }

    /// The target moved rigidly; deformation state is unchanged.
    pub fn set_target_to_world(&mut self, target_to_world: Affine3A) {
        self.target_to_world = target_to_world;
    }

    /// Replace vertex positions with a new deformation state. Topology must
    /// be unchanged; the nearest-vertex query is rebuilt so later bakes see
    /// the current surface.
    pub fn update_positions(&mut self, positions: &[Vec3]) {
        assert_eq!(
            positions.len(),
            self.buffers.positions.len(),
            "deformation update must not change vertex count"
        );
        self.buffers.positions.clear();
        self.buffers.positions.extend_from_slice(positions);
        self.lookup = VertexLookup::build(&self.buffers.positions);
    }
}

/// Narrow interface through which the attachment pipeline obtains mesh data.
pub trait MeshSnapshotProvider {
    fn target_mesh_info(&self, target: TargetId) -> Option<&MeshSnapshot>;
}

/// In-memory snapshot store, the default provider for hosts without their
/// own mesh cache.
#[derive(Debug, Default)]
pub struct MeshSnapshotCache {
    snapshots: FxHashMap<TargetId, MeshSnapshot>,
    next_target: u64,
}

impl MeshSnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: MeshSnapshot) -> TargetId {
        let target = TargetId(self.next_target);
        self.next_target += 1;
        self.snapshots.insert(target, snapshot);
        target
    }

    pub fn remove(&mut self, target: TargetId) -> Option<MeshSnapshot> {
        self.snapshots.remove(&target)
    }

    pub fn get_mut(&mut self, target: TargetId) -> Option<&mut MeshSnapshot> {
        self.snapshots.get_mut(&target)
    }
}

impl MeshSnapshotProvider for MeshSnapshotCache {
    fn target_mesh_info(&self, target: TargetId) -> Option<&MeshSnapshot> {
        self.snapshots.get(&target)
    }
}
