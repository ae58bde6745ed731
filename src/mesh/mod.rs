//! Target mesh data consumed by the attachment pipeline
//!
//! The attachment subsystem never owns or mutates the target mesh; it reads
//! a [`MeshSnapshot`] produced by an external mesh-caching collaborator. The
//! builders in this module exist so the crate is usable standalone: a host
//! with its own mesh cache only needs to implement [`MeshSnapshotProvider`].

mod adjacency;
mod buffers;
mod snapshot;
mod vertex_lookup;

pub use adjacency::MeshAdjacency;
pub use buffers::MeshBuffers;
pub use snapshot::{MeshSnapshot, MeshSnapshotCache, MeshSnapshotProvider, TargetId};
pub use vertex_lookup::VertexLookup;
