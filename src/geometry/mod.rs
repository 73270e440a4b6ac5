//! Shadow geometry: welded meshes, adjacency, and the per-asset cache

pub mod asset;
pub mod cache;
pub mod generators;
pub mod mesh;

pub use asset::{GeometryError, ShadowGeometry};
pub use cache::GeometryCache;
pub use mesh::{NeighborEdge, ShadowMesh, TriangleNeighbors};
