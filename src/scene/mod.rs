//! Scene-side collaborator types: bounds, frustum, provider contracts

pub mod bounds;
pub mod frustum;
pub mod providers;

pub use bounds::Aabb;
pub use frustum::Frustum;
pub use providers::{LeafMesh, LightSource, RenderObject, SceneView, TerrainHeightSource};
