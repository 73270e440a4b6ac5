//! Shared fixtures for the shadow subsystem integration tests

use std::cell::Cell;

use glam::{Mat4, Vec3};

use shadow_volumes::geometry::generators;
use shadow_volumes::{
    Aabb, Frustum, LeafMesh, LightSource, RenderObject, SceneView, TerrainHeightSource,
};

/// Scriptable render object: tests move it by setting `transform` and
/// observe geometry builds through `leaf_queries`.
pub struct TestObject {
    pub name: String,
    pub leaves: Vec<LeafMesh>,
    pub transform: Cell<Mat4>,
    pub radius: f32,
    pub eligible: bool,
    pub leaf_queries: Cell<usize>,
}

impl TestObject {
    pub fn new(name: &str, leaves: Vec<LeafMesh>) -> Self {
        Self {
            name: name.to_string(),
            leaves,
            transform: Cell::new(Mat4::IDENTITY),
            radius: 1.0,
            eligible: true,
            leaf_queries: Cell::new(0),
        }
    }

    /// A unit cube sitting at the origin
    pub fn cube(name: &str) -> Self {
        Self::new(name, vec![generators::cube(0.5)])
    }
}

impl RenderObject for TestObject {
    fn asset_name(&self) -> &str {
        &self.name
    }

    fn is_shadow_eligible(&self) -> bool {
        self.eligible
    }

    fn leaf_meshes(&self) -> Vec<LeafMesh> {
        self.leaf_queries.set(self.leaf_queries.get() + 1);
        self.leaves.clone()
    }

    fn world_transform(&self) -> Mat4 {
        self.transform.get()
    }

    fn bounding_radius(&self) -> f32 {
        self.radius
    }
}

/// Terrain with one height everywhere
pub struct FlatTerrain(pub f32);

impl TerrainHeightSource for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.0
    }
}

/// A camera above and behind the origin, one light high overhead, and a
/// generous visible terrain slab around the origin
pub fn overhead_scene() -> SceneView {
    let projection = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 500.0);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 30.0, 30.0), Vec3::ZERO, Vec3::Y);
    SceneView {
        frustum: Frustum::from_view_projection(&(projection * view)),
        visible_terrain: Aabb::new(
            Vec3::new(-100.0, -5.0, -100.0),
            Vec3::new(100.0, 5.0, 100.0),
        ),
        lights: vec![LightSource::new(Vec3::new(0.0, 100.0, 0.0))],
    }
}
