//! Collaborator contracts: render objects, terrain, lights
//!
//! The shadow subsystem never walks the engine's scene graph itself. It
//! consumes these narrow interfaces, implemented by the engine per asset
//! kind.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use super::bounds::Aabb;
use super::frustum::Frustum;

/// Static geometry of one leaf mesh of a visual asset
#[derive(Debug, Clone)]
pub struct LeafMesh {
    pub positions: Arc<[Vec3]>,
    pub indices: Arc<[u32]>,
    /// Meshes flagged to never cast shadows are skipped, not an error
    pub casts_shadow: bool,
    /// Bone driving this mesh; `0` for flat (non-hierarchical) assets
    pub bone: usize,
}

impl LeafMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        debug_assert!(indices.len() % 3 == 0, "indices must form whole triangles");
        Self {
            positions: positions.into(),
            indices: indices.into(),
            casts_shadow: true,
            bone: 0,
        }
    }

    pub fn with_bone(mut self, bone: usize) -> Self {
        self.bone = bone;
        self
    }

    pub fn without_shadow(mut self) -> Self {
        self.casts_shadow = false;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A shadow-casting render object
///
/// One implementation per asset kind replaces switch-on-type branching:
/// flat meshes return a single leaf with bone 0, hierarchical LOD assets
/// return every leaf of their highest-detail level with real bone indices,
/// and skinned/deformable assets report themselves ineligible.
pub trait RenderObject {
    /// Asset name; the key under which shadow geometry is shared
    fn asset_name(&self) -> &str;

    /// Whether this asset kind can cast stencil shadows at all
    fn is_shadow_eligible(&self) -> bool;

    /// Leaf meshes of the highest-detail level
    fn leaf_meshes(&self) -> Vec<LeafMesh>;

    /// World transform of the whole object this frame
    fn world_transform(&self) -> Mat4;

    /// World transform of one bone this frame; flat assets fall back to the
    /// object transform
    fn bone_transform(&self, bone: usize) -> Mat4 {
        let _ = bone;
        self.world_transform()
    }

    /// Radius of the object's bounding sphere
    fn bounding_radius(&self) -> f32;
}

/// Terrain height queries (Y-up)
pub trait TerrainHeightSource {
    fn height_at(&self, x: f32, z: f32) -> f32;
}

/// World-space light position
///
/// A directional sun is modeled as a far-away position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub position: Vec3,
}

impl LightSource {
    pub fn new(position: Vec3) -> Self {
        Self { position }
    }
}

/// Per-frame view state consumed by shadow update and render
#[derive(Debug, Clone)]
pub struct SceneView {
    pub frustum: Frustum,
    /// Bounding box of the terrain region visible this frame
    pub visible_terrain: Aabb,
    pub lights: Vec<LightSource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_mesh_builder() {
        let mesh = LeafMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
        )
        .with_bone(3)
        .without_shadow();

        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.bone, 3);
        assert!(!mesh.casts_shadow);
    }
}
