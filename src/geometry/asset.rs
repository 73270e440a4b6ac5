//! Per-asset shadow geometry aggregate

use thiserror::Error;

use crate::scene::RenderObject;
use crate::ShadowConfig;

use super::mesh::ShadowMesh;

/// Why an asset produced no shadow geometry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("asset `{0}` opted out of shadow casting")]
    NotEligible(String),
    #[error("asset `{0}` has no shadow-casting submesh")]
    NoEligibleSubmesh(String),
    #[error("submesh {submesh} of `{name}` exceeds the vertex budget ({count} > {budget})")]
    VertexBudgetExceeded {
        name: String,
        submesh: usize,
        count: usize,
        budget: usize,
    },
}

/// All shadow meshes of one visual asset, shared by name across instances
///
/// Holds one fully built [`ShadowMesh`] (weld table, normals, adjacency)
/// per eligible submesh. Built once per asset name and shared via `Arc`;
/// dropping the last reference frees it.
#[derive(Debug)]
pub struct ShadowGeometry {
    name: String,
    meshes: Vec<ShadowMesh>,
}

impl ShadowGeometry {
    /// Build from a render object's leaf meshes
    ///
    /// Fails when the asset kind cannot cast stencil shadows, when no leaf
    /// casts shadows, or when a leaf exceeds the vertex budget that bounds
    /// adjacency and silhouette cost.
    pub fn from_render_object(
        object: &dyn RenderObject,
        config: &ShadowConfig,
    ) -> Result<Self, GeometryError> {
        let name = object.asset_name().to_string();
        if !object.is_shadow_eligible() {
            return Err(GeometryError::NotEligible(name));
        }

        let mut meshes = Vec::new();
        for (i, leaf) in object.leaf_meshes().iter().enumerate() {
            if !leaf.casts_shadow || leaf.indices.is_empty() {
                continue;
            }
            if leaf.positions.len() > config.max_submesh_vertices {
                return Err(GeometryError::VertexBudgetExceeded {
                    name,
                    submesh: i,
                    count: leaf.positions.len(),
                    budget: config.max_submesh_vertices,
                });
            }
            let mut mesh = ShadowMesh::new(leaf, config.weld_epsilon);
            mesh.build_polygon_normals();
            mesh.build_polygon_neighbors();
            meshes.push(mesh);
        }

        if meshes.is_empty() {
            return Err(GeometryError::NoEligibleSubmesh(name));
        }
        log::debug!(
            "built shadow geometry `{}`: {} submesh(es)",
            name,
            meshes.len()
        );
        Ok(Self { name, meshes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn mesh(&self, index: usize) -> &ShadowMesh {
        &self.meshes[index]
    }

    pub fn meshes(&self) -> &[ShadowMesh] {
        &self.meshes
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Mat4;

    use super::*;
    use crate::geometry::generators;
    use crate::scene::LeafMesh;

    struct FakeObject {
        name: String,
        eligible: bool,
        leaves: Vec<LeafMesh>,
    }

    impl FakeObject {
        fn new(name: &str, leaves: Vec<LeafMesh>) -> Self {
            Self {
                name: name.to_string(),
                eligible: true,
                leaves,
            }
        }
    }

    impl RenderObject for FakeObject {
        fn asset_name(&self) -> &str {
            &self.name
        }
        fn is_shadow_eligible(&self) -> bool {
            self.eligible
        }
        fn leaf_meshes(&self) -> Vec<LeafMesh> {
            self.leaves.clone()
        }
        fn world_transform(&self) -> Mat4 {
            Mat4::IDENTITY
        }
        fn bounding_radius(&self) -> f32 {
            1.0
        }
    }

    #[test]
    fn builds_one_mesh_per_eligible_leaf() {
        let object = FakeObject::new(
            "crate01",
            vec![
                generators::cube(1.0),
                generators::quad_sheet(1.0).without_shadow(),
                generators::quad_sheet(2.0).with_bone(4),
            ],
        );
        let geom = ShadowGeometry::from_render_object(&object, &ShadowConfig::default()).unwrap();

        assert_eq!(geom.name(), "crate01");
        assert_eq!(geom.mesh_count(), 2);
        assert_eq!(geom.mesh(0).bone(), 0);
        assert_eq!(geom.mesh(1).bone(), 4);
    }

    #[test]
    fn ineligible_asset_is_rejected() {
        let mut object = FakeObject::new("soldier", vec![generators::cube(1.0)]);
        object.eligible = false;
        let err = ShadowGeometry::from_render_object(&object, &ShadowConfig::default())
            .unwrap_err();
        assert_eq!(err, GeometryError::NotEligible("soldier".into()));
    }

    #[test]
    fn no_casting_leaf_is_rejected() {
        let object = FakeObject::new(
            "ghost",
            vec![generators::cube(1.0).without_shadow()],
        );
        assert!(matches!(
            ShadowGeometry::from_render_object(&object, &ShadowConfig::default()),
            Err(GeometryError::NoEligibleSubmesh(_))
        ));
    }

    #[test]
    fn vertex_budget_is_enforced() {
        let positions = vec![glam::Vec3::ZERO; 10];
        let indices = vec![0u32, 1, 2];
        let object = FakeObject::new("huge", vec![LeafMesh::new(positions, indices)]);
        let config = ShadowConfig {
            max_submesh_vertices: 9,
            ..Default::default()
        };
        assert!(matches!(
            ShadowGeometry::from_render_object(&object, &config),
            Err(GeometryError::VertexBudgetExceeded { budget: 9, count: 10, .. })
        ));
    }

    #[test]
    fn geometry_shares_via_arc() {
        let object = FakeObject::new("crate01", vec![generators::cube(1.0)]);
        let geom = Arc::new(
            ShadowGeometry::from_render_object(&object, &ShadowConfig::default()).unwrap(),
        );
        let second = geom.clone();
        assert!(Arc::ptr_eq(&geom, &second));
        assert_eq!(Arc::strong_count(&geom), 2);
    }
}
