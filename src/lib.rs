//! Stencil shadow volumes for animated 3D models
//!
//! Real-time dynamic shadows via the classic silhouette-extrusion /
//! stencil-buffer technique:
//! - Per-submesh adjacency graphs on welded vertices classify every edge as
//!   interior or silhouette under a given light
//! - Silhouette loops are extruded away from the light into closed volumes,
//!   rebuilt per frame for moving casters or cached in persistent GPU
//!   buffers for static ones
//! - A two-pass stencil draw counts volume crossings per pixel, then a
//!   full-screen pass darkens every pixel inside a volume
//!
//! # Architecture
//! - [`geometry`] — welded shadow meshes, adjacency, and the name-keyed
//!   cache sharing geometry across instances of the same asset
//! - [`volume`] — per-instance casters: silhouette buffers, extruded
//!   volumes, and the rebuild-or-reuse decision
//! - [`renderer`] — the subsystem facade: caster registry, per-frame
//!   update, stencil render passes, device-loss lifecycle
//! - [`backend`] — the stencil-capable device abstraction the draws go
//!   through, plus a recording dummy device
//! - [`scene`] — collaborator contracts: render objects, terrain height,
//!   frustum, lights

pub mod backend;
pub mod geometry;
pub mod pool;
pub mod renderer;
pub mod scene;
pub mod volume;

pub use backend::{BackendError, BackendResult, DummyDevice, RenderDevice};
pub use geometry::{GeometryCache, GeometryError, ShadowGeometry, ShadowMesh};
pub use renderer::{FrameStats, ShadowHandle, ShadowVolumeRenderer};
pub use scene::{
    Aabb, Frustum, LeafMesh, LightSource, RenderObject, SceneView, TerrainHeightSource,
};
pub use volume::{ShadowKind, SilhouetteBuffer, Visibility, VolumetricShadow};

/// Tuning knobs for the shadow subsystem
///
/// The angular and height thresholds gate volume rebuilds; they are
/// empirically tuned trade-offs between shadow accuracy and rebuild cost,
/// exposed here rather than baked into the logic.
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    /// Master switch; when false `add_shadow` hands out no casters
    pub enabled: bool,
    /// Vertices closer than this are merged before adjacency is computed
    pub weld_epsilon: f32,
    /// Upper bound on per-submesh vertex count; bounds the quadratic
    /// adjacency build and the worst-case silhouette size
    pub max_submesh_vertices: usize,
    /// Rebuild when any transform basis vector swings past this cosine
    /// (default: 0.2 degrees)
    pub rotation_cos_threshold: f32,
    /// Rebuild when the caster-to-light direction swings past this cosine
    pub light_motion_cos_threshold: f32,
    /// Rebuild when the caster's height changes by more than this while
    /// the to-light direction is stable
    pub light_height_epsilon: f32,
    /// Casters farther than this times their bounding radius outside the
    /// visible terrain region are skipped entirely
    pub skip_radius_factor: f32,
    /// Fixed extrusion padding below the caster; `0.0` probes the terrain
    /// under the caster's footprint instead
    pub extrusion_padding: f32,
    /// Hard cap on extrusion length for near-horizontal lights
    pub max_extrusion_distance: f32,
    /// Multiplied into the framebuffer wherever a pixel is in shadow
    pub shadow_tint: [f32; 3],
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weld_epsilon: 1e-4,
            max_submesh_vertices: 4096,
            rotation_cos_threshold: 0.999_993_9,
            light_motion_cos_threshold: 0.999_993_9,
            light_height_epsilon: 1e-3,
            skip_radius_factor: 1.5,
            extrusion_padding: 0.0,
            max_extrusion_distance: 1000.0,
            shadow_tint: [0.5, 0.5, 0.5],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_enabled_and_probes_terrain() {
        let config = ShadowConfig::default();
        assert!(config.enabled);
        assert_eq!(config.extrusion_padding, 0.0);
        // Thresholds correspond to roughly 0.2 degrees.
        assert!(config.rotation_cos_threshold < 1.0);
        assert!(config.rotation_cos_threshold > 0.2f32.to_radians().cos() - 1e-6);
    }
}
