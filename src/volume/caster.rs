//! Per-instance shadow caster
//!
//! A [`VolumetricShadow`] binds one render object to its shared shadow
//! geometry and owns, per (light, submesh) pair, the silhouette buffer,
//! the extruded volume, a change-detection history, and the volume's
//! frustum classification. Its `update` decides each frame whether the
//! cached volume can be reused or must be rebuilt.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::backend::{BackendResult, RenderDevice, VolumeVertex};
use crate::geometry::{ShadowGeometry, ShadowMesh};
use crate::pool::{BufferPool, SlotId, SlotKind};
use crate::renderer::FrameStats;
use crate::scene::{Aabb, RenderObject, SceneView, TerrainHeightSource};
use crate::ShadowConfig;

use super::silhouette::{stitch_loops, SilhouetteBuffer};

/// How a caster's volume is backed
///
/// `Dynamic` rebuilds into a CPU buffer batched with other casters each
/// frame; `Static` builds once into a persistent GPU slot and is reused
/// until its orientation relative to the light changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowKind {
    Dynamic,
    Static,
}

/// Frustum classification of one volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Unknown,
    Visible,
    Invisible,
}

const INVALID_LIGHT_POSITION: Vec3 =
    Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);

/// Transform and light position a volume was last built against
#[derive(Debug, Clone, Copy)]
pub(crate) struct CastHistory {
    object_transform: Mat4,
    light_position: Vec3,
}

impl Default for CastHistory {
    fn default() -> Self {
        Self {
            object_transform: Mat4::IDENTITY,
            light_position: INVALID_LIGHT_POSITION,
        }
    }
}

impl CastHistory {
    pub(crate) fn invalidate(&mut self) {
        self.light_position = INVALID_LIGHT_POSITION;
    }

    fn is_valid(&self) -> bool {
        self.light_position.x.is_finite()
    }
}

/// CPU-side extruded volume geometry, cleared (not freed) between rebuilds
#[derive(Debug, Default)]
pub struct VolumeBuffer {
    pub(crate) vertices: Vec<VolumeVertex>,
    pub(crate) indices: Vec<u32>,
}

impl VolumeBuffer {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertices(&self) -> &[VolumeVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Persistent GPU backing for a static volume
#[derive(Debug, Clone, Copy)]
pub(crate) struct StaticSlot {
    pub(crate) vertex: SlotId,
    pub(crate) index: SlotId,
    pub(crate) index_count: u32,
}

/// Everything one (light, submesh) pair owns
#[derive(Debug)]
pub(crate) struct SubmeshVolume {
    pub(crate) history: CastHistory,
    pub(crate) silhouette: SilhouetteBuffer,
    pub(crate) volume: VolumeBuffer,
    pub(crate) bounds: Aabb,
    pub(crate) visibility: Visibility,
    pub(crate) static_slot: Option<StaticSlot>,
}

impl Default for SubmeshVolume {
    fn default() -> Self {
        Self {
            history: CastHistory::default(),
            silhouette: SilhouetteBuffer::new(),
            volume: VolumeBuffer::default(),
            bounds: Aabb::empty(),
            visibility: Visibility::Unknown,
            static_slot: None,
        }
    }
}

/// One live shadow-casting instance
pub struct VolumetricShadow {
    object: Arc<dyn RenderObject>,
    geometry: Arc<ShadowGeometry>,
    kind: ShadowKind,
    /// One entry per (light, submesh); light-major
    volumes: Vec<SubmeshVolume>,
    last_position: Vec3,
    optimal_extrusion_padding: Option<f32>,
}

impl VolumetricShadow {
    pub(crate) fn new(
        object: Arc<dyn RenderObject>,
        geometry: Arc<ShadowGeometry>,
        kind: ShadowKind,
    ) -> Self {
        Self {
            object,
            geometry,
            kind,
            volumes: Vec::new(),
            last_position: INVALID_LIGHT_POSITION,
            optimal_extrusion_padding: None,
        }
    }

    pub fn kind(&self) -> ShadowKind {
        self.kind
    }

    pub fn geometry(&self) -> &Arc<ShadowGeometry> {
        &self.geometry
    }

    pub(crate) fn volumes_mut(&mut self) -> &mut [SubmeshVolume] {
        &mut self.volumes
    }

    /// Force a rebuild on the next update regardless of motion
    pub(crate) fn invalidate_history(&mut self) {
        for vol in &mut self.volumes {
            vol.history.invalidate();
            vol.visibility = Visibility::Unknown;
        }
        self.optimal_extrusion_padding = None;
    }

    /// Return static slots to the pool (caster removal, scene reset)
    pub(crate) fn release_static_slots(&mut self, pool: &mut BufferPool) {
        for vol in &mut self.volumes {
            if let Some(slot) = vol.static_slot.take() {
                pool.release(slot.vertex);
                pool.release(slot.index);
            }
        }
    }

    /// Drop slot ids without touching the pool (device loss destroyed the
    /// buffers wholesale)
    pub(crate) fn forget_device_resources(&mut self) {
        for vol in &mut self.volumes {
            vol.static_slot = None;
        }
        self.invalidate_history();
    }

    fn ensure_volumes(&mut self, pool: &mut BufferPool, required: usize) {
        if self.volumes.len() == required {
            return;
        }
        self.release_static_slots(pool);
        self.volumes.clear();
        self.volumes.resize_with(required, SubmeshVolume::default);
    }

    /// Per-frame state machine: skip test, change detection, frustum
    /// reject, silhouette extraction, volume construction
    pub(crate) fn update(
        &mut self,
        device: &mut dyn RenderDevice,
        pool: &mut BufferPool,
        scene: &SceneView,
        terrain: &dyn TerrainHeightSource,
        config: &ShadowConfig,
        stats: &mut FrameStats,
    ) {
        let geometry = self.geometry.clone();
        let mesh_count = geometry.mesh_count();
        self.ensure_volumes(pool, scene.lights.len() * mesh_count);

        let world = self.object.world_transform();
        let position = world.w_axis.truncate();
        let radius = self.object.bounding_radius();

        // Early-out on casters off the visible terrain slab: anything far
        // beyond it by the configured radius factor, or off it and not
        // moving, keeps last frame's volumes untouched.
        let overshoot = scene.visible_terrain.axis_distance(position).max_element();
        let moved = position.distance_squared(self.last_position) > 1e-6;
        if overshoot > config.skip_radius_factor * radius || (overshoot > 0.0 && !moved) {
            stats.skipped += 1;
            return;
        }
        self.last_position = position;

        for (li, light) in scene.lights.iter().enumerate() {
            for mi in 0..mesh_count {
                let mesh = geometry.mesh(mi);
                let bone = self.object.bone_transform(mesh.bone());
                let slot_index = li * mesh_count + mi;

                let changed = cast_changed(
                    &self.volumes[slot_index].history,
                    &bone,
                    light.position,
                    config,
                );
                if !changed {
                    // Volume is reusable; only its frustum classification
                    // is refreshed, lazily at render.
                    self.volumes[slot_index].visibility = Visibility::Unknown;
                    stats.reused += 1;
                    continue;
                }

                let extrusion =
                    self.extrusion_distance(terrain, position, radius, light.position, config);

                // Reject before any geometry work: sweep the world-space
                // bounds along the cast direction and test the frustum.
                let world_bounds = mesh.object_bounds().transform(&bone);
                let cast_dir = (world_bounds.center() - light.position).normalize_or_zero();
                let swept = world_bounds.union(&world_bounds.translated(cast_dir * extrusion));
                if !scene.frustum.intersects_aabb(&swept) {
                    self.volumes[slot_index].visibility = Visibility::Invisible;
                    stats.culled += 1;
                    continue;
                }

                let light_object_space = bone.inverse().transform_point3(light.position);
                let vol = &mut self.volumes[slot_index];
                vol.history = CastHistory {
                    object_transform: bone,
                    light_position: light.position,
                };
                vol.silhouette.build(mesh, light_object_space);
                construct_volume(vol, mesh, &bone, light.position, extrusion);
                vol.visibility = Visibility::Unknown;
                stats.rebuilt += 1;

                if self.kind == ShadowKind::Static {
                    if let Err(err) = upload_static(vol, device, pool, geometry.name()) {
                        // This caster casts nothing this frame; retried on
                        // the next rebuild trigger.
                        log::debug!(
                            "static shadow volume upload failed for `{}`: {err}",
                            geometry.name()
                        );
                        vol.volume.clear();
                        vol.visibility = Visibility::Invisible;
                        vol.history.invalidate();
                    }
                }
            }
        }
    }

    /// Extrusion distance that projects the silhouette onto a plane below
    /// the lowest terrain under the caster's footprint
    fn extrusion_distance(
        &mut self,
        terrain: &dyn TerrainHeightSource,
        position: Vec3,
        radius: f32,
        light: Vec3,
        config: &ShadowConfig,
    ) -> f32 {
        let padding = if config.extrusion_padding > 0.0 {
            config.extrusion_padding
        } else if let Some(cached) = self.optimal_extrusion_padding {
            cached
        } else {
            let padding = (position.y - probe_lowest_height(terrain, position, radius)).max(0.0);
            self.optimal_extrusion_padding = Some(padding);
            padding
        };

        let dir = (position - light).normalize_or_zero();
        // Near-horizontal light directions would need unbounded volumes.
        let down = (-dir.y).max(0.1);
        ((radius + padding) / down).min(config.max_extrusion_distance)
    }
}

/// Lowest terrain height found at the caster's center and the four
/// footprint corners
fn probe_lowest_height(terrain: &dyn TerrainHeightSource, position: Vec3, radius: f32) -> f32 {
    let mut lowest = terrain.height_at(position.x, position.z);
    for (dx, dz) in [
        (radius, 0.0),
        (-radius, 0.0),
        (0.0, radius),
        (0.0, -radius),
    ] {
        lowest = lowest.min(terrain.height_at(position.x + dx, position.z + dz));
    }
    lowest
}

/// Whether the cached history no longer matches the current pose
fn cast_changed(
    history: &CastHistory,
    transform: &Mat4,
    light: Vec3,
    config: &ShadowConfig,
) -> bool {
    if !history.is_valid() {
        return true;
    }
    let cached = &history.object_transform;

    // Rotation: any basis vector swinging past the angular threshold.
    for (now, then) in [
        (transform.x_axis.truncate(), cached.x_axis.truncate()),
        (transform.y_axis.truncate(), cached.y_axis.truncate()),
        (transform.z_axis.truncate(), cached.z_axis.truncate()),
    ] {
        if now.normalize_or_zero().dot(then.normalize_or_zero()) < config.rotation_cos_threshold {
            return true;
        }
    }

    // Relative light motion: the angle between to-light vectors across
    // frames.
    let to_now = light - transform.w_axis.truncate();
    let to_then = history.light_position - cached.w_axis.truncate();
    if to_now.normalize_or_zero().dot(to_then.normalize_or_zero())
        < config.light_motion_cos_threshold
    {
        return true;
    }

    // A pure height change keeps the to-light direction stable under an
    // overhead light but still moves the ground projection.
    (transform.w_axis.y - cached.w_axis.y).abs() > config.light_height_epsilon
}

/// Stitch the silhouette into loops and extrude each into a closed side
/// wall: one near and one far vertex per silhouette vertex, one quad (two
/// triangles) per edge. A loop of N edges yields exactly 2N triangles.
fn construct_volume(
    vol: &mut SubmeshVolume,
    mesh: &ShadowMesh,
    object_to_world: &Mat4,
    light: Vec3,
    extrusion: f32,
) {
    vol.volume.clear();
    let mut bounds = Aabb::empty();

    let loops = stitch_loops(vol.silhouette.edges_mut());
    for range in loops {
        let n = range.len();
        if n < 3 {
            // Two edges cannot enclose anything; stitching residue on
            // non-manifold input.
            continue;
        }
        let base = vol.volume.vertices.len() as u32;
        for k in range {
            let vertex = vol.silhouette.edges()[k][0];
            let near = object_to_world.transform_point3(mesh.vertex(vertex));
            let far = near + (near - light).normalize_or_zero() * extrusion;
            bounds.expand(near);
            bounds.expand(far);
            vol.volume.vertices.push(VolumeVertex::new(near));
            vol.volume.vertices.push(VolumeVertex::new(far));
        }
        let count = n as u32;
        for k in 0..count {
            let near0 = base + 2 * k;
            let far0 = near0 + 1;
            let near1 = base + 2 * ((k + 1) % count);
            let far1 = near1 + 1;
            vol.volume
                .indices
                .extend_from_slice(&[near0, near1, far0, far0, near1, far1]);
        }
    }
    vol.bounds = bounds;
}

/// Move a freshly built volume into persistent GPU slots
fn upload_static(
    vol: &mut SubmeshVolume,
    device: &mut dyn RenderDevice,
    pool: &mut BufferPool,
    label: &str,
) -> BackendResult<()> {
    if let Some(slot) = vol.static_slot.take() {
        pool.release(slot.vertex);
        pool.release(slot.index);
    }
    if vol.volume.is_empty() {
        return Ok(());
    }

    let vertex = pool.acquire(
        device,
        SlotKind::Vertex,
        vol.volume.vertex_bytes().len() as u64,
        label,
    )?;
    let index = match pool.acquire(
        device,
        SlotKind::Index,
        vol.volume.index_bytes().len() as u64,
        label,
    ) {
        Ok(slot) => slot,
        Err(err) => {
            pool.release(vertex);
            return Err(err);
        }
    };
    pool.write(device, vertex, vol.volume.vertex_bytes());
    pool.write(device, index, vol.volume.index_bytes());

    vol.static_slot = Some(StaticSlot {
        vertex,
        index,
        index_count: vol.volume.indices.len() as u32,
    });
    // The CPU copy has served its purpose.
    vol.volume.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::generators;
    use crate::geometry::ShadowMesh;

    fn built_mesh(leaf: &crate::scene::LeafMesh) -> ShadowMesh {
        let mut mesh = ShadowMesh::new(leaf, 1e-4);
        mesh.build_polygon_normals();
        mesh.build_polygon_neighbors();
        mesh
    }

    fn config() -> ShadowConfig {
        ShadowConfig::default()
    }

    #[test]
    fn cube_volume_has_eight_triangles() {
        let mesh = built_mesh(&generators::cube(0.5));
        let mut vol = SubmeshVolume::default();
        let light = Vec3::new(0.0, 10.0, 0.0);

        vol.silhouette.build(&mesh, light);
        construct_volume(&mut vol, &mesh, &Mat4::IDENTITY, light, 20.0);

        assert_eq!(vol.volume.triangle_count(), 8);
        assert_eq!(vol.volume.vertices().len(), 8);
    }

    #[test]
    fn volume_triangle_count_is_twice_the_loop_length() {
        let mesh = built_mesh(&generators::cube(0.5));
        let mut vol = SubmeshVolume::default();
        // Oblique light: three faces lit, six-edge silhouette.
        let light = Vec3::new(3.0, 5.0, 2.0);

        vol.silhouette.build(&mesh, light);
        let edges = vol.silhouette.len();
        construct_volume(&mut vol, &mesh, &Mat4::IDENTITY, light, 20.0);

        assert_eq!(edges, 6);
        assert_eq!(vol.volume.triangle_count(), 2 * edges);
    }

    #[test]
    fn far_vertices_point_away_from_the_light() {
        let mesh = built_mesh(&generators::cube(0.5));
        let mut vol = SubmeshVolume::default();
        let light = Vec3::new(0.0, 10.0, 0.0);

        vol.silhouette.build(&mesh, light);
        construct_volume(&mut vol, &mesh, &Mat4::IDENTITY, light, 20.0);

        // Vertices alternate near, far; far vertices sit below the light.
        for pair in vol.volume.vertices().chunks(2) {
            let near = pair[0].position();
            let far = pair[1].position();
            assert!(far.y < near.y);
            assert!((far - near).length() > 19.0);
        }
        assert!(vol.bounds.min.y < -15.0);
    }

    #[test]
    fn change_detection_honors_rotation_threshold() {
        let cfg = config();
        let light = Vec3::new(0.0, 100.0, 0.0);
        let history = CastHistory {
            object_transform: Mat4::IDENTITY,
            light_position: light,
        };

        let below = Mat4::from_rotation_y(0.05f32.to_radians());
        let above = Mat4::from_rotation_y(1.0f32.to_radians());
        assert!(!cast_changed(&history, &below, light, &cfg));
        assert!(cast_changed(&history, &above, light, &cfg));
    }

    #[test]
    fn change_detection_honors_light_motion_threshold() {
        let cfg = config();
        let light = Vec3::new(0.0, 100.0, 0.0);
        let history = CastHistory {
            object_transform: Mat4::IDENTITY,
            light_position: light,
        };

        // ~0.06 degrees of light swing: reuse.
        assert!(!cast_changed(
            &history,
            &Mat4::IDENTITY,
            Vec3::new(0.1, 100.0, 0.0),
            &cfg
        ));
        // ~0.6 degrees: rebuild.
        assert!(cast_changed(
            &history,
            &Mat4::IDENTITY,
            Vec3::new(1.0, 100.0, 0.0),
            &cfg
        ));
    }

    #[test]
    fn height_change_triggers_rebuild_under_stable_light() {
        let cfg = config();
        let light = Vec3::new(0.0, 100.0, 0.0);
        let history = CastHistory {
            object_transform: Mat4::IDENTITY,
            light_position: light,
        };

        // Rising straight toward an overhead light keeps the to-light
        // direction constant; the height epsilon must catch it.
        let risen = Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0));
        assert!(cast_changed(&history, &risen, light, &cfg));

        let barely = Mat4::from_translation(Vec3::new(0.0, 1e-4, 0.0));
        assert!(!cast_changed(&history, &barely, light, &cfg));
    }

    #[test]
    fn invalid_history_always_rebuilds() {
        let cfg = config();
        let mut history = CastHistory {
            object_transform: Mat4::IDENTITY,
            light_position: Vec3::new(0.0, 100.0, 0.0),
        };
        history.invalidate();
        assert!(cast_changed(
            &history,
            &Mat4::IDENTITY,
            Vec3::new(0.0, 100.0, 0.0),
            &cfg
        ));
    }

    #[test]
    fn probe_takes_the_lowest_footprint_height() {
        struct SlopedTerrain;
        impl TerrainHeightSource for SlopedTerrain {
            fn height_at(&self, x: f32, _z: f32) -> f32 {
                x * 0.5
            }
        }
        // Center at x=0 gives 0; the -x corner at radius 2 gives -1.
        let lowest = probe_lowest_height(&SlopedTerrain, Vec3::new(0.0, 5.0, 0.0), 2.0);
        assert_eq!(lowest, -1.0);
    }
}
