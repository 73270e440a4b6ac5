//! Shadow volume renderer
//!
//! Owns the registry of live shadow casters, the geometry cache, and the
//! GPU buffer pool, and drives the per-frame sequence: `update` walks every
//! caster's rebuild state machine, `render_shadows` performs the two-pass
//! stencil draw followed by the full-screen darkening pass.
//!
//! Single-threaded and frame-sequential: `update` completes before
//! `render_shadows` begins, and reentrant rendering is a programmer error.

use std::sync::Arc;

use crate::backend::{
    BackendResult, BlendMode, BufferDescriptor, BufferHandle, BufferUsage, ColorWrites,
    CompareFunction, CullMode, IndexFormat, RenderDevice, RenderState, StencilFaceState,
    StencilOperation, StencilState, VolumeVertex,
};
use crate::geometry::GeometryCache;
use crate::pool::{BufferPool, SlotId, SlotKind};
use crate::scene::{RenderObject, SceneView, TerrainHeightSource};
use crate::volume::{ShadowKind, Visibility, VolumetricShadow};
use crate::ShadowConfig;

/// Generation-tagged handle to a registered shadow caster
///
/// Stale handles (removed, or from before a reset) are ignored by every
/// operation that accepts one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowHandle {
    index: u32,
    generation: u32,
}

/// Counters for the most recent update/render cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Volumes rebuilt (silhouette + extrusion) this frame
    pub rebuilt: u32,
    /// Volumes reused unchanged from a previous frame
    pub reused: u32,
    /// Casters skipped by the terrain-slab early-out
    pub skipped: u32,
    /// Volumes rejected by the frustum before geometry work
    pub culled: u32,
    /// Volumes submitted to the stencil passes
    pub drawn: u32,
}

struct RegistrySlot {
    generation: u32,
    caster: Option<VolumetricShadow>,
}

/// Process-wide shadow subsystem
pub struct ShadowVolumeRenderer {
    config: ShadowConfig,
    cache: GeometryCache,
    pool: BufferPool,
    slots: Vec<RegistrySlot>,
    free: Vec<u32>,
    /// Per-frame batch of every dynamic caster's volume geometry
    batch_vertices: Vec<VolumeVertex>,
    batch_indices: Vec<u32>,
    scratch_vertex: Option<SlotId>,
    scratch_index: Option<SlotId>,
    screen_quad: Option<BufferHandle>,
    stats: FrameStats,
    stencil_supported: bool,
    initialized: bool,
    in_render: bool,
}

impl ShadowVolumeRenderer {
    pub fn new(config: ShadowConfig) -> Self {
        Self {
            config,
            cache: GeometryCache::new(),
            pool: BufferPool::new(),
            slots: Vec::new(),
            free: Vec::new(),
            batch_vertices: Vec::new(),
            batch_indices: Vec::new(),
            scratch_vertex: None,
            scratch_index: None,
            screen_quad: None,
            stats: FrameStats::default(),
            stencil_supported: false,
            initialized: false,
            in_render: false,
        }
    }

    /// Acquire device-side resources; must run before the first frame
    pub fn init(&mut self, device: &mut dyn RenderDevice) -> BackendResult<()> {
        self.stencil_supported = device.supports_stencil();
        if !self.stencil_supported {
            log::warn!("depth buffer has no stencil bits; shadow volumes disabled");
            self.initialized = true;
            return Ok(());
        }
        self.screen_quad = Some(create_screen_quad(device)?);
        self.initialized = true;
        Ok(())
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    pub fn geometry_cache(&self) -> &GeometryCache {
        &self.cache
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn shadow_count(&self) -> usize {
        self.slots.iter().filter(|s| s.caster.is_some()).count()
    }

    pub fn get(&self, handle: ShadowHandle) -> Option<&VolumetricShadow> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.caster.as_ref()
    }

    /// Register a caster for `object`, sharing geometry across instances
    /// of the same asset
    ///
    /// Returns `None` when shadows are disabled, the device lacks stencil
    /// support, the asset is known-unshadowable, or geometry construction
    /// fails (the asset is then remembered as unshadowable).
    pub fn add_shadow(
        &mut self,
        object: Arc<dyn RenderObject>,
        kind: ShadowKind,
    ) -> Option<ShadowHandle> {
        if !self.config.enabled || !self.initialized || !self.stencil_supported {
            return None;
        }
        if self.cache.is_missing(object.asset_name()) {
            return None;
        }
        let geometry = match self.cache.load(object.as_ref(), &self.config) {
            Ok(geometry) => geometry,
            Err(err) => {
                log::warn!("no shadow geometry for `{}`: {err}", object.asset_name());
                self.cache.register_missing(object.asset_name());
                return None;
            }
        };
        let caster = VolumetricShadow::new(object, geometry, kind);
        Some(self.insert(caster))
    }

    /// Unregister a caster; stale handles are ignored
    pub fn remove_shadow(&mut self, handle: ShadowHandle) {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return;
        };
        if slot.generation != handle.generation {
            return;
        }
        if let Some(mut caster) = slot.caster.take() {
            caster.release_static_slots(&mut self.pool);
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index);
        }
    }

    /// Drive every live caster's rebuild decision for this frame
    pub fn update(
        &mut self,
        device: &mut dyn RenderDevice,
        scene: &SceneView,
        terrain: &dyn TerrainHeightSource,
    ) {
        debug_assert!(!self.in_render, "update during shadow rendering");
        self.stats = FrameStats::default();
        if !self.config.enabled || !self.initialized || !self.stencil_supported {
            return;
        }
        let Self {
            slots,
            pool,
            config,
            stats,
            ..
        } = self;
        for slot in slots.iter_mut() {
            if let Some(caster) = slot.caster.as_mut() {
                caster.update(device, pool, scene, terrain, config, stats);
            }
        }
    }

    /// Two-pass stencil draw over every visible volume, then the
    /// full-screen darkening pass
    ///
    /// Pass 1 writes volume geometry into the stencil buffer with color
    /// writes disabled: front-facing triangles increment, back-facing
    /// decrement (two draws with opposite cull and stencil op). Pass 2
    /// draws a full-screen quad that modulates the framebuffer by the
    /// configured tint wherever the stencil value is nonzero, clearing the
    /// stencil as it goes. `force_stencil_fill` darkens the whole screen
    /// regardless of the stencil result.
    ///
    /// The caller is expected to have the frame's depth buffer bound and
    /// the stencil cleared at frame start.
    pub fn render_shadows(
        &mut self,
        device: &mut dyn RenderDevice,
        scene: &SceneView,
        force_stencil_fill: bool,
    ) {
        debug_assert!(!self.in_render, "shadow rendering reentered");
        self.in_render = true;
        if !self.config.enabled || !self.initialized || !self.stencil_supported {
            self.in_render = false;
            return;
        }

        // Resolve visibility and split volumes into the dynamic batch and
        // direct static draws.
        self.batch_vertices.clear();
        self.batch_indices.clear();
        let mut static_draws: Vec<(SlotId, SlotId, u32)> = Vec::new();
        {
            let Self {
                slots,
                batch_vertices,
                batch_indices,
                stats,
                ..
            } = self;
            for slot in slots.iter_mut() {
                let Some(caster) = slot.caster.as_mut() else {
                    continue;
                };
                for vol in caster.volumes_mut() {
                    if vol.visibility == Visibility::Unknown {
                        vol.visibility = if scene.frustum.intersects_aabb(&vol.bounds) {
                            Visibility::Visible
                        } else {
                            Visibility::Invisible
                        };
                    }
                    if vol.visibility == Visibility::Invisible {
                        continue;
                    }
                    if let Some(gpu) = vol.static_slot {
                        static_draws.push((gpu.vertex, gpu.index, gpu.index_count));
                        stats.drawn += 1;
                    } else if !vol.volume.is_empty() {
                        let base = batch_vertices.len() as u32;
                        batch_vertices.extend_from_slice(vol.volume.vertices());
                        batch_indices.extend(vol.volume.indices().iter().map(|&i| i + base));
                        stats.drawn += 1;
                    }
                }
            }
        }

        let batch = if self.batch_indices.is_empty() {
            None
        } else {
            match self.upload_batch(device) {
                Ok(slots) => Some(slots),
                Err(err) => {
                    log::warn!("dynamic shadow batch upload failed: {err}");
                    None
                }
            }
        };

        let any_volume = batch.is_some() || !static_draws.is_empty();
        if any_volume {
            for (pass_op, cull) in [
                (StencilOperation::IncrementWrap, CullMode::Back),
                (StencilOperation::DecrementWrap, CullMode::Front),
            ] {
                device.set_render_state(&volume_pass_state(pass_op, cull));
                if let Some((vertex, index)) = batch {
                    device.set_vertex_buffer(self.pool.handle(vertex), 0);
                    device.set_index_buffer(self.pool.handle(index), 0, IndexFormat::Uint32);
                    device.draw_indexed(0..self.batch_indices.len() as u32, 0);
                }
                for &(vertex, index, count) in &static_draws {
                    device.set_vertex_buffer(self.pool.handle(vertex), 0);
                    device.set_index_buffer(self.pool.handle(index), 0, IndexFormat::Uint32);
                    device.draw_indexed(0..count, 0);
                }
            }
        }

        if any_volume || force_stencil_fill {
            if let Some(quad) = self.screen_quad {
                device.set_render_state(&overlay_state(force_stencil_fill, self.config.shadow_tint));
                device.set_vertex_buffer(quad, 0);
                device.draw(0..6);
            }
        }
        self.in_render = false;
    }

    /// Release every device-side resource (device loss)
    ///
    /// Cached light histories become meaningless across a device reset, so
    /// every caster is also invalidated and will rebuild after reacquire.
    pub fn release_resources(&mut self, device: &mut dyn RenderDevice) {
        for slot in &mut self.slots {
            if let Some(caster) = slot.caster.as_mut() {
                caster.forget_device_resources();
            }
        }
        self.pool.release_device_buffers(device);
        self.scratch_vertex = None;
        self.scratch_index = None;
        if let Some(quad) = self.screen_quad.take() {
            device.destroy_buffer(quad);
        }
        self.initialized = false;
    }

    /// Recreate device-side resources after a device reset
    pub fn reacquire_resources(&mut self, device: &mut dyn RenderDevice) -> BackendResult<()> {
        self.init(device)
    }

    /// Force every live caster to rebuild on its next update
    pub fn invalidate_cached_light_positions(&mut self) {
        for slot in &mut self.slots {
            if let Some(caster) = slot.caster.as_mut() {
                caster.invalidate_history();
            }
        }
    }

    /// Drop every caster and the geometry cache's references (scene
    /// teardown); device resources stay pooled
    pub fn reset(&mut self) {
        let Self {
            slots,
            free,
            pool,
            cache,
            ..
        } = self;
        for (index, slot) in slots.iter_mut().enumerate() {
            if let Some(mut caster) = slot.caster.take() {
                caster.release_static_slots(pool);
                slot.generation = slot.generation.wrapping_add(1);
                free.push(index as u32);
            }
        }
        cache.free_all();
    }

    fn insert(&mut self, caster: VolumetricShadow) -> ShadowHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.caster.is_none(), "free list out of sync");
            slot.caster = Some(caster);
            ShadowHandle {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(RegistrySlot {
                generation: 0,
                caster: Some(caster),
            });
            ShadowHandle {
                index: self.slots.len() as u32 - 1,
                generation: 0,
            }
        }
    }

    /// Upload the frame's dynamic batch into the scratch slots, growing
    /// them when the batch outgrows their capacity
    fn upload_batch(&mut self, device: &mut dyn RenderDevice) -> BackendResult<(SlotId, SlotId)> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.batch_vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.batch_indices);

        let vertex = ensure_scratch(
            &mut self.pool,
            device,
            &mut self.scratch_vertex,
            SlotKind::Vertex,
            vertex_bytes.len() as u64,
            "shadow-batch-vertices",
        )?;
        let index = ensure_scratch(
            &mut self.pool,
            device,
            &mut self.scratch_index,
            SlotKind::Index,
            index_bytes.len() as u64,
            "shadow-batch-indices",
        )?;
        self.pool.write(device, vertex, vertex_bytes);
        self.pool.write(device, index, index_bytes);
        Ok((vertex, index))
    }
}

/// Keep a long-lived scratch slot large enough for `size` bytes
fn ensure_scratch(
    pool: &mut BufferPool,
    device: &mut dyn RenderDevice,
    slot: &mut Option<SlotId>,
    kind: SlotKind,
    size: u64,
    label: &str,
) -> BackendResult<SlotId> {
    if let Some(id) = *slot {
        if pool.capacity(id) >= size {
            return Ok(id);
        }
        pool.release(id);
        *slot = None;
    }
    let id = pool.acquire(device, kind, size, label)?;
    *slot = Some(id);
    Ok(id)
}

fn create_screen_quad(device: &mut dyn RenderDevice) -> BackendResult<BufferHandle> {
    // Two clip-space triangles covering the whole screen.
    let vertices = [
        VolumeVertex {
            position: [-1.0, -1.0, 0.0],
        },
        VolumeVertex {
            position: [1.0, -1.0, 0.0],
        },
        VolumeVertex {
            position: [1.0, 1.0, 0.0],
        },
        VolumeVertex {
            position: [-1.0, -1.0, 0.0],
        },
        VolumeVertex {
            position: [1.0, 1.0, 0.0],
        },
        VolumeVertex {
            position: [-1.0, 1.0, 0.0],
        },
    ];
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);
    let desc = BufferDescriptor::new(bytes.len() as u64, BufferUsage::VERTEX)
        .with_label("shadow-screen-quad");
    device.create_buffer_init(&desc, bytes)
}

/// State for the stencil-marking pass: no color, no depth writes, count
/// volume crossings in the stencil buffer
fn volume_pass_state(pass_op: StencilOperation, cull_mode: CullMode) -> RenderState {
    let face = StencilFaceState {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op,
    };
    RenderState {
        cull_mode,
        depth_compare: CompareFunction::Less,
        depth_write_enabled: false,
        color_writes: ColorWrites::empty(),
        blend: BlendMode::Opaque,
        blend_constant: [1.0, 1.0, 1.0, 1.0],
        stencil: Some(StencilState {
            front: face,
            back: face,
            reference: 0,
            read_mask: !0,
            write_mask: !0,
        }),
    }
}

/// State for the darkening pass: modulate the framebuffer wherever the
/// stencil count is nonzero, zeroing the stencil for the next frame
fn overlay_state(force_fill: bool, tint: [f32; 3]) -> RenderState {
    let face = StencilFaceState {
        compare: if force_fill {
            CompareFunction::Always
        } else {
            CompareFunction::NotEqual
        },
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Zero,
    };
    RenderState {
        cull_mode: CullMode::None,
        depth_compare: CompareFunction::Always,
        depth_write_enabled: false,
        color_writes: ColorWrites::ALL,
        blend: BlendMode::Modulate,
        blend_constant: [tint[0], tint[1], tint[2], 1.0],
        stencil: Some(StencilState {
            front: face,
            back: face,
            reference: 0,
            read_mask: !0,
            write_mask: !0,
        }),
    }
}
