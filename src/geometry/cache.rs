//! Name-keyed shadow geometry cache
//!
//! One hundred instances of the same visual asset share one adjacency
//! build. Assets that failed to produce valid shadow geometry are
//! remembered so they are rejected in O(1) instead of being retried every
//! frame.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::scene::RenderObject;
use crate::ShadowConfig;

use super::asset::{GeometryError, ShadowGeometry};

/// Process-scoped cache with explicit lifecycle: constructed at subsystem
/// init, torn down at shutdown
#[derive(Debug, Default)]
pub struct GeometryCache {
    geoms: HashMap<String, Arc<ShadowGeometry>>,
    missing: HashSet<String>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached geometry for `name`; the returned clone is the caller's
    /// reference
    pub fn get(&self, name: &str) -> Option<Arc<ShadowGeometry>> {
        self.geoms.get(name).cloned()
    }

    /// Return the cached geometry for the object's asset, building it on
    /// first request
    pub fn load(
        &mut self,
        object: &dyn RenderObject,
        config: &ShadowConfig,
    ) -> Result<Arc<ShadowGeometry>, GeometryError> {
        if let Some(geom) = self.get(object.asset_name()) {
            return Ok(geom);
        }
        let geom = Arc::new(ShadowGeometry::from_render_object(object, config)?);
        self.geoms.insert(geom.name().to_string(), geom.clone());
        Ok(geom)
    }

    /// Remember that `name` cannot produce shadow geometry
    pub fn register_missing(&mut self, name: &str) {
        self.missing.insert(name.to_string());
    }

    pub fn is_missing(&self, name: &str) -> bool {
        self.missing.contains(name)
    }

    /// Drop the cache's own references to every geometry (full scene
    /// reset); instances still holding an `Arc` keep theirs alive
    pub fn free_all(&mut self) {
        self.geoms.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.geoms.len()
    }
}
