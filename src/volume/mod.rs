//! Silhouette extraction and per-instance shadow volumes

pub mod caster;
pub mod silhouette;

pub use caster::{ShadowKind, Visibility, VolumeBuffer, VolumetricShadow};
pub use silhouette::{stitch_loops, SilhouetteBuffer};
