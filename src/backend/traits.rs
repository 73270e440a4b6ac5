//! Render device abstraction
//!
//! The shadow subsystem issues all GPU work through [`RenderDevice`]. A
//! concrete implementation lives with the engine's backend; the crate ships
//! [`DummyDevice`](super::dummy::DummyDevice) for tests and headless use.

use std::ops::Range;

use thiserror::Error;

use super::types::{BufferDescriptor, IndexFormat, RenderState};

/// Device error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Stencil-capable render device
///
/// Draw calls consume the currently bound vertex/index streams and the last
/// [`RenderState`] set. All geometry is interpreted as triangle lists.
pub trait RenderDevice {
    /// Whether the active depth buffer carries stencil bits
    fn supports_stencil(&self) -> bool;

    /// Create an uninitialized buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Create a buffer with initial data
    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle>;

    /// Write data into a buffer at a byte offset
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Set the fixed-function state for subsequent draws
    fn set_render_state(&mut self, state: &RenderState);

    /// Bind the vertex stream
    fn set_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64);

    /// Bind the index stream
    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat);

    /// Draw non-indexed triangles
    fn draw(&mut self, vertices: Range<u32>);

    /// Draw indexed triangles
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32);
}
