//! Dummy render device for testing and headless use
//!
//! Records every call it receives instead of talking to a GPU, so tests can
//! assert on the exact draw sequence. Stencil support and allocation
//! failures are configurable.

use std::collections::HashMap;
use std::ops::Range;

use super::traits::{BackendError, BackendResult, BufferHandle, RenderDevice};
use super::types::{BufferDescriptor, IndexFormat, RenderState};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer { handle: BufferHandle, size: u64 },
    WriteBuffer { handle: BufferHandle, offset: u64, len: u64 },
    DestroyBuffer { handle: BufferHandle },
    SetRenderState(RenderState),
    SetVertexBuffer { handle: BufferHandle, offset: u64 },
    SetIndexBuffer { handle: BufferHandle, offset: u64, format: IndexFormat },
    Draw { vertices: Range<u32> },
    DrawIndexed { indices: Range<u32>, base_vertex: i32 },
}

/// Recording device with no GPU behind it
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_handle: u64,
    buffers: HashMap<u64, Vec<u8>>,
    stencil_supported: bool,
    fail_next_allocations: u32,
    pub calls: Vec<DeviceCall>,
}

impl DummyDevice {
    pub fn new() -> Self {
        Self {
            stencil_supported: true,
            ..Default::default()
        }
    }

    /// A device whose depth buffer has no stencil bits
    pub fn without_stencil() -> Self {
        Self {
            stencil_supported: false,
            ..Default::default()
        }
    }

    /// Make the next `count` buffer creations fail with `OutOfMemory`
    pub fn fail_next_allocations(&mut self, count: u32) {
        self.fail_next_allocations = count;
    }

    /// Number of buffers currently alive
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Current contents of a buffer, if alive
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&handle.0).map(|b| b.as_slice())
    }

    /// Drop the recorded call log
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Recorded indexed draws, in order
    pub fn indexed_draws(&self) -> Vec<(Range<u32>, i32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DrawIndexed { indices, base_vertex } => {
                    Some((indices.clone(), *base_vertex))
                }
                _ => None,
            })
            .collect()
    }

    /// Recorded render states, in order
    pub fn render_states(&self) -> Vec<RenderState> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetRenderState(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn allocate(&mut self, size: u64) -> BackendResult<BufferHandle> {
        if self.fail_next_allocations > 0 {
            self.fail_next_allocations -= 1;
            return Err(BackendError::OutOfMemory);
        }
        self.next_handle += 1;
        let handle = BufferHandle(self.next_handle);
        self.buffers.insert(handle.0, vec![0; size as usize]);
        self.calls.push(DeviceCall::CreateBuffer { handle, size });
        Ok(handle)
    }
}

impl RenderDevice for DummyDevice {
    fn supports_stencil(&self) -> bool {
        self.stencil_supported
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyDevice: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        self.allocate(desc.size)
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let handle = self.create_buffer(desc)?;
        self.write_buffer(handle, 0, data);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = start + data.len();
            debug_assert!(end <= contents.len(), "write past end of buffer");
            if end <= contents.len() {
                contents[start..end].copy_from_slice(data);
            }
        }
        self.calls.push(DeviceCall::WriteBuffer {
            handle: buffer,
            offset,
            len: data.len() as u64,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
        self.calls.push(DeviceCall::DestroyBuffer { handle: buffer });
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.calls.push(DeviceCall::SetRenderState(state.clone()));
    }

    fn set_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) {
        self.calls.push(DeviceCall::SetVertexBuffer {
            handle: buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        self.calls.push(DeviceCall::SetIndexBuffer {
            handle: buffer,
            offset,
            format,
        });
    }

    fn draw(&mut self, vertices: Range<u32>) {
        self.calls.push(DeviceCall::Draw { vertices });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32) {
        self.calls.push(DeviceCall::DrawIndexed {
            indices,
            base_vertex,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::BufferUsage;

    #[test]
    fn records_buffer_lifecycle() {
        let mut device = DummyDevice::new();
        let desc = BufferDescriptor::new(16, BufferUsage::VERTEX);
        let handle = device.create_buffer_init(&desc, &[7u8; 16]).unwrap();

        assert_eq!(device.live_buffer_count(), 1);
        assert_eq!(device.buffer_contents(handle).unwrap(), &[7u8; 16]);

        device.destroy_buffer(handle);
        assert_eq!(device.live_buffer_count(), 0);
        assert!(device.buffer_contents(handle).is_none());
    }

    #[test]
    fn partial_writes_land_at_offset() {
        let mut device = DummyDevice::new();
        let desc = BufferDescriptor::new(8, BufferUsage::VERTEX | BufferUsage::COPY_DST);
        let handle = device.create_buffer(&desc).unwrap();

        device.write_buffer(handle, 4, &[1, 2, 3, 4]);
        assert_eq!(device.buffer_contents(handle).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn forced_allocation_failure() {
        let mut device = DummyDevice::new();
        device.fail_next_allocations(1);
        let desc = BufferDescriptor::new(16, BufferUsage::VERTEX);

        assert_eq!(
            device.create_buffer(&desc),
            Err(BackendError::OutOfMemory)
        );
        // The failure is consumed; the next attempt succeeds.
        assert!(device.create_buffer(&desc).is_ok());
    }

    #[test]
    fn stencil_capability_is_configurable() {
        assert!(DummyDevice::new().supports_stencil());
        assert!(!DummyDevice::without_stencil().supports_stencil());
    }
}
