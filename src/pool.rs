//! GPU buffer slot pool
//!
//! Vertex and index buffers are handed out as slots and recycled by capacity
//! instead of being destroyed, so per-frame geometry churn does not turn
//! into per-frame GPU allocation churn. Slot capacities are rounded up to a
//! power of two to make released slots likely to fit the next request.

use crate::backend::{
    BackendResult, BufferDescriptor, BufferHandle, BufferUsage, RenderDevice,
};

/// What a slot's buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Vertex,
    Index,
}

impl SlotKind {
    fn usage(self) -> BufferUsage {
        match self {
            SlotKind::Vertex => BufferUsage::VERTEX | BufferUsage::COPY_DST,
            SlotKind::Index => BufferUsage::INDEX | BufferUsage::COPY_DST,
        }
    }
}

/// Handle to a pool slot
///
/// Valid until [`BufferPool::release_device_buffers`] runs; holders must
/// drop their ids at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u32);

#[derive(Debug)]
struct Slot {
    handle: BufferHandle,
    kind: SlotKind,
    capacity: u64,
    len: u64,
    in_use: bool,
}

/// Pool of recycled GPU vertex/index buffers
#[derive(Debug, Default)]
pub struct BufferPool {
    slots: Vec<Slot>,
}

const MIN_SLOT_CAPACITY: u64 = 256;

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a slot with at least `size` bytes of capacity
    ///
    /// Reuses the smallest free slot of the same kind that fits before
    /// creating a new buffer.
    pub fn acquire(
        &mut self,
        device: &mut dyn RenderDevice,
        kind: SlotKind,
        size: u64,
        label: &str,
    ) -> BackendResult<SlotId> {
        let mut best: Option<usize> = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.in_use || slot.kind != kind || slot.capacity < size {
                continue;
            }
            if best.map_or(true, |b| slot.capacity < self.slots[b].capacity) {
                best = Some(i);
            }
        }
        if let Some(i) = best {
            let slot = &mut self.slots[i];
            slot.in_use = true;
            slot.len = 0;
            return Ok(SlotId(i as u32));
        }

        let capacity = size.next_power_of_two().max(MIN_SLOT_CAPACITY);
        let desc = BufferDescriptor::new(capacity, kind.usage()).with_label(label);
        let handle = device.create_buffer(&desc)?;
        self.slots.push(Slot {
            handle,
            kind,
            capacity,
            len: 0,
            in_use: true,
        });
        Ok(SlotId(self.slots.len() as u32 - 1))
    }

    /// Replace a slot's contents, starting at offset zero
    pub fn write(&mut self, device: &mut dyn RenderDevice, id: SlotId, data: &[u8]) {
        let slot = &mut self.slots[id.0 as usize];
        debug_assert!(slot.in_use, "write to a released slot");
        debug_assert!(data.len() as u64 <= slot.capacity, "write exceeds slot capacity");
        device.write_buffer(slot.handle, 0, data);
        slot.len = data.len() as u64;
    }

    /// Append data after the slot's current contents, returning the byte
    /// offset it landed at
    pub fn append(&mut self, device: &mut dyn RenderDevice, id: SlotId, data: &[u8]) -> u64 {
        let slot = &mut self.slots[id.0 as usize];
        debug_assert!(slot.in_use, "append to a released slot");
        let offset = slot.len;
        debug_assert!(offset + data.len() as u64 <= slot.capacity, "append exceeds slot capacity");
        device.write_buffer(slot.handle, offset, data);
        slot.len = offset + data.len() as u64;
        offset
    }

    /// The slot's GPU buffer
    pub fn handle(&self, id: SlotId) -> BufferHandle {
        self.slots[id.0 as usize].handle
    }

    /// The slot's byte capacity
    pub fn capacity(&self, id: SlotId) -> u64 {
        self.slots[id.0 as usize].capacity
    }

    /// Return a slot to the free list; its buffer stays alive for reuse
    pub fn release(&mut self, id: SlotId) {
        let slot = &mut self.slots[id.0 as usize];
        debug_assert!(slot.in_use, "double release of a pool slot");
        slot.in_use = false;
        slot.len = 0;
    }

    /// Destroy every pooled buffer (device loss / shutdown)
    ///
    /// All outstanding [`SlotId`]s become invalid; holders must forget them
    /// before the next acquire.
    pub fn release_device_buffers(&mut self, device: &mut dyn RenderDevice) {
        for slot in self.slots.drain(..) {
            device.destroy_buffer(slot.handle);
        }
    }

    /// Total number of slots, free or in use
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently handed out
    pub fn slots_in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;

    #[test]
    fn released_slot_is_reused_for_a_fitting_request() {
        let mut device = DummyDevice::new();
        let mut pool = BufferPool::new();

        let a = pool
            .acquire(&mut device, SlotKind::Vertex, 1000, "a")
            .unwrap();
        pool.release(a);

        let b = pool
            .acquire(&mut device, SlotKind::Vertex, 900, "b")
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.slot_count(), 1);
        assert_eq!(device.live_buffer_count(), 1);
    }

    #[test]
    fn kind_mismatch_never_reuses() {
        let mut device = DummyDevice::new();
        let mut pool = BufferPool::new();

        let a = pool
            .acquire(&mut device, SlotKind::Vertex, 100, "a")
            .unwrap();
        pool.release(a);

        let b = pool.acquire(&mut device, SlotKind::Index, 100, "b").unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.slot_count(), 2);
    }

    #[test]
    fn append_advances_offset() {
        let mut device = DummyDevice::new();
        let mut pool = BufferPool::new();

        let slot = pool
            .acquire(&mut device, SlotKind::Vertex, 64, "s")
            .unwrap();
        assert_eq!(pool.append(&mut device, slot, &[1u8; 16]), 0);
        assert_eq!(pool.append(&mut device, slot, &[2u8; 16]), 16);

        let contents = device.buffer_contents(pool.handle(slot)).unwrap();
        assert_eq!(&contents[0..16], &[1u8; 16]);
        assert_eq!(&contents[16..32], &[2u8; 16]);
    }

    #[test]
    fn write_resets_length() {
        let mut device = DummyDevice::new();
        let mut pool = BufferPool::new();

        let slot = pool
            .acquire(&mut device, SlotKind::Index, 64, "s")
            .unwrap();
        pool.append(&mut device, slot, &[1u8; 32]);
        pool.write(&mut device, slot, &[2u8; 8]);
        assert_eq!(pool.append(&mut device, slot, &[3u8; 8]), 8);
    }

    #[test]
    fn device_loss_destroys_every_buffer() {
        let mut device = DummyDevice::new();
        let mut pool = BufferPool::new();

        let a = pool
            .acquire(&mut device, SlotKind::Vertex, 100, "a")
            .unwrap();
        pool.acquire(&mut device, SlotKind::Index, 100, "b").unwrap();
        pool.release(a);
        assert_eq!(device.live_buffer_count(), 2);

        pool.release_device_buffers(&mut device);
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(pool.slot_count(), 0);
    }

    #[test]
    fn allocation_failure_surfaces() {
        let mut device = DummyDevice::new();
        let mut pool = BufferPool::new();
        device.fail_next_allocations(1);

        assert!(pool
            .acquire(&mut device, SlotKind::Vertex, 100, "a")
            .is_err());
        assert_eq!(pool.slot_count(), 0);
    }
}
