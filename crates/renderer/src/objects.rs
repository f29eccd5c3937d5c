//! Per-frame object buffers.
//!
//! [`ObjectRing`] keeps a CPU-side list of fixed-size objects (transforms,
//! material indices, anything `Pod`) and one [`StructuredBuffer`] per frame
//! slot. Each frame the whole list is copied into the buffer of the slot
//! being started, so the CPU never writes a buffer the GPU may still be
//! reading from an earlier frame.
//!
//! ```text
//! slot 0: [obj0 obj1 obj2 ...]   <- written when slot 0 starts
//! slot 1: [obj0 obj1 obj2 ...]   <- read by the GPU meanwhile
//! ```
//!
//! The orchestrator calls [`ObjectRing::update_buffers`] from
//! [`FrameOrchestrator::start_frame`](crate::FrameOrchestrator::start_frame)
//! after the slot's fence has been waited on.

use std::fmt;
use std::mem::size_of;

use bytemuck::Pod;
use tracing::{debug, trace};

use vkframe_rhi::RhiError;
use vkframe_rhi::descriptor::{DescriptorBinding, StructuredBuffer};

use crate::error::{EngineError, EngineResult};

/// Index of an object in an [`ObjectRing`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Slot-indexed ring of structured buffers fed from one object list.
pub struct ObjectRing {
    buffers: Vec<Box<dyn StructuredBuffer>>,
    stride: usize,
    max_objects: usize,
    objects: Vec<u8>,
    current: Option<usize>,
}

impl ObjectRing {
    /// Object capacity used by [`ObjectRing::with_default_capacity`].
    pub const DEFAULT_MAX_OBJECTS: usize = 256;

    /// Creates a ring of `T`-sized objects over one buffer per frame slot.
    ///
    /// # Arguments
    ///
    /// * `buffers` - One buffer per frame slot, in slot order
    /// * `max_objects` - Number of objects every buffer must hold
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ObjectBufferTooSmall`] if a buffer cannot hold
    /// `max_objects` objects of `T`.
    pub fn new<T: Pod>(
        buffers: Vec<Box<dyn StructuredBuffer>>,
        max_objects: usize,
    ) -> EngineResult<Self> {
        let stride = size_of::<T>();
        let required = stride * max_objects;
        if let Some((slot, buffer)) = buffers
            .iter()
            .enumerate()
            .find(|(_, buffer)| buffer.capacity() < required)
        {
            return Err(EngineError::ObjectBufferTooSmall {
                slot,
                capacity: buffer.capacity(),
                required,
            });
        }

        debug!(
            "Object ring: {} slot(s), {} x {} byte object(s)",
            buffers.len(),
            max_objects,
            stride
        );
        Ok(Self {
            buffers,
            stride,
            max_objects,
            objects: Vec::with_capacity(required),
            current: None,
        })
    }

    pub fn with_default_capacity<T: Pod>(
        buffers: Vec<Box<dyn StructuredBuffer>>,
    ) -> EngineResult<Self> {
        Self::new::<T>(buffers, Self::DEFAULT_MAX_OBJECTS)
    }

    fn check_stride<T: Pod>(&self) -> EngineResult<()> {
        if size_of::<T>() != self.stride {
            return Err(EngineError::ObjectStride {
                expected: self.stride,
                actual: size_of::<T>(),
            });
        }
        Ok(())
    }

    fn byte_range(&self, id: ObjectId) -> EngineResult<std::ops::Range<usize>> {
        let start = id.0 as usize * self.stride;
        if start + self.stride > self.objects.len() {
            return Err(EngineError::UnknownObject(id));
        }
        Ok(start..start + self.stride)
    }

    /// Appends an object. It reaches the GPU with the next
    /// [`ObjectRing::update_buffers`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ObjectStride`] for a `T` of the wrong size or
    /// [`EngineError::ObjectRingFull`] at capacity.
    pub fn add_object<T: Pod>(&mut self, object: &T) -> EngineResult<ObjectId> {
        self.check_stride::<T>()?;
        if self.len() == self.max_objects {
            return Err(EngineError::ObjectRingFull(self.max_objects));
        }
        let id = ObjectId(self.len() as u32);
        self.objects.extend_from_slice(bytemuck::bytes_of(object));
        Ok(id)
    }

    /// Replaces the object stored under `id`.
    pub fn update_object<T: Pod>(&mut self, id: ObjectId, object: &T) -> EngineResult<()> {
        self.check_stride::<T>()?;
        let range = self.byte_range(id)?;
        self.objects[range].copy_from_slice(bytemuck::bytes_of(object));
        Ok(())
    }

    /// CPU copy of the object stored under `id`.
    pub fn object<T: Pod>(&self, id: ObjectId) -> EngineResult<T> {
        self.check_stride::<T>()?;
        let range = self.byte_range(id)?;
        Ok(bytemuck::pod_read_unaligned(&self.objects[range]))
    }

    /// Copies the object list into `slot`'s buffer and makes it current.
    ///
    /// The caller must have waited for the GPU to finish the slot's
    /// previous frame.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ObjectRingSlots`] for a slot without a buffer,
    /// or the buffer's write error.
    pub fn update_buffers(&mut self, slot: usize) -> EngineResult<()> {
        let frames = self.buffers.len();
        let buffer = self
            .buffers
            .get_mut(slot)
            .ok_or(EngineError::ObjectRingSlots {
                buffers: frames,
                frames: slot + 1,
            })?;
        buffer.write(0, &self.objects)?;
        self.current = Some(slot);
        trace!(
            "Uploaded {} object(s) to slot {}",
            self.objects.len() / self.stride.max(1),
            slot
        );
        Ok(())
    }

    /// Binding of the buffer written by the last
    /// [`ObjectRing::update_buffers`].
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoCurrentFrame`] before the first update.
    pub fn current_binding(&self) -> EngineResult<DescriptorBinding> {
        let slot = self.current.ok_or(RhiError::NoCurrentFrame)?;
        Ok(self.buffers[slot].binding())
    }

    /// Slot whose buffer holds the latest upload.
    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    /// Number of objects in the list.
    pub fn len(&self) -> usize {
        self.objects.len() / self.stride.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    /// Number of per-slot buffers.
    pub fn slot_count(&self) -> usize {
        self.buffers.len()
    }
}

impl fmt::Debug for ObjectRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRing")
            .field("slots", &self.buffers.len())
            .field("stride", &self.stride)
            .field("objects", &self.len())
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};
    use vkframe_rhi::mock::MockStructuredBuffer;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Transform {
        offset: [f32; 2],
        scale: f32,
        layer: u32,
    }

    fn transform(x: f32) -> Transform {
        Transform {
            offset: [x, -x],
            scale: 1.0,
            layer: 0,
        }
    }

    fn ring(slots: usize, max_objects: usize) -> (Vec<MockStructuredBuffer>, ObjectRing) {
        let buffers: Vec<MockStructuredBuffer> = (0..slots)
            .map(|slot| MockStructuredBuffer::new(0x700 + slot as u64 * 0x10, 16 * max_objects))
            .collect();
        let boxed = buffers
            .iter()
            .cloned()
            .map(|buffer| Box::new(buffer) as Box<dyn StructuredBuffer>)
            .collect();
        let ring = ObjectRing::new::<Transform>(boxed, max_objects).unwrap();
        (buffers, ring)
    }

    #[test]
    fn test_object_ring_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ObjectRing>();
    }

    #[test]
    fn test_update_writes_only_the_given_slot() {
        let (buffers, mut ring) = ring(2, 4);
        ring.add_object(&transform(1.0)).unwrap();
        ring.add_object(&transform(2.0)).unwrap();

        ring.update_buffers(1).unwrap();

        assert_eq!(buffers[0].write_count(), 0);
        assert_eq!(buffers[1].write_count(), 1);
        let contents = buffers[1].contents();
        let uploaded: Vec<Transform> = contents[..32]
            .chunks_exact(16)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(uploaded, vec![transform(1.0), transform(2.0)]);
        assert_eq!(ring.current_binding().unwrap(), buffers[1].binding());
    }

    #[test]
    fn test_update_object_reaches_next_slot_only() {
        let (buffers, mut ring) = ring(2, 4);
        let id = ring.add_object(&transform(1.0)).unwrap();
        ring.update_buffers(0).unwrap();

        ring.update_object(id, &transform(5.0)).unwrap();
        ring.update_buffers(1).unwrap();

        let first: Transform = bytemuck::pod_read_unaligned(&buffers[0].contents()[..16]);
        let second: Transform = bytemuck::pod_read_unaligned(&buffers[1].contents()[..16]);
        assert_eq!(first, transform(1.0));
        assert_eq!(second, transform(5.0));
        assert_eq!(ring.object::<Transform>(id).unwrap(), transform(5.0));
    }

    #[test]
    fn test_capacity_and_stride_are_enforced() {
        let (_buffers, mut ring) = ring(1, 1);
        ring.add_object(&transform(1.0)).unwrap();
        assert!(matches!(
            ring.add_object(&transform(2.0)),
            Err(EngineError::ObjectRingFull(1))
        ));
        assert!(matches!(
            ring.add_object(&7u32),
            Err(EngineError::ObjectStride {
                expected: 16,
                actual: 4
            })
        ));
        assert!(matches!(
            ring.update_object(ObjectId(3), &transform(0.0)),
            Err(EngineError::UnknownObject(_))
        ));
    }

    #[test]
    fn test_small_buffer_is_rejected() {
        let small: Vec<Box<dyn StructuredBuffer>> =
            vec![Box::new(MockStructuredBuffer::new(0x800, 8))];
        assert!(matches!(
            ObjectRing::new::<Transform>(small, 1),
            Err(EngineError::ObjectBufferTooSmall {
                slot: 0,
                capacity: 8,
                required: 16
            })
        ));

        let full: Vec<Box<dyn StructuredBuffer>> =
            vec![Box::new(MockStructuredBuffer::new(0x810, 16 * 256))];
        let ring = ObjectRing::with_default_capacity::<Transform>(full).unwrap();
        assert_eq!(ring.max_objects(), ObjectRing::DEFAULT_MAX_OBJECTS);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_binding_before_first_update() {
        let (_buffers, mut objects) = ring(2, 4);
        assert!(matches!(
            objects.current_binding(),
            Err(EngineError::Rhi(RhiError::NoCurrentFrame))
        ));
        assert!(matches!(
            objects.update_buffers(2),
            Err(EngineError::ObjectRingSlots { .. })
        ));
    }
}
