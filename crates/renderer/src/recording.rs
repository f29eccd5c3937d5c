//! Per-thread recording slots.
//!
//! Each recording thread owns one slot, selected by a thread-local index
//! set with [`bind_recording_thread`]. A slot holds at most one open
//! command buffer, so several threads can record into the same frame
//! without touching each other's buffers. Threads that never bind an
//! index use slot 0.

use std::cell::Cell;

use vkframe_rhi::command::CommandBufferHandle;

use crate::error::{EngineError, EngineResult};

thread_local! {
    static RECORDING_THREAD: Cell<usize> = const { Cell::new(0) };
}

/// Assigns the calling thread to recording slot `index`.
pub fn bind_recording_thread(index: usize) {
    RECORDING_THREAD.with(|slot| slot.set(index));
}

/// Recording slot of the calling thread.
pub fn recording_thread() -> usize {
    RECORDING_THREAD.with(Cell::get)
}

/// Open command buffer per recording thread.
#[derive(Debug)]
pub struct RecordingSlots {
    slots: Vec<CommandBufferHandle>,
}

impl RecordingSlots {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![CommandBufferHandle::null(); count],
        }
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, thread: usize) -> EngineResult<&CommandBufferHandle> {
        self.slots
            .get(thread)
            .ok_or(EngineError::RecordingThread(thread))
    }

    /// Checks that `thread` is in range and has nothing open.
    pub fn ensure_free(&self, thread: usize) -> EngineResult<()> {
        if self.slot(thread)?.is_open() {
            return Err(EngineError::CommandBufferAlreadyOpen { thread });
        }
        Ok(())
    }

    /// Stores an opened buffer for `thread`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CommandBufferAlreadyOpen`] if the thread
    /// already has one, or [`EngineError::RecordingThread`] if `thread` is
    /// out of range.
    pub fn open(&mut self, thread: usize, handle: CommandBufferHandle) -> EngineResult<()> {
        self.ensure_free(thread)?;
        self.slots[thread] = handle;
        Ok(())
    }

    /// The open buffer of `thread`.
    pub fn current(&self, thread: usize) -> EngineResult<CommandBufferHandle> {
        let handle = *self.slot(thread)?;
        if !handle.is_open() {
            return Err(EngineError::NoOpenCommandBuffer { thread });
        }
        Ok(handle)
    }

    /// Removes the open buffer of `thread`, leaving the slot empty.
    pub fn take(&mut self, thread: usize) -> EngineResult<CommandBufferHandle> {
        let handle = self.current(thread)?;
        self.slots[thread] = CommandBufferHandle::null();
        Ok(handle)
    }

    /// Whether any thread still has a buffer open.
    pub fn any_open(&self) -> bool {
        self.slots.iter().any(CommandBufferHandle::is_open)
    }

    /// Forgets every open buffer.
    pub fn clear(&mut self) {
        self.slots.fill(CommandBufferHandle::null());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thread_index_is_zero() {
        std::thread::spawn(|| assert_eq!(recording_thread(), 0))
            .join()
            .unwrap();
    }

    #[test]
    fn test_thread_index_is_per_thread() {
        bind_recording_thread(3);
        let other = std::thread::spawn(|| {
            bind_recording_thread(1);
            recording_thread()
        })
        .join()
        .unwrap();
        assert_eq!(other, 1);
        assert_eq!(recording_thread(), 3);
    }

    #[test]
    fn test_empty_slots() {
        let slots = RecordingSlots::new(2);
        assert_eq!(slots.count(), 2);
        assert!(!slots.any_open());
        assert!(matches!(
            slots.current(1),
            Err(EngineError::NoOpenCommandBuffer { thread: 1 })
        ));
        assert!(matches!(
            slots.current(2),
            Err(EngineError::RecordingThread(2))
        ));
    }

    #[test]
    fn test_null_handle_is_not_open() {
        let mut slots = RecordingSlots::new(1);
        slots.open(0, CommandBufferHandle::null()).unwrap();
        assert!(!slots.any_open());
    }
}
