//! Per-frame-in-flight uniform staging
//!
//! Uniform uploads never hit the device directly while frames are in flight.
//! The update worker writes into the slot published by `write_slot`; the
//! render worker rotates the slot once per acquired image and flushes the
//! previous slot's writes before submitting. A buffer is therefore never
//! modified while a frame that reads it is still executing, and the two
//! workers share no lock besides the short per-slot map lock.

use crate::backend::traits::{BufferHandle, GpuBackend};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// N-buffered uniform staging rotated once per rendered frame.
///
/// Each write replaces the whole staged payload for its buffer, so a flush
/// always pushes complete uniform blocks; a tick racing the rotation can at
/// worst land a write in the slot flushed N frames later, never a torn
/// buffer.
pub struct UniformStaging {
    slots: Vec<Mutex<HashMap<BufferHandle, Vec<u8>>>>,
    write_slot: AtomicUsize,
}

impl UniformStaging {
    /// At least two slots regardless of the surface image count, so one
    /// frame can always be in flight while the next is staged.
    pub fn new(frames_in_flight: usize) -> Self {
        let n = frames_in_flight.max(2);
        Self {
            slots: (0..n).map(|_| Mutex::new(HashMap::new())).collect(),
            write_slot: AtomicUsize::new(0),
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// The slot the update worker currently stages into
    pub fn write_slot(&self) -> usize {
        self.write_slot.load(Ordering::Acquire)
    }

    /// Stage the full contents of `buffer` for the next rendered frame
    pub fn write(&self, buffer: BufferHandle, data: &[u8]) {
        let slot = self.write_slot.load(Ordering::Acquire);
        self.slots[slot].lock().insert(buffer, data.to_vec());
    }

    /// Publish the next write slot to the update worker and return the slot
    /// the render worker must flush for the frame it just acquired.
    pub fn rotate(&self) -> usize {
        let slot = self.write_slot.load(Ordering::Acquire);
        let next = (slot + 1) % self.slots.len();
        self.write_slot.store(next, Ordering::Release);
        slot
    }

    /// Push every staged write in `slot` to the device
    pub fn flush(&self, slot: usize, gpu: &mut dyn GpuBackend) {
        let mut staged = self.slots[slot].lock();
        for (buffer, data) in staged.drain() {
            gpu.write_buffer(buffer, 0, &data);
        }
    }

    /// Drop staged writes for a destroyed buffer from every slot
    pub fn forget(&self, buffer: BufferHandle) {
        for slot in &self.slots {
            slot.lock().remove(&buffer);
        }
    }
}
