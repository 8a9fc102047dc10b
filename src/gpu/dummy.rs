//! Simulated device for testing
//!
//! Pages live in host memory and fences are plain atomics. Signals go onto a
//! lock-free queue and only land when the "device" processes them, which lets
//! tests decide exactly when submitted work completes, from any thread.

use super::traits::*;
use crate::sync::mutex::Mutex;
use crossbeam_queue::SegQueue;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Base of the fake device address space. Page `n` lives at `BASE + n << 32`.
pub const DUMMY_ADDRESS_BASE: u64 = 0x0001_0000_0000_0000;

/// Host-memory page handle.
///
/// Owns its bytes through a raw pointer taken from `Box::into_raw`, so the
/// mapped pointer handed to the arena stays valid while this handle moves.
#[derive(Debug)]
pub struct DummyMemory {
    id: u64,
    data: NonNull<[u8]>,
}

// SAFETY: `data` is uniquely owned by this handle, like the Box it came from.
unsafe impl Send for DummyMemory {}

impl DummyMemory {
    /// Identifier of this page within its device.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for DummyMemory {
    fn drop(&mut self) {
        // SAFETY: `data` came from Box::into_raw and is freed only here.
        drop(unsafe { Box::from_raw(self.data.as_ptr()) });
    }
}

/// Fence backed by a shared counter.
#[derive(Debug)]
pub struct DummyFence {
    completed: Arc<AtomicU64>,
}

#[derive(Debug, Default)]
struct DeviceShared {
    next_page_id: AtomicU64,
    live_pages: Mutex<HashMap<u64, usize>>,
    debug_names: Mutex<HashMap<u64, String>>,
    live_fences: AtomicUsize,
    pages_created: AtomicUsize,
    /// Page creations allowed before failing with OutOfMemory (0 = unlimited).
    page_limit: AtomicUsize,
    fences_created: AtomicUsize,
    /// Same as `page_limit`, for fences.
    fence_limit: AtomicUsize,
    submitted: SegQueue<(Arc<AtomicU64>, u64)>,
}

/// A device with no hardware behind it.
///
/// Cloning is cheap and every clone observes the same device, so a test can
/// hand one clone to the arena and keep another to complete work.
#[derive(Debug, Clone, Default)]
pub struct DummyDevice {
    shared: Arc<DeviceShared>,
}

impl DummyDevice {
    /// Create a new simulated device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every page creation after `pages` successful ones.
    pub fn fail_after(&self, pages: usize) {
        let created = self.shared.pages_created.load(Ordering::Relaxed);
        self.shared
            .page_limit
            .store(created + pages + 1, Ordering::Relaxed);
    }

    /// Fail every fence creation after `fences` successful ones.
    pub fn fail_fences_after(&self, fences: usize) {
        let created = self.shared.fences_created.load(Ordering::Relaxed);
        self.shared
            .fence_limit
            .store(created + fences + 1, Ordering::Relaxed);
    }

    /// Lift any limit set by [`fail_after`](Self::fail_after) or
    /// [`fail_fences_after`](Self::fail_fences_after).
    pub fn clear_failure(&self) {
        self.shared.page_limit.store(0, Ordering::Relaxed);
        self.shared.fence_limit.store(0, Ordering::Relaxed);
    }

    /// Submission queue feeding this device.
    pub fn queue(&self) -> DummyQueue {
        DummyQueue {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Complete the oldest submitted signal. Returns false if none was queued.
    pub fn process_one(&self) -> bool {
        match self.shared.submitted.pop() {
            Some((fence, value)) => {
                fence.fetch_max(value, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Complete every submitted signal. Returns how many were applied.
    pub fn process_all(&self) -> usize {
        let mut count = 0;
        while self.process_one() {
            count += 1;
        }
        count
    }

    /// Complete `fence` up to `value` directly, bypassing the queue.
    ///
    /// Models work finishing out of submission order.
    pub fn complete_fence(&self, fence: &DummyFence, value: u64) {
        fence.completed.fetch_max(value, Ordering::Release);
    }

    /// Signals submitted but not yet completed.
    pub fn queued_signals(&self) -> usize {
        self.shared.submitted.len()
    }

    /// Pages allocated and not yet released.
    pub fn live_pages(&self) -> usize {
        self.shared.live_pages.lock().len()
    }

    /// Bytes held by live pages.
    pub fn live_bytes(&self) -> usize {
        self.shared.live_pages.lock().values().sum()
    }

    /// Fences created and not yet destroyed.
    pub fn live_fences(&self) -> usize {
        self.shared.live_fences.load(Ordering::Relaxed)
    }

    /// Pages created over the device's lifetime.
    pub fn pages_created(&self) -> usize {
        self.shared.pages_created.load(Ordering::Relaxed)
    }

    /// Debug names currently attached to live pages.
    pub fn debug_names(&self) -> Vec<String> {
        let live = self.shared.live_pages.lock();
        self.shared
            .debug_names
            .lock()
            .iter()
            .filter(|(id, _)| live.contains_key(id))
            .map(|(_, name)| name.clone())
            .collect()
    }
}

impl DeviceBackend for DummyDevice {
    type Memory = DummyMemory;
    type Fence = DummyFence;

    fn create_page(&mut self, capacity: usize) -> Result<PageMemory<DummyMemory>, BackendError> {
        if capacity == 0 {
            return Err(BackendError::Unsupported("zero-sized page"));
        }

        let limit = self.shared.page_limit.load(Ordering::Relaxed);
        let created = self.shared.pages_created.load(Ordering::Relaxed);
        if limit != 0 && created + 1 >= limit {
            return Err(BackendError::OutOfMemory);
        }

        let id = self.shared.next_page_id.fetch_add(1, Ordering::Relaxed);
        let raw = Box::into_raw(vec![0u8; capacity].into_boxed_slice());
        // SAFETY: Box::into_raw never returns null.
        let data = unsafe { NonNull::new_unchecked(raw) };
        let memory = DummyMemory { id, data };
        let mapped = data.cast::<u8>();

        self.shared.live_pages.lock().insert(id, capacity);
        self.shared.pages_created.fetch_add(1, Ordering::Relaxed);

        let address = DUMMY_ADDRESS_BASE + (id << 32);
        // SAFETY: the allocation is owned by `memory` and freed only when it
        // drops, after release_page.
        Ok(unsafe { PageMemory::new(memory, mapped, address) })
    }

    fn create_fence(&mut self) -> Result<DummyFence, BackendError> {
        let limit = self.shared.fence_limit.load(Ordering::Relaxed);
        let created = self.shared.fences_created.load(Ordering::Relaxed);
        if limit != 0 && created + 1 >= limit {
            return Err(BackendError::OutOfMemory);
        }

        self.shared.fences_created.fetch_add(1, Ordering::Relaxed);
        self.shared.live_fences.fetch_add(1, Ordering::Relaxed);
        Ok(DummyFence {
            completed: Arc::new(AtomicU64::new(0)),
        })
    }

    fn completed_value(&self, fence: &DummyFence) -> u64 {
        fence.completed.load(Ordering::Acquire)
    }

    fn release_page(&mut self, memory: PageMemory<DummyMemory>) {
        let memory = memory.into_handle();
        self.shared.live_pages.lock().remove(&memory.id);
        self.shared.debug_names.lock().remove(&memory.id);
        drop(memory);
    }

    fn destroy_fence(&mut self, fence: DummyFence) {
        self.shared.live_fences.fetch_sub(1, Ordering::Relaxed);
        drop(fence);
    }

    fn set_debug_name(&mut self, memory: &DummyMemory, name: &str) {
        self.shared
            .debug_names
            .lock()
            .insert(memory.id, name.to_string());
    }
}

/// Queue handle of a [`DummyDevice`].
#[derive(Debug, Clone)]
pub struct DummyQueue {
    shared: Arc<DeviceShared>,
}

impl DummyQueue {
    /// Signals pushed through this queue and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.shared.submitted.len()
    }
}

impl SubmissionQueue<DummyFence> for DummyQueue {
    fn signal(&mut self, fence: &DummyFence, value: u64) -> Result<(), BackendError> {
        self.shared
            .submitted
            .push((Arc::clone(&fence.completed), value));
        Ok(())
    }
}
