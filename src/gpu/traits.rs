//! Device backend traits and types
//!
//! The arena only needs four things from a device: page-sized mapped memory,
//! completion primitives (fences), a non-blocking poll of a fence's completed
//! value, and a queue that can signal a fence after previously submitted work.
//! Nothing here pulls in a backend-specific dependency.

use std::fmt;
use std::ptr::NonNull;

/// Errors reported by a device backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Device or host memory exhausted
    OutOfMemory,
    /// The backend cannot provide what was asked (e.g. unmappable memory)
    Unsupported(&'static str),
    /// Backend-specific error (opaque)
    Backend(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::OutOfMemory => write!(f, "device out of memory"),
            BackendError::Unsupported(what) => write!(f, "unsupported: {}", what),
            BackendError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// A block of device-visible memory that stays CPU-mapped for its whole life.
///
/// Owns the backend handle `M`; ownership goes back to the backend only
/// through [`DeviceBackend::release_page`].
#[derive(Debug)]
pub struct PageMemory<M> {
    handle: M,
    mapped: NonNull<u8>,
    device_address: u64,
}

impl<M> PageMemory<M> {
    /// Wrap backend memory.
    ///
    /// # Safety
    ///
    /// `mapped` must be valid for reads and writes of the full page capacity
    /// until `handle` is passed back to the backend, and no other code may
    /// access that range while the page is alive except through allocations
    /// handed out by the arena.
    pub unsafe fn new(handle: M, mapped: NonNull<u8>, device_address: u64) -> Self {
        Self {
            handle,
            mapped,
            device_address,
        }
    }

    /// Backend handle.
    pub fn handle(&self) -> &M {
        &self.handle
    }

    /// CPU-visible base pointer.
    pub fn mapped(&self) -> NonNull<u8> {
        self.mapped
    }

    /// Device-visible base address matching [`mapped`](Self::mapped).
    pub fn device_address(&self) -> u64 {
        self.device_address
    }

    /// Give the backend handle back, dropping the mapping.
    pub fn into_handle(self) -> M {
        self.handle
    }
}

// SAFETY: the mapped range is exclusively owned by this value (see `new`),
// so moving it to another thread moves sole access with it.
unsafe impl<M: Send> Send for PageMemory<M> {}

/// Creates and destroys pages and fences, and polls fences.
///
/// All calls come from the single thread that owns the arena.
pub trait DeviceBackend {
    /// Backing memory handle for one page.
    type Memory;
    /// Completion primitive, signalled with monotonically increasing values.
    type Fence;

    /// Allocate `capacity` bytes of device-visible, CPU-mapped memory.
    fn create_page(&mut self, capacity: usize) -> Result<PageMemory<Self::Memory>, BackendError>;

    /// Create a fence whose completed value starts at 0.
    fn create_fence(&mut self) -> Result<Self::Fence, BackendError>;

    /// Highest value the device has completed on `fence`. Never blocks.
    fn completed_value(&self, fence: &Self::Fence) -> u64;

    /// Unmap and free page memory.
    fn release_page(&mut self, memory: PageMemory<Self::Memory>);

    /// Destroy a fence with no outstanding signal.
    fn destroy_fence(&mut self, fence: Self::Fence);

    /// Attach a debug name to page memory. Purely diagnostic.
    fn set_debug_name(&mut self, _memory: &Self::Memory, _name: &str) {}
}

/// The submission side: a queue that signals a fence once all work
/// submitted before the signal has finished on the device.
pub trait SubmissionQueue<F> {
    /// Enqueue a signal of `fence` to `value`.
    fn signal(&mut self, fence: &F, value: u64) -> Result<(), BackendError>;
}

impl<F, Q: SubmissionQueue<F> + ?Sized> SubmissionQueue<F> for &mut Q {
    fn signal(&mut self, fence: &F, value: u64) -> Result<(), BackendError> {
        (**self).signal(fence, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_memory_accessors() {
        let mut bytes = vec![0u8; 64];
        let ptr = NonNull::new(bytes.as_mut_ptr()).unwrap();
        let memory = unsafe { PageMemory::new(7u32, ptr, 0xdead_0000) };

        assert_eq!(*memory.handle(), 7);
        assert_eq!(memory.mapped(), ptr);
        assert_eq!(memory.device_address(), 0xdead_0000);
        assert_eq!(memory.into_handle(), 7);
    }

    #[test]
    fn test_backend_error_display() {
        assert_eq!(BackendError::OutOfMemory.to_string(), "device out of memory");
        assert_eq!(
            BackendError::Backend("lost".into()).to_string(),
            "backend error: lost"
        );
    }
}
