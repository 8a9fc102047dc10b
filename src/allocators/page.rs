//! A fixed-size page of mapped device memory with a bump cursor.

use crate::api::error::ArenaError;
use crate::gpu::PageMemory;
use crate::util::layout::checked_align_offset;

/// Stable handle to a page.
///
/// The generation changes whenever the slot is reused after its page was
/// freed, so ids held across a `shrink` are detected as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl PageId {
    /// Slot index (for debugging).
    pub fn raw_index(&self) -> u32 {
        self.index
    }

    /// Slot generation (for debugging).
    pub fn raw_generation(&self) -> u32 {
        self.generation
    }
}

/// Which of the three page lists a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    /// Free pool; cursor is 0.
    Unused,
    /// Handing out suballocations.
    Used,
    /// Committed; waiting for its fence to reach `pending_fence`.
    Pending,
}

/// Links into the page list the page is currently on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Links {
    pub prev: Option<u32>,
    pub next: Option<u32>,
    /// Set while the page is on a list. Guards against double insertion.
    pub linked: bool,
}

/// One page: backing memory, fence and bump cursor.
pub(crate) struct Page<M, F> {
    memory: PageMemory<M>,
    fence: F,
    capacity: usize,
    cursor: usize,
    pending_fence: u64,
    ref_count: u32,
    pub(crate) state: PageState,
    pub(crate) links: Links,
}

impl<M, F> Page<M, F> {
    /// A fresh page. Its memory is zeroed.
    pub fn new(memory: PageMemory<M>, fence: F, capacity: usize) -> Self {
        let page = Self {
            memory,
            fence,
            capacity,
            cursor: 0,
            pending_fence: 0,
            ref_count: 0,
            state: PageState::Unused,
            links: Links::default(),
        };
        page.clear_memory();
        page
    }

    /// Bump-allocate `size` bytes at `alignment` (0 = unconstrained).
    ///
    /// Only moves the cursor; memory contents are untouched.
    pub fn suballocate(&mut self, size: usize, alignment: usize) -> Result<usize, ArenaError> {
        let offset = checked_align_offset(self.cursor, alignment);
        match offset.and_then(|offset| offset.checked_add(size).map(|end| (offset, end))) {
            Some((offset, end)) if end <= self.capacity => {
                self.cursor = end;
                Ok(offset)
            }
            _ => Err(ArenaError::CapacityExceeded {
                requested: size,
                available: self.capacity - self.cursor,
            }),
        }
    }

    /// Would [`suballocate`](Self::suballocate) succeed?
    pub fn fits(&self, size: usize, alignment: usize) -> bool {
        checked_align_offset(self.cursor, alignment)
            .and_then(|offset| offset.checked_add(size))
            .map_or(false, |end| end <= self.capacity)
    }

    /// Rewind to an empty page, optionally zeroing its memory.
    pub fn reset(&mut self, clear: bool) {
        self.cursor = 0;
        if clear {
            self.clear_memory();
        }
    }

    fn clear_memory(&self) {
        // SAFETY: PageMemory guarantees `capacity` writable bytes at `mapped`
        // and the arena hands out no allocations on a page being reset.
        unsafe { std::ptr::write_bytes(self.memory.mapped().as_ptr(), 0, self.capacity) };
    }

    pub fn memory(&self) -> &PageMemory<M> {
        &self.memory
    }

    pub fn fence(&self) -> &F {
        &self.fence
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    pub fn pending_fence(&self) -> u64 {
        self.pending_fence
    }

    /// Next value to signal; strictly greater than any value used before.
    pub fn next_fence_value(&self) -> u64 {
        self.pending_fence + 1
    }

    pub fn set_pending_fence(&mut self, value: u64) {
        debug_assert!(value > self.pending_fence);
        self.pending_fence = value;
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn add_ref(&mut self) {
        self.ref_count += 1;
    }

    /// Returns false if the count was already zero.
    pub fn release_ref(&mut self) -> bool {
        match self.ref_count.checked_sub(1) {
            Some(count) => {
                self.ref_count = count;
                true
            }
            None => false,
        }
    }

    /// Split into backing memory and fence for destruction.
    pub fn into_parts(self) -> (PageMemory<M>, F) {
        (self.memory, self.fence)
    }
}
