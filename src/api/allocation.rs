//! A suballocation handed out by the arena.

use crate::allocators::page::PageId;
use std::ptr::NonNull;

/// A range of mapped page memory plus its device address.
///
/// The range stays valid until the page is committed and its fence is
/// observed by `retire`; after that the bytes belong to a future
/// suballocation. Nothing in the type enforces this, which is why the
/// accessors that touch memory are `unsafe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub(crate) page: PageId,
    pub(crate) offset: usize,
    pub(crate) size: usize,
    pub(crate) cpu_ptr: NonNull<u8>,
    pub(crate) device_address: u64,
}

impl Allocation {
    /// Page the range was carved from. Pass this to `retain`/`release`.
    pub fn page(&self) -> PageId {
        self.page
    }

    /// Byte offset within the page.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// CPU pointer to the first byte.
    pub fn as_ptr(&self) -> *mut u8 {
        self.cpu_ptr.as_ptr()
    }

    /// Device address of the first byte, for use in submitted work.
    pub fn device_address(&self) -> u64 {
        self.device_address
    }

    /// View the range as a byte slice.
    ///
    /// # Safety
    ///
    /// The page must not have been retired since this allocation was made,
    /// and no other live reference to the range may exist.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        std::slice::from_raw_parts_mut(self.cpu_ptr.as_ptr(), self.size)
    }

    /// Copy `bytes` to the start of the range.
    ///
    /// # Safety
    ///
    /// Same as [`as_mut_slice`](Self::as_mut_slice).
    ///
    /// # Panics
    ///
    /// If `bytes` is longer than the allocation.
    pub unsafe fn copy_from_slice(&self, bytes: &[u8]) {
        assert!(
            bytes.len() <= self.size,
            "{} bytes do not fit a {}-byte allocation",
            bytes.len(),
            self.size
        );
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.cpu_ptr.as_ptr(), bytes.len());
    }
}
