//! The page arena: bump suballocation inside fixed-size pages, with
//! page-granularity reclamation gated on device fences.
//!
//! Every page is in exactly one of three lists:
//!
//! ```text
//!            suballocate              commit                  retire
//!  unused ─────────────────► used ─────────────► pending ─────────────► unused
//!  (cursor 0)                (refs == 0 only)    (fence signalled)      (fence passed)
//! ```
//!
//! Pages are only given back to the backend by [`PageArena::shrink`]
//! (unused pages) and on teardown, which first blocks until every pending
//! fence has passed.

use std::ptr::NonNull;

use super::allocation::Allocation;
use super::config::ArenaConfig;
use super::error::ArenaError;
use super::stats::ArenaStats;
use super::wait::{Spin, WaitStrategy};
use crate::allocators::page::{Page, PageId, PageState};
use crate::allocators::page_list::{PageList, PageTable};
use crate::diagnostics::hooks::{ArenaEvent, EventHooks};
use crate::diagnostics::macros::{log_debug, log_trace, log_warn};
use crate::diagnostics::tracy;
use crate::fe_emit;
use crate::gpu::{DeviceBackend, SubmissionQueue};
use crate::util::layout::{is_valid_alignment, pages_for};

#[derive(Debug, Default)]
struct Counters {
    allocation_count: u64,
    pages_created: u64,
    pages_destroyed: u64,
    commits: u64,
    retired_pages: u64,
    peak_pages: usize,
}

/// Fixed-page linear allocator for streaming data to a device queue.
///
/// Single writer: every operation takes `&mut self` and none may be called
/// from inside another (e.g. from an event hook).
///
/// # Example
///
/// ```rust
/// use fencealloc::{ArenaConfig, DummyDevice, PageArena};
///
/// let device = DummyDevice::new();
/// let mut queue = device.queue();
/// let mut arena = PageArena::new(device.clone(), ArenaConfig::default()).unwrap();
///
/// let constants = arena.suballocate(256, 256).unwrap();
/// unsafe { constants.copy_from_slice(&[1, 2, 3, 4]) };
/// // ... record work reading constants.device_address() and submit it ...
/// arena.commit(&mut queue).unwrap();
///
/// device.process_all(); // the device finishes the work
/// assert_eq!(arena.retire(), 1);
/// ```
pub struct PageArena<B: DeviceBackend> {
    backend: B,
    table: PageTable<B::Memory, B::Fence>,
    unused: PageList,
    used: PageList,
    pending: PageList,
    page_size: usize,
    clear_on_retire: bool,
    debug_name: Option<String>,
    counters: Counters,
    hooks: EventHooks,
}

impl<B: DeviceBackend> PageArena<B> {
    /// Create an arena, preallocating `config.preallocate_bytes` rounded up
    /// to whole pages.
    ///
    /// Fails with `InvalidArgument` for a zero page size and with
    /// `OutOfMemory` if any preallocated page cannot be created (pages
    /// created up to that point are released).
    pub fn new(backend: B, config: ArenaConfig) -> Result<Self, ArenaError> {
        if config.page_size == 0 {
            return Err(ArenaError::InvalidArgument("page size must be non-zero"));
        }

        let mut arena = Self {
            backend,
            table: PageTable::new(),
            unused: PageList::new(PageState::Unused),
            used: PageList::new(PageState::Used),
            pending: PageList::new(PageState::Pending),
            page_size: config.page_size,
            clear_on_retire: config.clear_on_retire,
            debug_name: config.debug_name,
            counters: Counters::default(),
            hooks: EventHooks::default(),
        };

        let preallocate = pages_for(config.preallocate_bytes, config.page_size);
        for _ in 0..preallocate {
            arena.create_page()?;
        }
        if preallocate > 0 {
            log_debug!(
                "[fencealloc] preallocated {} pages of {} bytes",
                preallocate,
                config.page_size
            );
        }

        Ok(arena)
    }

    // =========================================================================
    // Suballocation
    // =========================================================================

    /// Carve `size` bytes at `alignment` (0 = unconstrained, otherwise a
    /// power of two) out of a page.
    pub fn suballocate(&mut self, size: usize, alignment: usize) -> Result<Allocation, ArenaError> {
        let index = self.page_for_alloc(size, alignment)?;
        let page = self.table.page_mut(index);
        let offset = page.suballocate(size, alignment)?;

        let memory = page.memory();
        // SAFETY: offset + size <= capacity, so the pointer stays inside the
        // mapped page and is non-null.
        let cpu_ptr = unsafe { NonNull::new_unchecked(memory.mapped().as_ptr().add(offset)) };
        let device_address = memory.device_address() + offset as u64;

        self.counters.allocation_count += 1;
        let page = self.table.id_of(index);
        log_trace!(
            "[fencealloc] suballocated {} bytes at {:?}+{} ({:#x})",
            size,
            page,
            offset,
            device_address
        );

        Ok(Allocation {
            page,
            offset,
            size,
            cpu_ptr,
            device_address,
        })
    }

    /// Pick the page the next `suballocate(size, alignment)` would use,
    /// taking a clean page into `used` if needed.
    pub fn find_page_for_alloc(&mut self, size: usize, alignment: usize) -> Result<PageId, ArenaError> {
        let index = self.page_for_alloc(size, alignment)?;
        Ok(self.table.id_of(index))
    }

    fn page_for_alloc(&mut self, size: usize, alignment: usize) -> Result<u32, ArenaError> {
        self.check_request(size, alignment)?;

        // A whole-page request can only be met by an empty page.
        if size == self.page_size && (alignment == 0 || alignment == self.page_size) {
            return self.clean_page();
        }

        // First fit. `used` stays short: pages leave it on every commit.
        let found = self
            .table
            .iter(&self.used)
            .find(|&index| self.table.page(index).fits(size, alignment));

        match found {
            Some(index) => Ok(index),
            None => self.clean_page(),
        }
    }

    fn check_request(&self, size: usize, alignment: usize) -> Result<(), ArenaError> {
        if size == 0 {
            fe_emit!(FE001);
            return Err(ArenaError::InvalidArgument("cannot honor a zero-size suballocation"));
        }
        if size > self.page_size {
            fe_emit!(FE002);
            return Err(ArenaError::InvalidArgument("size exceeds the page size"));
        }
        if alignment > self.page_size || !is_valid_alignment(alignment) {
            fe_emit!(FE003);
            return Err(ArenaError::InvalidArgument(
                "alignment must be 0 or a power of two no larger than the page size",
            ));
        }
        Ok(())
    }

    /// Move the first unused page (creating one if the pool is empty) to the
    /// head of `used`.
    fn clean_page(&mut self) -> Result<u32, ArenaError> {
        let index = match self.unused.head() {
            Some(index) => index,
            None => self.create_page()?,
        };

        self.table.remove(&mut self.unused, index);
        self.table.push_front(&mut self.used, index);
        debug_assert_eq!(self.table.page(index).cursor(), 0);

        let page = self.table.id_of(index);
        self.hooks.emit(ArenaEvent::PageAcquired { page });
        self.after_mutation();
        Ok(index)
    }

    /// Create a page through the backend and put it at the head of `unused`.
    fn create_page(&mut self) -> Result<u32, ArenaError> {
        let memory = match self.backend.create_page(self.page_size) {
            Ok(memory) => memory,
            Err(_err) => {
                fe_emit!(FE101);
                log_warn!("[fencealloc] page creation failed: {}", _err);
                return Err(ArenaError::OutOfMemory);
            }
        };
        let fence = match self.backend.create_fence() {
            Ok(fence) => fence,
            Err(_err) => {
                self.backend.release_page(memory);
                fe_emit!(FE101);
                log_warn!("[fencealloc] fence creation failed: {}", _err);
                return Err(ArenaError::OutOfMemory);
            }
        };

        if let Some(name) = &self.debug_name {
            self.backend.set_debug_name(memory.handle(), name);
        }

        let device_address = memory.device_address();
        let index = self.table.insert(Page::new(memory, fence, self.page_size));
        self.table.push_front(&mut self.unused, index);

        self.counters.pages_created += 1;
        self.counters.peak_pages = self.counters.peak_pages.max(self.table.live());

        let page = self.table.id_of(index);
        log_debug!(
            "[fencealloc] created page {:?} at {:#x} ({} pages total)",
            page,
            device_address,
            self.table.live()
        );
        self.hooks.emit(ArenaEvent::PageCreated {
            page,
            device_address,
        });
        self.after_mutation();
        Ok(index)
    }

    // =========================================================================
    // Outstanding references
    // =========================================================================

    /// Record one more not-yet-submitted work item referencing `page`.
    ///
    /// While a page's count is non-zero, `commit` leaves it in `used`.
    /// Only pages in `used` can be retained.
    pub fn retain(&mut self, page: PageId) -> Result<(), ArenaError> {
        let index = self.resolve(page)?;
        let page = self.table.page_mut(index);
        if page.state != PageState::Used {
            return Err(ArenaError::InvalidArgument("only pages in use can be retained"));
        }
        page.add_ref();
        Ok(())
    }

    /// Drop a reference taken with [`retain`](Self::retain), typically once
    /// the work item has been submitted.
    pub fn release(&mut self, page: PageId) -> Result<(), ArenaError> {
        let index = self.resolve(page)?;
        if !self.table.page_mut(index).release_ref() {
            fe_emit!(FE301);
            return Err(ArenaError::InvalidArgument("page released without a matching retain"));
        }
        Ok(())
    }

    // =========================================================================
    // Commit / retire
    // =========================================================================

    /// Fence every unreferenced page in `used`. Call after submitting the
    /// work that reads them.
    ///
    /// Each such page gets the next value of its own fence signalled through
    /// `queue` and moves to `pending`; referenced pages stay in `used`.
    /// Returns the number of pages moved.
    ///
    /// If `queue` fails to signal a page, that page and every page not yet
    /// visited stay in `used`, pages already signalled still move, and the
    /// error is returned.
    pub fn commit<Q>(&mut self, queue: &mut Q) -> Result<usize, ArenaError>
    where
        Q: SubmissionQueue<B::Fence> + ?Sized,
    {
        if self.used.is_empty() {
            return Ok(0);
        }

        let mut ready = PageList::new(PageState::Pending);
        let mut unready = PageList::new(PageState::Used);
        let mut failure = None;

        while let Some(index) = self.table.pop_front(&mut self.used) {
            let page = self.table.page_mut(index);
            if failure.is_some() || page.ref_count() > 0 {
                self.table.push_front(&mut unready, index);
                continue;
            }

            let value = page.next_fence_value();
            match queue.signal(page.fence(), value) {
                Ok(()) => {
                    page.set_pending_fence(value);
                    self.table.push_front(&mut ready, index);
                }
                Err(err) => {
                    failure = Some(err);
                    self.table.push_front(&mut unready, index);
                }
            }
        }

        self.used = unready;
        let count = ready.len();
        self.table.splice_front(&mut self.pending, ready);

        if count > 0 {
            self.counters.commits += 1;
            log_debug!(
                "[fencealloc] committed {} pages ({} pending, {} still referenced)",
                count,
                self.pending.len(),
                self.used.len()
            );
            self.hooks.emit(ArenaEvent::PagesCommitted { count });
        }
        self.after_mutation();

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(count),
        }
    }

    /// Return every pending page whose fence has passed to `unused`.
    ///
    /// Polls only; never blocks. Returns the number of pages retired.
    pub fn retire(&mut self) -> usize {
        let mut retired = 0;
        let mut cursor = self.pending.head();

        while let Some(index) = cursor {
            let page = self.table.page(index);
            cursor = page.links.next;

            let target = page.pending_fence();
            debug_assert_ne!(target, 0, "pending page without a fence value");
            if self.backend.completed_value(page.fence()) < target {
                continue;
            }

            self.table.remove(&mut self.pending, index);
            self.table.page_mut(index).reset(self.clear_on_retire);
            self.table.push_front(&mut self.unused, index);
            retired += 1;

            self.hooks.emit(ArenaEvent::PageRetired {
                page: self.table.id_of(index),
                fence_value: target,
            });
        }

        if retired > 0 {
            self.counters.retired_pages += retired as u64;
            log_debug!(
                "[fencealloc] retired {} pages ({} still pending)",
                retired,
                self.pending.len()
            );
            self.after_mutation();
        }
        retired
    }

    /// Block until every pending page has retired, calling `wait` between
    /// polls.
    pub fn wait_for_all_pending<W: WaitStrategy>(&mut self, mut wait: W) {
        self.drain_pending(&mut wait);
    }

    fn drain_pending<W: WaitStrategy + ?Sized>(&mut self, wait: &mut W) {
        loop {
            self.retire();
            if self.pending.is_empty() {
                return;
            }
            wait.wait(self.pending.len());
        }
    }

    // =========================================================================
    // Capacity
    // =========================================================================

    /// Free every page in `unused`. Returns the number freed.
    pub fn shrink(&mut self) -> usize {
        let mut freed = 0;
        while let Some(index) = self.table.pop_front(&mut self.unused) {
            self.free_page(index);
            freed += 1;
        }
        if freed > 0 {
            log_debug!("[fencealloc] shrink freed {} pages", freed);
            self.after_mutation();
        }
        freed
    }

    /// Give an unlinked page back to the backend.
    fn free_page(&mut self, index: u32) {
        let page = self.table.id_of(index);
        let (memory, fence) = self.table.take(index).into_parts();
        self.backend.destroy_fence(fence);
        self.backend.release_page(memory);

        self.counters.pages_destroyed += 1;
        self.hooks.emit(ArenaEvent::PageFreed { page });
    }

    /// Wait for all pending pages with `wait`, then free every page.
    ///
    /// Dropping the arena does the same with [`Spin`].
    pub fn shutdown<W: WaitStrategy>(mut self, mut wait: W) {
        self.teardown(&mut wait, false);
    }

    fn teardown<W: WaitStrategy + ?Sized>(&mut self, wait: &mut W, implicit: bool) {
        self.retire();
        let blocked = self.pending.len();
        if blocked > 0 {
            log_warn!("[fencealloc] teardown waiting on {} pending pages", blocked);
            self.drain_pending(wait);
        }

        let uncommitted = self.used.len();
        if uncommitted > 0 {
            log_warn!(
                "[fencealloc] freeing {} pages that were never committed",
                uncommitted
            );
        }

        let mut freed = 0;
        while let Some(index) = self.table.pop_front(&mut self.unused) {
            self.free_page(index);
            freed += 1;
        }
        while let Some(index) = self.table.pop_front(&mut self.used) {
            self.free_page(index);
            freed += 1;
        }
        if freed > 0 {
            log_debug!("[fencealloc] teardown freed {} pages", freed);
        }

        // Diagnostics go last: under strict mode they panic, and every page
        // must be drained and freed before that. Never panic while unwinding.
        if std::thread::panicking() {
            return;
        }
        if implicit && blocked > 0 {
            fe_emit!(FE202);
        }
        if uncommitted > 0 {
            fe_emit!(FE201);
        }
    }

    // =========================================================================
    // Debug names and hooks
    // =========================================================================

    /// Name every current and future page.
    pub fn set_debug_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        for list in [&self.pending, &self.used, &self.unused] {
            for index in self.table.iter(list) {
                self.backend
                    .set_debug_name(self.table.page(index).memory().handle(), &name);
            }
        }
        self.debug_name = Some(name);
    }

    /// Current debug name.
    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.as_deref()
    }

    /// Receive page lifecycle events. The hook must not call back into the
    /// arena.
    pub fn set_event_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&ArenaEvent) + Send + 'static,
    {
        self.hooks.set(Some(Box::new(hook)));
    }

    /// Stop delivering events.
    pub fn clear_event_hook(&mut self) {
        self.hooks.set(None);
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    /// Check every bookkeeping invariant.
    ///
    /// Debug builds run this after every mutation and panic on failure.
    pub fn validate(&self) -> Result<(), ArenaError> {
        for list in [&self.unused, &self.used, &self.pending] {
            self.table
                .validate_list(list)
                .map_err(ArenaError::InternalInvariant)?;
        }

        let listed = self.unused.len() + self.used.len() + self.pending.len();
        if listed != self.table.live() {
            return Err(ArenaError::InternalInvariant(format!(
                "{} pages listed but {} alive",
                listed,
                self.table.live()
            )));
        }

        let created = self.counters.pages_created - self.counters.pages_destroyed;
        if created != self.table.live() as u64 {
            return Err(ArenaError::InternalInvariant(format!(
                "{} pages created and not destroyed but {} alive",
                created,
                self.table.live()
            )));
        }

        for index in self.table.indices() {
            let page = self.table.page(index);
            if !page.links.linked {
                return Err(ArenaError::InternalInvariant(format!(
                    "page {} is on no list",
                    index
                )));
            }
            if page.cursor() > page.capacity() {
                return Err(ArenaError::InternalInvariant(format!(
                    "page {} cursor {} past capacity {}",
                    index,
                    page.cursor(),
                    page.capacity()
                )));
            }
            if page.state == PageState::Unused && page.cursor() != 0 {
                return Err(ArenaError::InternalInvariant(format!(
                    "unused page {} has cursor {}",
                    index,
                    page.cursor()
                )));
            }
            if page.state == PageState::Pending && page.pending_fence() == 0 {
                return Err(ArenaError::InternalInvariant(format!(
                    "pending page {} has no fence value",
                    index
                )));
            }
        }
        Ok(())
    }

    fn after_mutation(&self) {
        tracy::plot_page_counts(self.unused.len(), self.used.len(), self.pending.len());

        #[cfg(debug_assertions)]
        {
            if let Err(err) = self.validate() {
                fe_emit!(FE901);
                panic!("[fencealloc] {}", err);
            }
        }
    }

    fn resolve(&self, page: PageId) -> Result<u32, ArenaError> {
        self.table
            .resolve(page)
            .ok_or(ArenaError::InvalidArgument("stale or foreign page id"))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Bytes per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pages alive across all three lists.
    pub fn total_pages(&self) -> usize {
        self.table.live()
    }

    /// Pages in the free pool.
    pub fn unused_count(&self) -> usize {
        self.unused.len()
    }

    /// Pages handing out suballocations.
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Pages waiting on their fence.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Pages in one list, head first.
    pub fn pages(&self, state: PageState) -> Vec<PageId> {
        let list = match state {
            PageState::Unused => &self.unused,
            PageState::Used => &self.used,
            PageState::Pending => &self.pending,
        };
        self.table
            .iter(list)
            .map(|index| self.table.id_of(index))
            .collect()
    }

    /// Which list `page` is on, or `None` for a stale id.
    pub fn page_state(&self, page: PageId) -> Option<PageState> {
        self.lookup(page).map(|page| page.state)
    }

    /// Bump cursor of `page`.
    pub fn page_cursor(&self, page: PageId) -> Option<usize> {
        self.lookup(page).map(|page| page.cursor())
    }

    /// Last fence value signalled for `page` (0 if never committed).
    pub fn page_pending_fence(&self, page: PageId) -> Option<u64> {
        self.lookup(page).map(|page| page.pending_fence())
    }

    /// Outstanding references on `page`.
    pub fn page_ref_count(&self, page: PageId) -> Option<u32> {
        self.lookup(page).map(|page| page.ref_count())
    }

    /// Fence of `page`, e.g. for completing it on a simulated device.
    pub fn page_fence(&self, page: PageId) -> Option<&B::Fence> {
        self.lookup(page).map(|page| page.fence())
    }

    /// Device base address of `page`.
    pub fn page_device_address(&self, page: PageId) -> Option<u64> {
        self.lookup(page).map(|page| page.memory().device_address())
    }

    fn lookup(&self, page: PageId) -> Option<&Page<B::Memory, B::Fence>> {
        self.table.resolve(page).map(|index| self.table.page(index))
    }

    /// The device backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The device backend, mutably. Pages and fences owned by the arena must
    /// not be touched through it.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current statistics.
    pub fn stats(&self) -> ArenaStats {
        let bytes_in_use = self
            .table
            .iter(&self.used)
            .map(|index| self.table.page(index).cursor())
            .sum();

        ArenaStats {
            page_size: self.page_size,
            total_pages: self.table.live(),
            unused_pages: self.unused.len(),
            used_pages: self.used.len(),
            pending_pages: self.pending.len(),
            peak_pages: self.counters.peak_pages,
            bytes_in_use,
            allocation_count: self.counters.allocation_count,
            pages_created: self.counters.pages_created,
            pages_destroyed: self.counters.pages_destroyed,
            commits: self.counters.commits,
            retired_pages: self.counters.retired_pages,
        }
    }
}

impl<B: DeviceBackend> Drop for PageArena<B> {
    fn drop(&mut self) {
        self.teardown(&mut Spin, true);
    }
}

impl<B: DeviceBackend> std::fmt::Debug for PageArena<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageArena")
            .field("page_size", &self.page_size)
            .field("unused", &self.unused.len())
            .field("used", &self.used.len())
            .field("pending", &self.pending.len())
            .field("debug_name", &self.debug_name)
            .field("hooks", &self.hooks)
            .finish()
    }
}
