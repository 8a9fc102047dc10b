//! What to do between fence polls while blocking on pending pages.

use std::time::Duration;

/// Called between polls by blocking drains and teardown.
///
/// Any `FnMut()` closure is a strategy, which lets tests advance a simulated
/// device instead of waiting on real time.
pub trait WaitStrategy {
    /// Pause before the next poll. `pending_pages` pages are still waiting.
    fn wait(&mut self, pending_pages: usize);
}

impl<F: FnMut()> WaitStrategy for F {
    fn wait(&mut self, _pending_pages: usize) {
        self()
    }
}

/// Busy-poll, yielding the thread between polls. Used by `Drop`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl WaitStrategy for Spin {
    fn wait(&mut self, _pending_pages: usize) {
        std::hint::spin_loop();
        std::thread::yield_now();
    }
}

/// Sleep a fixed interval between polls.
#[derive(Debug, Clone, Copy)]
pub struct Sleep(pub Duration);

impl WaitStrategy for Sleep {
    fn wait(&mut self, _pending_pages: usize) {
        std::thread::sleep(self.0);
    }
}
