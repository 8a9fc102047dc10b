//! Synchronization primitives.
//!
//! The arena itself is single-writer; only the simulated device shares
//! state across threads.

pub(crate) mod mutex;
