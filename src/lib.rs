//! # fencealloc
//!
//! Fence-gated linear allocator for streaming per-frame data to a GPU.
//!
//! ## Features
//!
//! - Fixed-size pages of CPU-mapped, device-visible memory
//! - Bump suballocation with alignment (O(1) within a page)
//! - Page-granularity reclamation gated on per-page fences
//! - Non-blocking retire, blocking drain on teardown
//! - Backend traits with a simulated device and an optional Vulkan backend
//! - rustc-style diagnostics, strict mode and lifecycle event hooks
//!
//! ## Page lifecycle
//!
//! Pages move `unused -> used -> pending -> unused`. Suballocations come out
//! of `used` pages; `commit` fences them after the work that reads them has
//! been submitted; `retire` recycles the ones whose fence has passed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fencealloc::{ArenaConfig, DummyDevice, PageArena};
//!
//! let device = DummyDevice::new();
//! let mut queue = device.queue();
//! let mut arena = PageArena::new(device.clone(), ArenaConfig::streaming()).unwrap();
//!
//! // Frame loop
//! loop {
//!     arena.retire();
//!     let constants = arena.suballocate(256, 256).unwrap();
//!     unsafe { constants.copy_from_slice(&[0u8; 64]) };
//!     // ... submit work reading constants.device_address() ...
//!     arena.commit(&mut queue).unwrap();
//! #   break;
//! }
//! ```
//!
//! ## Cargo features
//!
//! - `gpu-vulkan`: Vulkan backend (`ash` + `gpu-allocator`)
//! - `log`: `log` crate output for page lifecycle and diagnostics
//! - `tracy`: page-count plots in the Tracy profiler
//! - `parking_lot`: faster internal mutex for the simulated device
//! - `diagnostics`: print diagnostics in release builds too

pub mod api;
pub mod diagnostics;
pub mod gpu;
pub mod util;

#[allow(dead_code)]
mod allocators;
#[allow(dead_code)]
mod sync;

// Re-export public API at crate root for convenience
pub use allocators::page::{PageId, PageState};
pub use api::allocation::Allocation;
pub use api::arena::PageArena;
pub use api::config::ArenaConfig;
pub use api::error::ArenaError;
pub use api::stats::ArenaStats;
pub use api::wait::{Sleep, Spin, WaitStrategy};

// Device backends
pub use gpu::{
    BackendError, DeviceBackend, DummyDevice, DummyFence, DummyMemory, DummyQueue, PageMemory,
    SubmissionQueue,
};

// Diagnostics
pub use diagnostics::{
    ArenaEvent, CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, StrictMode,
    StrictModeGuard,
};
