//! Device backends
//!
//! The traits are always present: the arena depends on them, not on any
//! backend. `DummyDevice` is always available for tests and tooling.
//!
//! ## Backends
//! - `dummy`: host memory, simulated fences
//! - `vulkan`: via `ash` + `gpu-allocator` (enable `gpu-vulkan` feature)

pub mod traits;
pub use traits::{BackendError, DeviceBackend, PageMemory, SubmissionQueue};

pub mod dummy;
pub use dummy::{DummyDevice, DummyFence, DummyMemory, DummyQueue};

#[cfg(feature = "gpu-vulkan")]
pub mod vulkan;
