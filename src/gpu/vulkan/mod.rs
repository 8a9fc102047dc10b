//! Vulkan backend
//!
//! Pages are persistently mapped `CpuToGpu` buffers allocated through
//! `gpu-allocator`, with buffer device addresses enabled. Fences are timeline
//! semaphores, signalled from a queue submission and polled with
//! `vkGetSemaphoreCounterValue`.
//!
//! Requires Vulkan 1.2 (or the timeline semaphore and buffer device address
//! extensions) on the device passed in.

pub mod backend;

pub use backend::{VulkanBackend, VulkanFence, VulkanPage, VulkanQueue};
