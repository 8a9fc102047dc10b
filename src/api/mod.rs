//! Public API: the arena and its configuration, errors and results.

pub mod allocation;
pub mod arena;
pub mod config;
pub mod error;
pub mod stats;
pub mod wait;
