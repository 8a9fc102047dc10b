//! Small helpers shared by the arena and its backends.

pub mod layout;
pub mod size;
