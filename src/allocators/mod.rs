//! Page-level building blocks of the arena.

pub(crate) mod page;
pub(crate) mod page_list;
