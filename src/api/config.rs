//! Arena configuration.

use crate::util::size::{kb, mb};

/// Configuration for a [`PageArena`](crate::PageArena).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Bytes per page, fixed for the arena's lifetime (default: 64 KB).
    /// A power of two is recommended.
    pub page_size: usize,

    /// Bytes to preallocate at construction, rounded up to whole pages.
    pub preallocate_bytes: usize,

    /// Debug name applied to every page.
    pub debug_name: Option<String>,

    /// Zero a page's memory when it returns to the free pool
    /// (default: on in debug builds).
    pub clear_on_retire: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            page_size: kb(64),
            preallocate_bytes: 0,
            debug_name: None,
            clear_on_retire: cfg!(debug_assertions),
        }
    }
}

impl ArenaConfig {
    /// Small pages, nothing preallocated. Good for tests and tools.
    pub fn small() -> Self {
        Self {
            page_size: kb(4),
            ..Self::default()
        }
    }

    /// Large pages with a few preallocated, for per-frame constant and
    /// vertex streaming.
    pub fn streaming() -> Self {
        Self {
            page_size: mb(2),
            preallocate_bytes: mb(8),
            debug_name: None,
            clear_on_retire: false,
        }
    }

    /// Builder pattern: set page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Builder pattern: set preallocation.
    pub fn with_preallocate(mut self, bytes: usize) -> Self {
        self.preallocate_bytes = bytes;
        self
    }

    /// Builder pattern: set debug name.
    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    /// Builder pattern: clear pages on retire.
    pub fn with_clear_on_retire(mut self, enable: bool) -> Self {
        self.clear_on_retire = enable;
        self
    }
}
