//! Arena errors.

use crate::gpu::BackendError;
use std::fmt;

/// Errors returned by [`PageArena`](crate::PageArena) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Zero-size request, size or alignment larger than a page, bad
    /// alignment, stale page id, or unbalanced retain/release.
    InvalidArgument(&'static str),
    /// The backend could not create a page or fence.
    OutOfMemory,
    /// A page was asked for more than it has left. The arena's page
    /// selection should make this unreachable.
    CapacityExceeded {
        /// Bytes requested.
        requested: usize,
        /// Bytes left in the page.
        available: usize,
    },
    /// Page list bookkeeping is inconsistent.
    InternalInvariant(String),
    /// A backend call other than creation failed (e.g. queue signal).
    Backend(BackendError),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            ArenaError::OutOfMemory => write!(f, "out of device memory for a new page"),
            ArenaError::CapacityExceeded {
                requested,
                available,
            } => write!(
                f,
                "page capacity exceeded: {} bytes requested, {} available",
                requested, available
            ),
            ArenaError::InternalInvariant(msg) => write!(f, "internal invariant violated: {}", msg),
            ArenaError::Backend(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ArenaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArenaError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for ArenaError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::OutOfMemory => ArenaError::OutOfMemory,
            other => ArenaError::Backend(other),
        }
    }
}
