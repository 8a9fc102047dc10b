//! Diagnostic kinds and predefined codes.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `FE0xx` - Request validation
/// - `FE1xx` - Device backend failures
/// - `FE2xx` - Teardown
/// - `FE3xx` - Reference tracking
/// - `FE9xx` - Internal errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "FE001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// FE0xx - Request validation
// =============================================================================

/// FE001: Zero-sized suballocation.
pub const FE001: Diagnostic = Diagnostic::error("FE001", "cannot honor a zero-size suballocation")
    .with_help("skip the upload or request at least one byte");

/// FE002: Request larger than a page.
pub const FE002: Diagnostic = Diagnostic::error(
    "FE002",
    "suballocation size exceeds the arena's page size",
)
.with_note("a suballocation never spans pages")
.with_help("raise ArenaConfig::page_size or split the upload");

/// FE003: Alignment larger than a page or not a power of two.
pub const FE003: Diagnostic = Diagnostic::error(
    "FE003",
    "alignment must be 0 or a power of two no larger than the page size",
);

// =============================================================================
// FE1xx - Device backend
// =============================================================================

/// FE101: Backend could not create a page or its fence.
pub const FE101: Diagnostic = Diagnostic::error("FE101", "device backend failed to create a page")
    .with_help("call shrink() on idle arenas or lower the preallocation");

// =============================================================================
// FE2xx - Teardown
// =============================================================================

/// FE201: Pages still in use at teardown.
pub const FE201: Diagnostic = Diagnostic::warning(
    "FE201",
    "arena torn down with pages that were never committed",
)
.with_note("their memory is freed; any reference to it is now stale")
.with_help("call commit() after the last submission that uses the arena");

/// FE202: Teardown had to wait for the device.
pub const FE202: Diagnostic = Diagnostic::warning(
    "FE202",
    "arena teardown is blocking on pages the device has not finished reading",
)
.with_help("drain with wait_for_all_pending() before dropping the arena");

// =============================================================================
// FE3xx - Reference tracking
// =============================================================================

/// FE301: Release without a matching retain.
pub const FE301: Diagnostic = Diagnostic::error(
    "FE301",
    "page released more times than it was retained",
);

// =============================================================================
// FE9xx - Internal
// =============================================================================

/// FE901: Page list bookkeeping is corrupt.
pub const FE901: Diagnostic = Diagnostic::error("FE901", "page list corruption detected")
    .with_note("this is a bug in fencealloc, not in the caller");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_codes() {
        assert_eq!(FE001.code, "FE001");
        assert_eq!(FE001.kind, DiagnosticKind::Error);
        assert_eq!(FE202.kind, DiagnosticKind::Warning);
        assert!(FE002.note.is_some());
        assert!(FE002.help.is_some());
    }

    #[test]
    fn test_prefix() {
        assert_eq!(DiagnosticKind::Error.prefix(), "error");
        assert_eq!(DiagnosticKind::Note.prefix(), "note");
    }
}
