//! Diagnostic emission backend.
//!
//! Diagnostics go to a thread-local sink when one is installed, otherwise to
//! the `log` crate (feature `log`) or stderr. Stderr output only happens in
//! debug builds or with the `diagnostics` feature.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::kind::Diagnostic;
use super::strict::strict_mode;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static THREAD_SINK: RefCell<Option<Arc<dyn DiagnosticSink>>> = RefCell::new(None);
}

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Route diagnostics emitted on this thread to `sink` (or back to the
/// default output with `None`).
pub fn set_thread_sink(sink: Option<Arc<dyn DiagnosticSink>>) {
    THREAD_SINK.with(|slot| *slot.borrow_mut() = sink);
}

/// Emit a diagnostic.
pub fn emit(diag: &Diagnostic) {
    if is_suppressed() {
        return;
    }

    let sunk = THREAD_SINK.with(|slot| match slot.borrow().as_ref() {
        Some(sink) => {
            sink.emit(diag);
            true
        }
        None => false,
    });

    if !sunk {
        #[cfg(feature = "log")]
        emit_to_log(diag);

        #[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
        emit_to_stderr(diag);
    }

    if strict_mode().is_fatal(diag.kind) {
        panic!(
            "[fencealloc][{}] {}\nStrict mode enabled - diagnostics are fatal.",
            diag.code, diag.message
        );
    }
}

#[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
fn emit_to_stderr(diag: &Diagnostic) {
    eprintln!("[fencealloc][{}] {}: {}", diag.code, diag.kind.prefix(), diag.message);
    if let Some(note) = diag.note {
        eprintln!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        eprintln!("  help: {}", help);
    }
}

#[cfg(feature = "log")]
fn emit_to_log(diag: &Diagnostic) {
    use super::kind::DiagnosticKind;

    match diag.kind {
        DiagnosticKind::Error => log::error!("[{}] {}", diag.code, diag.message),
        DiagnosticKind::Warning => log::warn!("[{}] {}", diag.code, diag.message),
        DiagnosticKind::Note => log::info!("[{}] {}", diag.code, diag.message),
    }
    if let Some(note) = diag.note {
        log::info!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::info!("  help: {}", help);
    }
}

/// A diagnostic sink trait for custom output.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic.
    fn emit(&self, diag: &Diagnostic);
}

/// A simple sink that collects diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Codes of all collected diagnostics, in emission order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.diagnostics().iter().map(|d| d.code).collect()
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diag.clone());
    }
}
