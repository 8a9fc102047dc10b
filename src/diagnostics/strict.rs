//! Strict mode: turn diagnostics into panics, typically in CI.
//!
//! Set programmatically with [`set_strict_mode`] / [`StrictModeGuard`], or
//! from the `FENCEALLOC_STRICT` environment variable via [`init_from_env`].

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use super::kind::DiagnosticKind;

/// Which diagnostics are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum StrictMode {
    /// Nothing is fatal.
    #[default]
    Warn,
    /// Errors panic after being emitted.
    PanicOnError,
    /// Errors and warnings panic after being emitted.
    PanicOnWarning,
}

impl StrictMode {
    /// Does a diagnostic of `kind` panic under this mode?
    pub fn is_fatal(self, kind: DiagnosticKind) -> bool {
        match kind {
            DiagnosticKind::Error => self >= StrictMode::PanicOnError,
            DiagnosticKind::Warning => self == StrictMode::PanicOnWarning,
            DiagnosticKind::Note => false,
        }
    }

    const fn to_bits(self) -> u8 {
        match self {
            StrictMode::Warn => 0,
            StrictMode::PanicOnError => 1,
            StrictMode::PanicOnWarning => 2,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => StrictMode::PanicOnError,
            2 => StrictMode::PanicOnWarning,
            _ => StrictMode::Warn,
        }
    }
}

impl FromStr for StrictMode {
    type Err = String;

    /// Accepts `0`/`warn`/`off`, `1`/`error`/`true`, `2`/`warning`/`all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "warn" | "off" | "false" => Ok(StrictMode::Warn),
            "1" | "error" | "true" => Ok(StrictMode::PanicOnError),
            "2" | "warning" | "all" => Ok(StrictMode::PanicOnWarning),
            other => Err(format!("unknown strict mode '{}'", other)),
        }
    }
}

static STRICT_MODE: AtomicU8 = AtomicU8::new(0);

/// Set the process-wide strict mode.
pub fn set_strict_mode(mode: StrictMode) {
    STRICT_MODE.store(mode.to_bits(), Ordering::Relaxed);
}

/// Current process-wide strict mode.
pub fn strict_mode() -> StrictMode {
    StrictMode::from_bits(STRICT_MODE.load(Ordering::Relaxed))
}

/// Restores the previous strict mode on drop.
#[derive(Debug)]
pub struct StrictModeGuard {
    previous: StrictMode,
}

impl StrictModeGuard {
    pub fn new(mode: StrictMode) -> Self {
        let previous = strict_mode();
        set_strict_mode(mode);
        Self { previous }
    }
}

impl Drop for StrictModeGuard {
    fn drop(&mut self) {
        set_strict_mode(self.previous);
    }
}

/// Apply `FENCEALLOC_STRICT` if it is set and parses. Returns the mode now
/// in effect.
pub fn init_from_env() -> StrictMode {
    if let Some(mode) = std::env::var("FENCEALLOC_STRICT")
        .ok()
        .and_then(|value| value.parse().ok())
    {
        set_strict_mode(mode);
    }
    strict_mode()
}
