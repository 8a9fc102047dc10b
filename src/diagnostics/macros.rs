//! Diagnostic and logging macros.

/// Emit a predefined diagnostic by code.
///
/// # Example
///
/// ```rust,ignore
/// fe_emit!(FE001);
/// ```
#[macro_export]
macro_rules! fe_emit {
    ($code:ident) => {{
        $crate::diagnostics::emit::emit(&$crate::diagnostics::$code);
    }};
}

// Crate-internal logging. Compiles to nothing without the `log` feature, but
// still type-checks the format arguments.

macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
        #[cfg(not(feature = "log"))]
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
        #[cfg(not(feature = "log"))]
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
        #[cfg(not(feature = "log"))]
        let _ = format_args!($($arg)*);
    }};
}

pub(crate) use {log_debug, log_trace, log_warn};
