//! Diagnostics, logging and profiler hooks.
//!
//! - **Runtime diagnostics**: rustc-like messages with codes
//! - **Strict mode**: optional panic-on-diagnostic for CI
//! - **Event hooks**: page lifecycle events for overlays and profilers
//! - **Tracy**: page-count plots (feature `tracy`)
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                        |
//! |-------|--------------------------------|
//! | FE0xx | Request validation             |
//! | FE1xx | Device backend failures        |
//! | FE2xx | Teardown                       |
//! | FE3xx | Reference tracking             |
//! | FE9xx | Internal errors                |

pub mod emit;
pub mod hooks;
pub mod kind;
pub(crate) mod macros;
pub mod strict;
pub(crate) mod tracy;

pub use emit::{emit, set_thread_sink, suppress_diagnostics, CollectingSink, DiagnosticSink};
pub use hooks::{ArenaEvent, EventHook};
pub use kind::{Diagnostic, DiagnosticKind};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};

pub use kind::{FE001, FE002, FE003, FE101, FE201, FE202, FE301, FE901};
