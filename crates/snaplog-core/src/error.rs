// ── Core error types ──
//
// Everything the logger can report, from blocked readers to failed
// refresh cycles. Producer and device failures arrive as boxed errors
// because they come from caller-supplied code.

use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by producers, placeholders, and device clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum Error {
    // ── Reader errors ────────────────────────────────────────────────
    #[error("Unknown value name: {name}")]
    UnknownName { name: String },

    #[error("No snapshot became ready within {waited:?}")]
    Timeout { waited: Duration },

    // ── Refresh-cycle errors ─────────────────────────────────────────
    #[error("Producer '{name}' failed: {source}")]
    Producer {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Resolving pending value for '{name}' failed: {source}")]
    Resolve {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Device batch failed: {source}")]
    Batch {
        #[source]
        source: BoxError,
    },

    #[error("Callback #{index} failed: {message}")]
    Callback { index: usize, message: String },

    // ── Session errors ───────────────────────────────────────────────
    #[error("A logging session is already active")]
    SessionActive,

    #[error("The {loop_name} loop panicked")]
    ThreadPanicked { loop_name: &'static str },

    // ── Log I/O errors ───────────────────────────────────────────────
    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl Error {
    /// Whether this error was raised by a single refresh cycle and left
    /// the previous snapshot in place.
    pub fn is_cycle_failure(&self) -> bool {
        matches!(
            self,
            Self::Producer { .. } | Self::Resolve { .. } | Self::Batch { .. }
        )
    }
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}
