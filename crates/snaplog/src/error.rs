//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use snaplog_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Logger ───────────────────────────────────────────────────────
    #[error("Unknown channel '{name}'")]
    #[diagnostic(
        code(snaplog::unknown_channel),
        help("Available channels: {available}")
    )]
    UnknownChannel { name: String, available: String },

    #[error("No snapshot arrived within {seconds:.1}s")]
    #[diagnostic(
        code(snaplog::timeout),
        help("Raise logger.ready_timeout or check that producers succeed (run with -v).")
    )]
    Timeout { seconds: f64 },

    #[error(transparent)]
    #[diagnostic(code(snaplog::logger))]
    Logger(snaplog_core::Error),

    // ── Log files ────────────────────────────────────────────────────
    #[error("Session {index} not found in {path} ({count} recorded)")]
    #[diagnostic(
        code(snaplog::not_found),
        help("Sessions are numbered from 1. Use --all to list every session.")
    )]
    SessionNotFound {
        path: String,
        index: usize,
        count: usize,
    },

    #[error("No sessions recorded in {path}")]
    #[diagnostic(code(snaplog::empty_log))]
    EmptyLog { path: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(snaplog::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(snaplog::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(snaplog::config),
        help("Check the config file (snaplog config path) or SNAPLOG_* variables.")
    )]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(snaplog::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownChannel { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::Config(_) => exit_code::CONFIG,
            Self::SessionNotFound { .. } | Self::EmptyLog { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<snaplog_core::Error> for CliError {
    fn from(err: snaplog_core::Error) -> Self {
        match err {
            snaplog_core::Error::Timeout { waited } => Self::Timeout {
                seconds: waited.as_secs_f64(),
            },
            snaplog_core::Error::InvalidConfig { field, reason } => {
                Self::Validation { field, reason }
            }
            snaplog_core::Error::Io(e) => Self::Io(e),
            other => Self::Logger(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}
