// ── Runtime logger configuration ──
//
// Describes where the log goes and how often each loop runs. The binary
// builds a `LoggerConfig` from its config file and flags; the core never
// reads files itself.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_REFRESH_SECS: f64 = 1.0;
pub const DEFAULT_PERSIST_SECS: f64 = 1.0;
pub const DEFAULT_READY_TIMEOUT_SECS: f64 = 600.0;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for one [`DataLogger`](crate::DataLogger).
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerConfig {
    /// CSV file the persistence loop appends to.
    pub output: PathBuf,
    /// Period of the refresh loop.
    pub refresh_interval: Duration,
    /// Period of the persistence loop.
    pub persist_interval: Duration,
    /// How long readers block waiting for the first snapshot.
    pub ready_timeout: Duration,
    /// Upper bound between predicate re-checks in the readiness gate.
    pub poll_interval: Duration,
}

impl LoggerConfig {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            refresh_interval: Duration::from_secs_f64(DEFAULT_REFRESH_SECS),
            persist_interval: Duration::from_secs_f64(DEFAULT_PERSIST_SECS),
            ready_timeout: Duration::from_secs_f64(DEFAULT_READY_TIMEOUT_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Build a config from float-second intervals, validating each.
    pub fn from_secs(
        output: impl Into<PathBuf>,
        refresh_secs: f64,
        persist_secs: f64,
        ready_timeout_secs: f64,
    ) -> Result<Self, Error> {
        let config = Self {
            refresh_interval: secs_to_duration("refresh_interval", refresh_secs)?,
            persist_interval: secs_to_duration("persist_interval", persist_secs)?,
            ready_timeout: secs_to_duration("ready_timeout", ready_timeout_secs)?,
            ..Self::new(output)
        };
        config.validate()?;
        Ok(config)
    }

    /// Loop periods and the poll interval must be non-zero.
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("refresh_interval", self.refresh_interval),
            ("persist_interval", self.persist_interval),
            ("poll_interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidConfig {
                    field: field.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new("snaplog.csv")
    }
}

/// Convert float seconds to a `Duration`, rejecting negative or
/// non-finite input.
pub fn secs_to_duration(field: &str, secs: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(secs).map_err(|e| Error::InvalidConfig {
        field: field.into(),
        reason: format!("{secs} is not a valid number of seconds ({e})"),
    })
}
