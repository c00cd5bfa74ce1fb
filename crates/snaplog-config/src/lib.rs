//! Configuration for the snaplog binary.
//!
//! TOML file + `SNAPLOG_` environment overrides, loaded through figment
//! and translated to `snaplog_core::LoggerConfig`. The core crate never
//! reads configuration itself.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use snaplog_core::LoggerConfig;
use snaplog_core::config::{
    DEFAULT_PERSIST_SECS, DEFAULT_READY_TIMEOUT_SECS, DEFAULT_REFRESH_SECS,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<snaplog_core::Error> for ConfigError {
    fn from(err: snaplog_core::Error) -> Self {
        match err {
            snaplog_core::Error::InvalidConfig { field, reason } => Self::Validation { field, reason },
            other => Self::Validation {
                field: "logger".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logger: LoggerSection,

    #[serde(default)]
    pub device: DeviceSection,
}

/// `[logger]`: output file and loop timing, in float seconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggerSection {
    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default = "default_refresh")]
    pub refresh_interval: f64,

    #[serde(default = "default_persist")]
    pub persist_interval: f64,

    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: f64,
}

impl Default for LoggerSection {
    fn default() -> Self {
        Self {
            output: default_output(),
            refresh_interval: default_refresh(),
            persist_interval: default_persist(),
            ready_timeout: default_ready_timeout(),
        }
    }
}

fn default_output() -> PathBuf {
    "snaplog.csv".into()
}
fn default_refresh() -> f64 {
    DEFAULT_REFRESH_SECS
}
fn default_persist() -> f64 {
    DEFAULT_PERSIST_SECS
}
fn default_ready_timeout() -> f64 {
    DEFAULT_READY_TIMEOUT_SECS
}

/// `[device]`: settings for the built-in simulated device.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceSection {
    /// Simulated round-trip latency per request batch, in milliseconds.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    /// Channels to sample, in log column order.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            channels: default_channels(),
        }
    }
}

fn default_latency_ms() -> u64 {
    20
}
fn default_channels() -> Vec<String> {
    ["nozzle_temp", "bed_temp", "fan_speed", "position"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// Translate the `[logger]` section, optionally redirecting the output.
    pub fn logger_config(&self, output: Option<&Path>) -> Result<LoggerConfig, ConfigError> {
        let section = &self.logger;
        let output = output.map_or_else(|| section.output.clone(), Path::to_path_buf);
        Ok(LoggerConfig::from_secs(
            output,
            section.refresh_interval,
            section.persist_interval,
            section.ready_timeout,
        )?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "snaplog", "snaplog").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("snaplog");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from defaults, the TOML file, and the environment.
///
/// Environment keys use `__` between section and field, e.g.
/// `SNAPLOG_LOGGER__REFRESH_INTERVAL=0.5`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("SNAPLOG_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path` (or the default path).
pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let cfg = load_config(Some(&jail.directory().join("absent.toml"))).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn file_values_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "snaplog.toml",
                r#"
                [logger]
                output = "runs/today.csv"
                refresh_interval = 0.5

                [device]
                channels = ["bed_temp"]
                "#,
            )?;
            let cfg = load_config(Some(Path::new("snaplog.toml"))).unwrap();

            assert_eq!(cfg.logger.output, PathBuf::from("runs/today.csv"));
            assert!((cfg.logger.refresh_interval - 0.5).abs() < f64::EPSILON);
            assert!((cfg.logger.persist_interval - 1.0).abs() < f64::EPSILON);
            assert_eq!(cfg.device.channels, vec!["bed_temp"]);
            assert_eq!(cfg.device.latency_ms, 20);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("snaplog.toml", "[logger]\npersist_interval = 2.0\n")?;
            jail.set_env("SNAPLOG_LOGGER__PERSIST_INTERVAL", "0.25");
            let cfg = load_config(Some(Path::new("snaplog.toml"))).unwrap();
            assert!((cfg.logger.persist_interval - 0.25).abs() < f64::EPSILON);
            Ok(())
        });
    }

    #[test]
    fn translates_to_logger_config() {
        let cfg = Config::default();
        let logger = cfg.logger_config(Some(Path::new("override.csv"))).unwrap();
        assert_eq!(logger.output, PathBuf::from("override.csv"));
        assert_eq!(logger.refresh_interval, Duration::from_secs(1));
        assert_eq!(logger.ready_timeout, Duration::from_secs(600));
    }

    #[test]
    fn invalid_interval_is_a_validation_error() {
        let mut cfg = Config::default();
        cfg.logger.persist_interval = -1.0;
        let err = cfg.logger_config(None).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Validation { field, .. } if field == "persist_interval"),
            "got: {err:?}"
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested/config.toml");
            let mut cfg = Config::default();
            cfg.device.latency_ms = 5;

            assert_eq!(save_config(&cfg, Some(&path)).unwrap(), path);
            assert_eq!(load_config(Some(&path)).unwrap(), cfg);
            Ok(())
        });
    }
}
