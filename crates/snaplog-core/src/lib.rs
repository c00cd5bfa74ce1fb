//! Periodic snapshot sampling and CSV logging for device/API clients.
//!
//! - **[`DataLogger`]**: central facade. Holds the ordered producer
//!   [`Registry`], the current [`Snapshot`], observer callbacks, and the
//!   [`ReadinessGate`] that blocks readers until the first snapshot exists.
//!
//! - **[`Session`]**: scoped guard returned by
//!   [`DataLogger::session()`]. Opens the log, writes the header, and runs
//!   two threads: the refresh loop (producers -> snapshot -> callbacks) and
//!   the persistence loop (snapshot -> CSV row). Dropping or closing it
//!   stops both loops and closes the log.
//!
//! - **[`Reading`]**: what a producer returns. Scalars, sequences, and
//!   [`Pending`] placeholders handed out by a [`DeviceClient`] in batch
//!   mode; placeholders resolve after the cycle's batch closes.
//!
//! - **[`log_file`]**: the CSV row format, including a reader that parses
//!   a log back into per-session sections.

pub mod config;
pub mod device;
pub mod error;
pub mod gate;
pub mod log_file;
pub mod logger;
pub mod reading;
pub mod registry;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::LoggerConfig;
pub use device::{BatchQueue, BatchScope, DeviceClient, NoBatch};
pub use error::{BoxError, Error};
pub use gate::ReadinessGate;
pub use log_file::{LogSection, LogWriter, read_log};
pub use logger::{Callback, DataLogger};
pub use reading::{Element, Pending, Reading, Resolver, deferred};
pub use registry::{Producer, Registry, TIMESTAMP};
pub use session::{Session, SessionReport};
pub use store::{Snapshot, SnapshotStore};

pub use serde_json::Value;
