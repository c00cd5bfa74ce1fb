// ── Logging session ──
//
// Scoped lifetime of the refresh and persistence loops. Starting a
// session opens the log, writes the header, and spawns both threads;
// closing (or dropping) it stops them, joins them, and closes the log.

mod persist;
mod refresh;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{error, info};

use crate::error::{BoxError, Error, panic_message};
use crate::log_file::LogWriter;
use crate::logger::DataLogger;

use self::persist::PersistLoop;
use self::refresh::RefreshLoop;

// ── Shutdown signal ──────────────────────────────────────────────────

/// Shared "alive" flag with an interruptible sleep.
#[derive(Debug, Default)]
pub(crate) struct Shutdown {
    triggered: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Shutdown {
    pub(crate) fn trigger(&self) {
        self.triggered.store(true, Ordering::Release);
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Sleep up to `period`, waking early on shutdown. Returns whether
    /// shutdown has been triggered.
    pub(crate) fn sleep(&self, period: Duration) -> bool {
        if period.is_zero() {
            return self.is_triggered();
        }
        let mut guard = self.lock.lock();
        self.cond
            .wait_while_for(&mut guard, |_| !self.is_triggered(), period);
        self.is_triggered()
    }
}

// ── Stats ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct SessionStats {
    pub(crate) refresh_cycles: AtomicU64,
    pub(crate) refresh_failures: AtomicU64,
    pub(crate) callback_failures: AtomicU64,
    pub(crate) rows_written: AtomicU64,
    pub(crate) rows_lost: AtomicU64,
    pub(crate) ready_timeouts: AtomicU64,
}

impl SessionStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self, elapsed: Duration) -> SessionReport {
        SessionReport {
            refresh_cycles: self.refresh_cycles.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_lost: self.rows_lost.load(Ordering::Relaxed),
            ready_timeouts: self.ready_timeouts.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Counters describing what a session did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Refresh cycles that installed a snapshot.
    pub refresh_cycles: u64,
    /// Refresh cycles abandoned by a producer, resolution, or batch error.
    pub refresh_failures: u64,
    pub callback_failures: u64,
    pub rows_written: u64,
    /// Rows whose write failed.
    pub rows_lost: u64,
    /// Persistence cycles that gave up waiting for a snapshot.
    pub ready_timeouts: u64,
    pub elapsed: Duration,
}

/// Run caller code, turning a panic into an error.
pub(crate) fn guarded<T, F>(f: F) -> Result<T, BoxError>
where
    F: FnOnce() -> Result<T, BoxError>,
{
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(format!("panicked: {}", panic_message(payload.as_ref())).into()))
}

// ── Session ──────────────────────────────────────────────────────────

/// Guard for a running session.
///
/// Teardown runs exactly once, either through [`close`](Self::close),
/// which reports errors, or on drop, which logs them.
pub struct Session {
    logger: DataLogger,
    header: Vec<String>,
    shutdown: Arc<Shutdown>,
    stats: Arc<SessionStats>,
    refresh: Option<JoinHandle<()>>,
    persist: Option<JoinHandle<LogWriter>>,
    started: Instant,
    closed: bool,
}

impl Session {
    pub(crate) fn start(logger: &DataLogger) -> Result<Self, Error> {
        logger.inner.config.validate()?;
        if logger
            .inner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::SessionActive);
        }

        let started = Self::spawn(logger);
        if started.is_err() {
            logger.inner.active.store(false, Ordering::Release);
        }
        started
    }

    fn spawn(logger: &DataLogger) -> Result<Self, Error> {
        let inner = &logger.inner;
        let producers = inner.registry.read().clone();
        let header = producers.names();

        let mut writer = LogWriter::open_append(&inner.config.output)?;
        writer.write_header(&header)?;

        let shutdown = Arc::new(Shutdown::default());
        let stats = Arc::new(SessionStats::default());
        // Rows are only written from snapshots taken in this session.
        let first_cycle = inner.store.installs();

        let refresh = RefreshLoop {
            inner: Arc::clone(inner),
            producers,
            shutdown: Arc::clone(&shutdown),
            stats: Arc::clone(&stats),
        };
        let refresh = thread::Builder::new()
            .name("snaplog-refresh".into())
            .spawn(move || refresh.run())?;

        let persist = PersistLoop {
            inner: Arc::clone(inner),
            writer,
            after_cycle: first_cycle,
            shutdown: Arc::clone(&shutdown),
            stats: Arc::clone(&stats),
        };
        let persist = match thread::Builder::new()
            .name("snaplog-persist".into())
            .spawn(move || persist.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger();
                let _ = refresh.join();
                return Err(e.into());
            }
        };

        info!(
            output = %inner.config.output.display(),
            columns = header.len(),
            "logging session started"
        );

        Ok(Self {
            logger: logger.clone(),
            header,
            shutdown,
            stats,
            refresh: Some(refresh),
            persist: Some(persist),
            started: Instant::now(),
            closed: false,
        })
    }

    /// Column names written as this session's header row.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Counters so far.
    pub fn report(&self) -> SessionReport {
        self.stats.report(self.started.elapsed())
    }

    /// Stop both loops, join them, and close the log.
    pub fn close(mut self) -> Result<SessionReport, Error> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<SessionReport, Error> {
        self.closed = true;
        let inner = &self.logger.inner;

        self.shutdown.trigger();
        // Wake a persistence loop blocked on the readiness gate.
        inner.gate.notify_all();

        let refreshed = match self.refresh.take().map(JoinHandle::join) {
            Some(Err(_)) => Err(Error::ThreadPanicked { loop_name: "refresh" }),
            _ => Ok(()),
        };
        let closed = match self.persist.take().map(JoinHandle::join) {
            Some(Ok(writer)) => writer.close(),
            Some(Err(_)) => Err(Error::ThreadPanicked { loop_name: "persistence" }),
            None => Ok(()),
        };

        inner.active.store(false, Ordering::Release);

        let report = self.report();
        info!(
            cycles = report.refresh_cycles,
            failures = report.refresh_failures,
            rows = report.rows_written,
            "logging session stopped"
        );

        refreshed?;
        closed?;
        Ok(report)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.teardown() {
            error!(error = %e, "logging session teardown failed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("header", &self.header)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
