// ── Persistence loop ──
//
// Appends the current snapshot as one CSV row per period. Runs on its own
// clock, so a snapshot may be logged twice or skipped entirely depending
// on the two periods.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::{SessionStats, Shutdown};
use crate::error::Error;
use crate::log_file::LogWriter;
use crate::logger::LoggerInner;
use crate::store::Snapshot;

pub(super) struct PersistLoop {
    pub(super) inner: Arc<LoggerInner>,
    pub(super) writer: LogWriter,
    /// Last install number from before this session started.
    pub(super) after_cycle: u64,
    pub(super) shutdown: Arc<Shutdown>,
    pub(super) stats: Arc<SessionStats>,
}

impl PersistLoop {
    /// Run until shutdown, handing the writer back for closing.
    pub(super) fn run(mut self) -> LogWriter {
        let period = self.inner.config.persist_interval;
        debug!(?period, path = %self.writer.path().display(), "persistence loop started");

        while !self.shutdown.is_triggered() {
            let started = Instant::now();

            match self.next_snapshot() {
                Ok(Some(snapshot)) => self.append(&snapshot),
                Ok(None) => break,
                Err(e) => {
                    SessionStats::bump(&self.stats.ready_timeouts);
                    warn!(error = %e, "no snapshot to persist yet");
                }
            }

            if self.shutdown.sleep(period.saturating_sub(started.elapsed())) {
                break;
            }
        }
        debug!("persistence loop stopped");
        self.writer
    }

    /// Wait for this session's first snapshot, then return the current one.
    /// `None` means shutdown arrived first.
    fn next_snapshot(&self) -> Result<Option<Arc<Snapshot>>, Error> {
        let store = &self.inner.store;
        let after = self.after_cycle;
        self.inner
            .gate
            .wait(|| store.has_newer_than(after) || self.shutdown.is_triggered())?;

        if store.has_newer_than(after) {
            Ok(store.current())
        } else {
            Ok(None)
        }
    }

    fn append(&mut self, snapshot: &Snapshot) {
        match self.writer.write_row(snapshot.values()) {
            Ok(()) => SessionStats::bump(&self.stats.rows_written),
            Err(e) => {
                SessionStats::bump(&self.stats.rows_lost);
                warn!(error = %e, cycle = snapshot.cycle(), "failed to append log row");
            }
        }
    }
}
