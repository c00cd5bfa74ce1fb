// ── Refresh loop ──
//
// One cycle: open a batch, call every producer, close the batch, resolve
// placeholders, install the snapshot, notify readers and callbacks. Any
// failure before the install abandons the cycle and keeps the previous
// snapshot current.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, error, warn};

use super::{SessionStats, Shutdown, guarded};
use crate::device::BatchScope;
use crate::error::Error;
use crate::logger::LoggerInner;
use crate::reading::Reading;
use crate::registry::Registry;
use crate::store::Snapshot;

pub(super) struct RefreshLoop {
    pub(super) inner: Arc<LoggerInner>,
    /// Registry as it was when the session started.
    pub(super) producers: Registry,
    pub(super) shutdown: Arc<Shutdown>,
    pub(super) stats: Arc<SessionStats>,
}

impl RefreshLoop {
    pub(super) fn run(self) {
        let period = self.inner.config.refresh_interval;
        debug!(?period, producers = self.producers.len(), "refresh loop started");

        while !self.shutdown.is_triggered() {
            let started = Instant::now();

            match self.cycle() {
                Ok(snapshot) => {
                    SessionStats::bump(&self.stats.refresh_cycles);
                    debug!(cycle = snapshot.cycle(), elapsed = ?started.elapsed(), "snapshot installed");
                    self.notify(&snapshot);
                }
                Err(e) if e.is_cycle_failure() => {
                    SessionStats::bump(&self.stats.refresh_failures);
                    warn!(error = %e, "refresh cycle failed, keeping previous snapshot");
                }
                Err(e) => {
                    SessionStats::bump(&self.stats.refresh_failures);
                    error!(error = %e, "refresh cycle failed unexpectedly");
                }
            }

            if self.shutdown.sleep(period.saturating_sub(started.elapsed())) {
                break;
            }
        }
        debug!("refresh loop stopped");
    }

    fn cycle(&self) -> Result<Arc<Snapshot>, Error> {
        let raw = self.collect()?;

        let mut values = IndexMap::with_capacity(raw.len());
        for (name, reading) in raw {
            let value = guarded(|| reading.resolve()).map_err(|source| Error::Resolve {
                name: name.clone(),
                source,
            })?;
            values.insert(name, value);
        }

        let snapshot = self.inner.store.install(values);
        self.inner.gate.notify_all();
        Ok(snapshot)
    }

    /// Call every producer inside one batch scope.
    fn collect(&self) -> Result<Vec<(String, Reading)>, Error> {
        let scope = BatchScope::open(&*self.inner.client)?;
        // Declared after `scope`, so on an early return the placeholders are
        // dropped before the batch closes.
        let mut raw = Vec::with_capacity(self.producers.len());

        for (name, producer) in self.producers.iter() {
            let reading = guarded(|| producer.call()).map_err(|source| Error::Producer {
                name: name.to_owned(),
                source,
            })?;
            raw.push((name.to_owned(), reading));
        }

        scope.close()?;
        Ok(raw)
    }

    fn notify(&self, snapshot: &Snapshot) {
        // Copy-on-iterate: callbacks added mid-cycle wait for the next one.
        let callbacks = self.inner.callbacks.load_full();
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(e) = guarded(|| callback(snapshot)) {
                SessionStats::bump(&self.stats.callback_failures);
                let e = Error::Callback {
                    index,
                    message: e.to_string(),
                };
                warn!(error = %e, cycle = snapshot.cycle(), "callback failed");
            }
        }
    }
}
