// ── DataLogger facade ──
//
// Owns the registry, callbacks, snapshot store, and readiness gate.
// Cheaply cloneable; the session threads hold clones of the inner state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::config::LoggerConfig;
use crate::device::DeviceClient;
use crate::error::{BoxError, Error};
use crate::gate::ReadinessGate;
use crate::reading::Reading;
use crate::registry::{Producer, Registry};
use crate::session::Session;
use crate::store::{Snapshot, SnapshotStore};

/// Observer invoked on the refresh thread after every installed snapshot.
pub type Callback = Arc<dyn Fn(&Snapshot) -> Result<(), BoxError> + Send + Sync>;

/// Periodic sampler and CSV logger for a device client.
///
/// Register producers, then open a [`Session`] to start the refresh and
/// persistence loops. Readers ([`get`](Self::get), [`get_all`](Self::get_all))
/// block until the first snapshot exists, bounded by the configured
/// readiness timeout.
#[derive(Clone)]
pub struct DataLogger {
    pub(crate) inner: Arc<LoggerInner>,
}

pub(crate) struct LoggerInner {
    pub(crate) config: LoggerConfig,
    pub(crate) client: Arc<dyn DeviceClient>,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) callbacks: ArcSwap<Vec<Callback>>,
    pub(crate) store: SnapshotStore,
    pub(crate) gate: ReadinessGate,
    /// Set while a session is running.
    pub(crate) active: AtomicBool,
}

impl DataLogger {
    pub fn new<C: DeviceClient>(client: Arc<C>, config: LoggerConfig) -> Self {
        let gate = ReadinessGate::new(config.ready_timeout, config.poll_interval);
        Self {
            inner: Arc::new(LoggerInner {
                config,
                client,
                registry: RwLock::new(Registry::new()),
                callbacks: ArcSwap::from_pointee(Vec::new()),
                store: SnapshotStore::new(),
                gate,
                active: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Merge producers into the registry.
    ///
    /// Rejected with [`Error::SessionActive`] while a session runs, since
    /// the log header is fixed when the session starts.
    pub fn register<I, N>(&self, producers: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (N, Producer)>,
        N: Into<String>,
    {
        if self.is_running() {
            return Err(Error::SessionActive);
        }
        self.inner.registry.write().register(producers);
        Ok(())
    }

    /// Register a single fallible producer.
    pub fn register_fn<F>(&self, name: impl Into<String>, f: F) -> Result<(), Error>
    where
        F: Fn() -> Result<Reading, BoxError> + Send + Sync + 'static,
    {
        let name: String = name.into();
        self.register([(name, Producer::new(f))])
    }

    /// Registered names in log column order.
    pub fn names(&self) -> Vec<String> {
        self.inner.registry.read().names()
    }

    /// Append an observer. Callbacks added during a session take effect
    /// from the next refresh cycle.
    pub fn add_callback<F>(&self, f: F)
    where
        F: Fn(&Snapshot) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(f);
        self.inner.callbacks.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&callback));
            next
        });
    }

    // ── Readers ──────────────────────────────────────────────────────

    /// The current snapshot, blocking until one exists.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, Error> {
        let store = &self.inner.store;
        self.inner.gate.wait(|| store.is_ready())?;
        store.current().ok_or(Error::Timeout {
            waited: self.inner.gate.timeout(),
        })
    }

    /// The current snapshot without waiting.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.inner.store.current()
    }

    pub fn get(&self, name: &str) -> Result<Value, Error> {
        let snapshot = self.snapshot()?;
        lookup(&snapshot, name)
    }

    /// Values for `names`, all from the same snapshot. Duplicated names
    /// yield duplicated values.
    pub fn get_many(&self, names: &[&str]) -> Result<Vec<Value>, Error> {
        let snapshot = self.snapshot()?;
        names.iter().map(|name| lookup(&snapshot, name)).collect()
    }

    /// Every current value in registry order.
    pub fn get_all(&self) -> Result<Vec<Value>, Error> {
        Ok(self.snapshot()?.values().cloned().collect())
    }

    pub fn readiness_gate(&self) -> &ReadinessGate {
        &self.inner.gate
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Open the log and start both loops. Dropping or closing the returned
    /// guard stops them and closes the log.
    pub fn session(&self) -> Result<Session, Error> {
        Session::start(self)
    }

    /// Run `f` inside a session, tearing the session down afterwards
    /// whatever `f` returns.
    ///
    /// An error from `f` takes precedence over a teardown error, which is
    /// then only logged.
    pub fn run<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Self) -> Result<T, Error>,
    {
        let session = self.session()?;
        let result = f(self);
        match (result, session.close()) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(teardown) = closed {
                    tracing::error!(error = %teardown, "session teardown failed after caller error");
                }
                Err(e)
            }
        }
    }
}

fn lookup(snapshot: &Snapshot, name: &str) -> Result<Value, Error> {
    snapshot
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownName { name: name.into() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::device::NoBatch;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn logger(timeout_ms: u64) -> DataLogger {
        let mut config = LoggerConfig::new("unused.csv");
        config.ready_timeout = Duration::from_millis(timeout_ms);
        DataLogger::new(Arc::new(NoBatch), config)
    }

    fn install(logger: &DataLogger, pairs: &[(&str, Value)]) {
        let values: IndexMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect();
        logger.inner.store.install(values);
    }

    #[test]
    fn readers_time_out_before_first_snapshot() {
        let logger = logger(20);
        assert!(matches!(logger.get_all(), Err(Error::Timeout { .. })));
        assert!(matches!(logger.get("timestamp"), Err(Error::Timeout { .. })));
        assert!(logger.latest().is_none());
    }

    #[test]
    fn get_reads_current_snapshot() {
        let logger = logger(20);
        install(&logger, &[("timestamp", json!(1000.0)), ("x", json!(5))]);

        assert_eq!(logger.get("x").unwrap(), json!(5));
        assert_eq!(logger.get_all().unwrap(), vec![json!(1000.0), json!(5)]);
    }

    #[test]
    fn get_many_preserves_order_and_duplicates() {
        let logger = logger(20);
        install(&logger, &[("a", json!(1)), ("b", json!(2))]);

        assert_eq!(
            logger.get_many(&["b", "a", "b"]).unwrap(),
            vec![json!(2), json!(1), json!(2)]
        );
    }

    #[test]
    fn unknown_name_is_an_error_not_a_default() {
        let logger = logger(20);
        install(&logger, &[("a", json!(1))]);

        let err = logger.get("missing").unwrap_err();
        assert!(matches!(err, Error::UnknownName { ref name } if name == "missing"));
        assert!(logger.get_many(&["a", "missing"]).is_err());
    }

    #[test]
    fn registration_keeps_timestamp_first() {
        let logger = logger(20);
        logger
            .register([("x", Producer::from_value(|| 1)), ("y", Producer::from_value(|| 2))])
            .unwrap();
        logger.register_fn("x", || Ok(Reading::scalar(3))).unwrap();
        assert_eq!(logger.names(), vec!["timestamp", "x", "y"]);
    }

    #[test]
    fn callbacks_append_in_order() {
        let logger = logger(20);
        logger.add_callback(|_| Ok(()));
        logger.add_callback(|_| Err("nope".into()));
        assert_eq!(logger.inner.callbacks.load().len(), 2);
    }
}
