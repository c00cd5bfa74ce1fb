// ── Value registry ──
//
// Ordered name -> producer map. Re-registering a name swaps the producer
// in place; new names append. The `timestamp` producer is always present.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::BoxError;
use crate::reading::Reading;

/// Name of the producer every registry starts with.
pub const TIMESTAMP: &str = "timestamp";

type ProducerFn = dyn Fn() -> Result<Reading, BoxError> + Send + Sync;

/// A zero-argument value producer. Cheap to clone.
#[derive(Clone)]
pub struct Producer(Arc<ProducerFn>);

impl Producer {
    /// Wrap a fallible producer.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Result<Reading, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wrap an infallible producer of plain values.
    pub fn from_value<F, T>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::new(move || Ok(Reading::Scalar(f().into())))
    }

    pub fn call(&self) -> Result<Reading, BoxError> {
        (self.0)()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Producer(..)")
    }
}

/// Wall-clock time as fractional seconds since the Unix epoch.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Ordered mapping from value name to producer.
#[derive(Debug, Clone)]
pub struct Registry {
    producers: IndexMap<String, Producer>,
}

impl Registry {
    pub fn new() -> Self {
        let mut producers = IndexMap::new();
        producers.insert(TIMESTAMP.to_owned(), Producer::from_value(unix_timestamp));
        Self { producers }
    }

    /// Merge producers into the registry.
    ///
    /// Existing names keep their position; new names append in iteration
    /// order.
    pub fn register<I, N>(&mut self, producers: I)
    where
        I: IntoIterator<Item = (N, Producer)>,
        N: Into<String>,
    {
        for (name, producer) in producers {
            // `IndexMap::insert` keeps the slot of an existing key.
            self.producers.insert(name.into(), producer);
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.producers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Producer)> {
        self.producers.iter().map(|(name, p)| (name.as_str(), p))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
