// ── Producer return values and deferred resolution ──
//
// A producer hands back either a ready value, a sequence of ready and
// pending elements, or a single pending placeholder issued by a device
// client in batch mode. Resolution turns all three into a plain `Value`.

use std::fmt;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::BoxError;

// ── Reading ──────────────────────────────────────────────────────────

/// Raw output of one producer call, before resolution.
#[derive(Debug)]
pub enum Reading {
    /// A value that is already available.
    Scalar(Value),
    /// An ordered sequence; pending elements are resolved in place.
    Sequence(Vec<Element>),
    /// A value the device client will deliver when its batch completes.
    Pending(Pending),
}

/// One element of a [`Reading::Sequence`].
#[derive(Debug)]
pub enum Element {
    Ready(Value),
    Pending(Pending),
}

impl Reading {
    /// Wrap anything convertible into a JSON value.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    /// Build a sequence reading from ready values and placeholders.
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Number of placeholders that still need resolving.
    pub fn pending_count(&self) -> usize {
        match self {
            Self::Scalar(_) => 0,
            Self::Pending(_) => 1,
            Self::Sequence(items) => items
                .iter()
                .filter(|e| matches!(e, Element::Pending(_)))
                .count(),
        }
    }

    /// Resolve every placeholder, blocking on each in order.
    ///
    /// Sequences keep their order and length; ready elements pass through
    /// untouched. Must run on a plain thread, not inside an async runtime.
    pub fn resolve(self) -> Result<Value, BoxError> {
        match self {
            Self::Scalar(value) => Ok(value),
            Self::Pending(pending) => pending.resolve(),
            Self::Sequence(items) => items
                .into_iter()
                .map(Element::resolve)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

impl Element {
    pub fn resolve(self) -> Result<Value, BoxError> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Pending(pending) => pending.resolve(),
        }
    }
}

impl From<Value> for Reading {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<Pending> for Reading {
    fn from(pending: Pending) -> Self {
        Self::Pending(pending)
    }
}

impl From<Vec<Element>> for Reading {
    fn from(items: Vec<Element>) -> Self {
        Self::Sequence(items)
    }
}

impl From<Element> for Reading {
    fn from(element: Element) -> Self {
        match element {
            Element::Ready(value) => Self::Scalar(value),
            Element::Pending(pending) => Self::Pending(pending),
        }
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl From<Pending> for Element {
    fn from(pending: Pending) -> Self {
        Self::Pending(pending)
    }
}

// ── Pending placeholders ─────────────────────────────────────────────

type Delivery = Result<Value, BoxError>;

/// Handle for a value that is not available yet.
///
/// Consumed by [`resolve`](Self::resolve), so a placeholder can only be
/// resolved once and never outlives the refresh cycle that produced it.
pub struct Pending {
    source: Source,
}

enum Source {
    Channel(oneshot::Receiver<Delivery>),
    Thunk(Box<dyn FnOnce() -> Delivery + Send>),
}

impl Pending {
    /// A placeholder whose value is computed on resolution.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Value, BoxError> + Send + 'static,
    {
        Self {
            source: Source::Thunk(Box::new(f)),
        }
    }

    /// Block until the value is delivered.
    ///
    /// Fails if the issuing batch was dropped without delivering a result.
    pub fn resolve(self) -> Result<Value, BoxError> {
        match self.source {
            Source::Thunk(f) => f(),
            Source::Channel(rx) => rx
                .blocking_recv()
                .map_err(|_| BoxError::from("batch closed before the value was delivered"))?,
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Channel(_) => "channel",
            Source::Thunk(_) => "thunk",
        };
        f.debug_struct("Pending").field("source", &kind).finish()
    }
}

/// Device-side half of a placeholder: delivers the value once the batched
/// request has completed.
#[derive(Debug)]
pub struct Resolver {
    tx: oneshot::Sender<Delivery>,
}

impl Resolver {
    pub fn fulfill(self, value: impl Into<Value>) {
        self.complete(Ok(value.into()));
    }

    pub fn fail(self, error: impl Into<BoxError>) {
        self.complete(Err(error.into()));
    }

    pub fn complete(self, result: Result<Value, BoxError>) {
        // The placeholder may already be gone if its cycle was abandoned.
        let _ = self.tx.send(result);
    }
}

/// Create a linked resolver/placeholder pair for a batched request.
pub fn deferred() -> (Resolver, Pending) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver { tx },
        Pending {
            source: Source::Channel(rx),
        },
    )
}
