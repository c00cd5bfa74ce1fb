// ── Device client capability ──
//
// The logger never talks to a device directly; producers capture whatever
// client they need. The logger only brackets each refresh cycle in a
// batch scope so a client can coalesce the cycle's requests into fewer
// round trips.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use crate::error::{BoxError, Error};
use crate::reading::{Pending, Resolver, deferred};

/// Batch hooks a device client may implement.
///
/// While a batch is open the client may answer calls with
/// [`Pending`] placeholders; `end_batch` dispatches the deferred work and
/// delivers every placeholder's value. Both hooks default to no-ops.
pub trait DeviceClient: Send + Sync + 'static {
    fn begin_batch(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn end_batch(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<T: DeviceClient + ?Sized> DeviceClient for Arc<T> {
    fn begin_batch(&self) -> Result<(), BoxError> {
        (**self).begin_batch()
    }

    fn end_batch(&self) -> Result<(), BoxError> {
        (**self).end_batch()
    }
}

/// A client without batch support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBatch;

impl DeviceClient for NoBatch {}

// ── BatchScope ───────────────────────────────────────────────────────

/// An open batch on a device client. Closes on drop if not closed
/// explicitly, so a failing producer cannot leave the batch open.
pub struct BatchScope<'a> {
    client: &'a dyn DeviceClient,
    open: bool,
}

impl<'a> BatchScope<'a> {
    pub fn open(client: &'a dyn DeviceClient) -> Result<Self, Error> {
        client
            .begin_batch()
            .map_err(|source| Error::Batch { source })?;
        Ok(Self { client, open: true })
    }

    /// Close the batch, dispatching any deferred requests.
    pub fn close(mut self) -> Result<(), Error> {
        self.open = false;
        self.client
            .end_batch()
            .map_err(|source| Error::Batch { source })
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.client.end_batch() {
                warn!(error = %e, "closing abandoned batch failed");
            }
        }
    }
}

// ── BatchQueue ───────────────────────────────────────────────────────

/// Helper for device clients: queues requests while a batch is open and
/// fulfills their placeholders from one dispatch when it closes.
#[derive(Debug)]
pub struct BatchQueue<R> {
    state: Mutex<QueueState<R>>,
}

#[derive(Debug)]
struct QueueState<R> {
    open: bool,
    queued: Vec<(R, Resolver)>,
}

impl<R> BatchQueue<R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                open: false,
                queued: Vec::new(),
            }),
        }
    }

    /// Start collecting requests. Fails if a batch is already open.
    pub fn begin(&self) -> Result<(), BoxError> {
        let mut state = self.state.lock();
        if state.open {
            return Err("batch already open".into());
        }
        state.open = true;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Queue `request` if a batch is open, returning its placeholder.
    /// Returns the request back when no batch is open.
    pub fn enqueue(&self, request: R) -> Result<Pending, R> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(request);
        }
        let (resolver, pending) = deferred();
        state.queued.push((request, resolver));
        Ok(pending)
    }

    /// Close the batch and dispatch every queued request at once.
    ///
    /// `dispatch` must return one value per request, in order. On failure
    /// every placeholder receives the error text.
    pub fn finish<F>(&self, dispatch: F) -> Result<usize, BoxError>
    where
        F: FnOnce(Vec<R>) -> Result<Vec<Value>, BoxError>,
    {
        let queued = {
            let mut state = self.state.lock();
            state.open = false;
            std::mem::take(&mut state.queued)
        };
        if queued.is_empty() {
            return Ok(0);
        }

        let count = queued.len();
        let (requests, resolvers): (Vec<R>, Vec<Resolver>) = queued.into_iter().unzip();
        let result = dispatch(requests).and_then(|values| {
            if values.len() == count {
                Ok(values)
            } else {
                Err(format!("batch returned {} values for {count} requests", values.len()).into())
            }
        });

        match result {
            Ok(values) => {
                for (resolver, value) in resolvers.into_iter().zip(values) {
                    resolver.fulfill(value);
                }
                Ok(count)
            }
            Err(e) => {
                let message = e.to_string();
                for resolver in resolvers {
                    resolver.fail(message.clone());
                }
                Err(e)
            }
        }
    }
}

impl<R> Default for BatchQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}
