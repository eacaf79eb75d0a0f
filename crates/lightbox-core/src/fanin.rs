//! Fan-in completion counter.
//!
//! A [`FanInCounter`] is created with the number of outstanding
//! sub-operations. Each worker reports exactly once through
//! [`decrement`](FanInCounter::decrement); the completion handler runs exactly
//! once, on the N-th report, with every error collected along the way.
//!
//! The counter knows nothing about what it counts. The pipeline uses it for
//! derived assets within an item, the collection runner for items within a
//! collection, and the site runner for collections within a site.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Outcome handed to the completion handler.
#[derive(Debug)]
pub struct FanInSummary<E> {
    /// Number of sub-operations that were awaited
    pub total: usize,
    /// Errors in the order they were reported
    pub errors: Vec<E>,
}

impl<E> FanInSummary<E> {
    /// The first error reported, if any.
    pub fn first_error(&self) -> Option<&E> {
        self.errors.first()
    }

    pub fn into_first_error(self) -> Option<E> {
        self.errors.into_iter().next()
    }

    pub fn failures(&self) -> usize {
        self.errors.len()
    }

    pub fn succeeded(&self) -> usize {
        self.total - self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

type Handler<E> = Box<dyn FnOnce(FanInSummary<E>) + Send>;

struct State<E> {
    remaining: usize,
    errors: Vec<E>,
    handler: Option<Handler<E>>,
}

/// Invokes a completion handler once all N sub-operations have reported.
///
/// Cloning yields another handle to the same counter, so each worker can own one.
pub struct FanInCounter<E> {
    total: usize,
    state: Arc<Mutex<State<E>>>,
}

impl<E> Clone for FanInCounter<E> {
    fn clone(&self) -> Self {
        Self {
            total: self.total,
            state: Arc::clone(&self.state),
        }
    }
}

impl<E: Send + 'static> FanInCounter<E> {
    /// Create a counter expecting `total` reports.
    ///
    /// With `total == 0` the handler runs immediately.
    pub fn new<F>(total: usize, on_complete: F) -> Self
    where
        F: FnOnce(FanInSummary<E>) + Send + 'static,
    {
        let counter = Self {
            total,
            state: Arc::new(Mutex::new(State {
                remaining: total,
                errors: Vec::new(),
                handler: Some(Box::new(on_complete)),
            })),
        };
        if total == 0 {
            counter.finish(Vec::new());
        }
        counter
    }

    /// Create a counter whose completion is delivered on a oneshot channel.
    pub fn with_signal(total: usize) -> (Self, oneshot::Receiver<FanInSummary<E>>) {
        let (tx, rx) = oneshot::channel();
        let counter = Self::new(total, move |summary| {
            let _ = tx.send(summary);
        });
        (counter, rx)
    }

    /// Report one finished sub-operation.
    ///
    /// Returns `true` for the report that completed the fan-in. Reports beyond
    /// the expected count are ignored.
    pub fn decrement(&self, outcome: Result<(), E>) -> bool {
        let errors = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.remaining == 0 {
                tracing::warn!(total = self.total, "fan-in counter decremented after completion");
                return false;
            }
            state.remaining -= 1;
            if let Err(e) = outcome {
                state.errors.push(e);
            }
            if state.remaining > 0 {
                return false;
            }
            std::mem::take(&mut state.errors)
        };
        self.finish(errors);
        true
    }

    /// Reports still outstanding.
    pub fn remaining(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn finish(&self, errors: Vec<E>) {
        let handler = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handler
            .take();
        // Runs outside the lock so the handler may touch the counter.
        if let Some(handler) = handler {
            handler(FanInSummary {
                total: self.total,
                errors,
            });
        }
    }
}
