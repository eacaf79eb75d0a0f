//! Bounded-concurrency work queue with FIFO admission.
//!
//! A queue accepts any number of jobs but runs at most `limit` of them at the
//! same time. Jobs beyond the ceiling wait in a pending list and are admitted
//! strictly in submission order as running jobs finish. `submit` never blocks
//! and never rejects: the queue is bounded in concurrency, not in length.
//!
//! Lightbox runs two independent queues per [`Scheduler`](crate::Scheduler):
//! one for external tool invocations and one for file-system work.

use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::PipelineError;

type Job = BoxFuture<'static, ()>;

/// Counters describing a queue's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs accepted by `submit`
    pub submitted: u64,
    /// Jobs that finished (including ones that panicked)
    pub completed: u64,
    /// Highest number of jobs observed running at once
    pub peak_running: usize,
}

struct QueueState {
    pending: VecDeque<Job>,
    running: usize,
    stats: QueueStats,
}

struct Inner {
    name: String,
    limit: usize,
    state: Mutex<QueueState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move jobs from the head of the pending list into the running set.
    fn admit(&self, state: &mut QueueState) -> Vec<Job> {
        let mut admitted = Vec::new();
        while state.running < self.limit {
            let Some(job) = state.pending.pop_front() else {
                break;
            };
            state.running += 1;
            state.stats.peak_running = state.stats.peak_running.max(state.running);
            admitted.push(job);
        }
        admitted
    }

    fn launch(self: &Arc<Self>, job: Job) {
        let guard = RunningGuard {
            inner: Arc::clone(self),
        };
        tokio::spawn(async move {
            let _guard = guard;
            job.await;
        });
    }
}

/// Releases a running slot when a job finishes, even if it panicked.
struct RunningGuard {
    inner: Arc<Inner>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let next = {
            let mut state = self.inner.lock();
            state.running -= 1;
            state.stats.completed += 1;
            self.inner.admit(&mut state)
        };
        for job in next {
            self.inner.launch(job);
        }
    }
}

/// A work queue that runs at most `limit` jobs concurrently.
///
/// Cloning is cheap and yields a handle to the same queue.
#[derive(Clone)]
pub struct BoundedWorkQueue {
    inner: Arc<Inner>,
}

impl BoundedWorkQueue {
    /// Create a queue. A `limit` of zero is treated as one.
    pub fn new(name: impl Into<String>, limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                limit: limit.max(1),
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: 0,
                    stats: QueueStats::default(),
                }),
            }),
        }
    }

    /// Submit a zero-argument async job.
    ///
    /// The job is not invoked until it is admitted. Must be called from within
    /// a tokio runtime. The returned handle resolves to the job's output.
    pub fn submit<F, Fut, T>(&self, job: F) -> JobHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let wrapped: Job = Box::pin(async move {
            let output = job().await;
            // The submitter may have stopped waiting; that's fine.
            let _ = tx.send(output);
        });

        let admitted = {
            let mut state = self.inner.lock();
            state.stats.submitted += 1;
            state.pending.push_back(wrapped);
            self.inner.admit(&mut state)
        };
        for job in admitted {
            self.inner.launch(job);
        }

        tracing::trace!(queue = %self.inner.name, "job submitted");
        JobHandle {
            rx,
            queue: self.inner.name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Concurrency ceiling.
    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Jobs currently running.
    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    /// Jobs waiting for admission.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }
}

impl std::fmt::Debug for BoundedWorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("BoundedWorkQueue")
            .field("name", &self.inner.name)
            .field("limit", &self.inner.limit)
            .field("running", &state.running)
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Future resolving to the output of a submitted job.
///
/// Resolves to [`PipelineError::JobDropped`] if the job panicked.
pub struct JobHandle<T> {
    rx: oneshot::Receiver<T>,
    queue: String,
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, PipelineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        Pin::new(&mut this.rx).poll(cx).map(|res| {
            res.map_err(|_| PipelineError::JobDropped {
                queue: this.queue.clone(),
            })
        })
    }
}
