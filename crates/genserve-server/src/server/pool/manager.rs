//! Bounded worker pool for request handling.
//!
//! This module defines the [`WorkerPool`] struct, which manages a set of
//! asynchronous workers responsible for processing [`WorkRequest`]s. It
//! distributes work using round-robin scheduling and supports coordinated
//! shutdown via a shared [`CancellationToken`].
//!
//! Each worker listens on its own bounded [`mpsc::Receiver`] and handles one
//! request at a time, so the pool holds at most `workers * queue_depth` queued
//! requests. What happens when every queue is full is decided by
//! [`SubmitPolicy`].

use crate::server::streaming::request::WorkRequest;
use crate::server::telemetry::increment_pool_rejections;
use core::time::Duration;
use genserve_core::Error;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, mpsc::error::TrySendError, oneshot},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

/// What a submitter experiences when the pool is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SubmitPolicy {
    /// Fail immediately with [`Error::PoolSaturated`]. The submitter never
    /// waits.
    #[default]
    Reject,
    /// Wait for queue capacity on the next worker.
    Block,
}

/// A cooperative pool of asynchronous workers that process [`WorkRequest`]s.
///
/// Workers receive requests over bounded MPSC channels. Work is distributed in
/// round-robin fashion and the pool supports graceful, cancellable shutdown.
pub struct WorkerPool {
    workers: Vec<mpsc::Sender<WorkRequest>>,
    next_worker: AtomicUsize,
    inflight: Arc<AtomicUsize>,
    closing: AtomicBool,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Constructs a new [`WorkerPool`] from initialized worker channels.
    ///
    /// `inflight` must be shared with the workers, which decrement it after
    /// finishing each request.
    pub const fn new(
        workers: Vec<mpsc::Sender<WorkRequest>>,
        inflight: Arc<AtomicUsize>,
        shutdown_token: CancellationToken,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            inflight,
            closing: AtomicBool::new(false),
            shutdown_token,
            shutdown_timeout,
        }
    }

    /// Requests accepted by the pool and not yet finished by a worker.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    /// Returns the index of the next worker to receive work (round-robin).
    ///
    /// Uses a relaxed atomic increment to minimize contention.
    pub fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Counts one request as in flight, unless shutdown has begun.
    ///
    /// The count is taken before `closing` is read, and `shutdown` sets
    /// `closing` before reading the count, so an admitted request is always
    /// seen by the drain.
    fn admit(&self) -> Result<(), Error> {
        self.inflight.fetch_add(1, Ordering::SeqCst);

        if self.closing.load(Ordering::SeqCst) || self.shutdown_token.is_cancelled() {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ServiceShutdown);
        }
        if self.workers.is_empty() {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ChannelError {
                context: "Worker pool has no workers".to_string(),
            });
        }
        Ok(())
    }

    /// Submits according to `policy`.
    ///
    /// # Errors
    ///
    /// See [`Self::try_send_to_next_worker`] and [`Self::send_to_next_worker`].
    pub async fn submit(&self, policy: SubmitPolicy, request: WorkRequest) -> Result<(), Error> {
        match policy {
            SubmitPolicy::Reject => self.try_send_to_next_worker(request),
            SubmitPolicy::Block => self.send_to_next_worker(request).await,
        }
    }

    /// Sends a [`WorkRequest`] to the next worker, waiting for queue capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service is shutting down.
    /// - The worker's channel is closed.
    pub async fn send_to_next_worker(&self, request: WorkRequest) -> Result<(), Error> {
        self.admit()?;

        let worker_idx = self.next_worker_index();
        let worker = &self.workers[worker_idx];

        match worker.send(request).await {
            Ok(()) => Ok(()),
            Err(_) => {
                self.inflight.fetch_sub(1, Ordering::AcqRel);
                Err(Error::ChannelError {
                    context: format!("Worker {worker_idx} channel closed"),
                })
            }
        }
    }

    /// Offers a [`WorkRequest`] to each worker once, starting at the
    /// round-robin index, without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service is shutting down.
    /// - Every worker queue is full ([`Error::PoolSaturated`]).
    /// - A worker's channel is closed.
    pub fn try_send_to_next_worker(&self, request: WorkRequest) -> Result<(), Error> {
        self.admit()?;

        let start = self.next_worker_index();
        let mut request = request;

        for offset in 0..self.workers.len() {
            let worker_idx = (start + offset) % self.workers.len();
            match self.workers[worker_idx].try_send(request) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => request = returned,
                Err(TrySendError::Closed(_)) => {
                    self.inflight.fetch_sub(1, Ordering::AcqRel);
                    return Err(Error::ChannelError {
                        context: format!("Worker {worker_idx} channel closed"),
                    });
                }
            }
        }
        self.inflight.fetch_sub(1, Ordering::AcqRel);

        #[cfg(feature = "tracing")]
        tracing::warn!("All {} worker queues full, rejecting request", self.workers.len());
        increment_pool_rejections();
        Err(Error::PoolSaturated)
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Refuses new work.
    /// - Waits up to `shutdown_timeout` for in-flight requests to drain.
    /// - Cancels the shared [`CancellationToken`].
    /// - Sends a [`WorkRequest::Shutdown`] to each worker and waits (up to 3
    ///   seconds per worker) for acknowledgements.
    pub async fn shutdown(&self) -> Result<(), Error> {
        // === Phase 0: Stop accepting new requests ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new requests");
        self.closing.store(true, Ordering::SeqCst);

        // === Phase 1: Wait for in-flight requests to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight requests ({} active)", self.inflight());
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight requests drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} requests still active)",
                    self.inflight()
                );
            }
        }

        // === Phase 2: Cancel any remaining work ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();

        // === Phase 3: Notify workers to shut down ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Notifying all workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.workers.len());

        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(_e) = worker.send(WorkRequest::Shutdown { response: tx }).await {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to send shutdown to worker {i}: {_e}");
            } else {
                shutdown_handles.push((i, rx));
            }
        }

        let timeout_futures = shutdown_handles.into_iter().map(|(_i, rx)| async move {
            match timeout(Duration::from_secs(3), rx).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_i} shutdown acknowledged");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {_i} returned error: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Worker {_i} shutdown timed out");
                }
            }
        });

        futures::future::join_all(timeout_futures).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        Ok(())
    }
}
