//! Ingress side of a content channel.
//!
//! This module defines [`ContentService`], the boundary between a transport
//! and the worker pool. It owns the capability checks for the channel
//! (start, stop, publish) and never resolves a request on the ingress task:
//! every accepted request is handed to a worker.
//!
//! ## Responsibilities
//!
//! - Spawn the worker pool, one [`worker_loop`] per worker.
//! - Drop requests outside the subscription prefix before queueing them.
//! - Submit the rest according to the configured [`SubmitPolicy`].
//! - Gate publishing and shutdown through the [`Policy`].

use super::{config::PoolOptions, handler::RequestHandler};
use crate::server::{
    face::Face,
    pool::{
        manager::{SubmitPolicy, WorkerPool},
        worker::worker_loop,
    },
    streaming::request::WorkRequest,
    telemetry::increment_parse_drops,
};
use genserve_core::{Action, Error, Generation, Interest, Policy, Result};
#[cfg(test)]
use genserve_core::GenerationCache;
use portable_atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A running content channel: request handler plus worker pool.
pub struct ContentService<M> {
    handler: Arc<RequestHandler<M>>,
    worker_pool: Arc<WorkerPool>,
    policy: Arc<Policy>,
    submit_policy: SubmitPolicy,
}

impl<M> Clone for ContentService<M> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            worker_pool: Arc::clone(&self.worker_pool),
            policy: Arc::clone(&self.policy),
            submit_policy: self.submit_policy,
        }
    }
}

impl<M> ContentService<M>
where
    M: Send + Sync + 'static,
{
    /// Checks that `subject` may start and serve the channel, then spawns the
    /// worker pool.
    ///
    /// Messages computed by the handler's lazy-latest provider are published
    /// as `subject`, so they need `Publish` as well.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] if `subject` lacks `Start` or `Serve` on
    ///   the channel prefix.
    /// - [`Error::InvalidConfig`] for an invalid channel or pool configuration.
    pub fn start(
        handler: RequestHandler<M>,
        options: PoolOptions,
        policy: Arc<Policy>,
        subject: &str,
    ) -> Result<Self> {
        let prefix = &handler.config().prefix;
        policy.check(subject, prefix, Action::Start)?;
        policy.check(subject, prefix, Action::Serve)?;
        handler.config().validate()?;

        if options.num_workers == 0 || options.queue_depth == 0 {
            return Err(Error::InvalidConfig {
                reason: "worker count and queue depth must be greater than 0".to_string(),
            });
        }

        let handler = Arc::new(handler.with_publish_gate(Arc::clone(&policy), subject));
        let inflight = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(options.num_workers);

        for worker_id in 0..options.num_workers {
            let (tx, rx) = mpsc::channel(options.queue_depth);
            workers.push(tx);
            tokio::spawn(worker_loop(
                worker_id,
                rx,
                Arc::clone(&handler),
                Arc::clone(&inflight),
            ));
        }

        let worker_pool = WorkerPool::new(
            workers,
            inflight,
            CancellationToken::new(),
            options.shutdown_timeout,
        );

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Serving {} with {} workers",
            handler.config().prefix,
            options.num_workers
        );

        Ok(Self {
            handler,
            worker_pool: Arc::new(worker_pool),
            policy,
            submit_policy: options.submit_policy,
        })
    }

    #[cfg(test)]
    pub fn cache(&self) -> &Arc<GenerationCache<M>> {
        self.handler.cache()
    }

    /// Accepts one inbound request from a face.
    ///
    /// Requests outside the subscription prefix are dropped here and never
    /// reach a worker.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolSaturated`] if every worker queue is full under
    ///   [`SubmitPolicy::Reject`].
    /// - [`Error::ServiceShutdown`] once shutdown has begun.
    pub async fn on_interest(&self, interest: Interest, face: Arc<dyn Face>) -> Result<()> {
        if !self.handler.config().prefix.is_prefix_of(&interest.name) {
            #[cfg(feature = "tracing")]
            tracing::trace!("Ignoring {} outside the subscription prefix", interest.name);
            increment_parse_drops();
            return Ok(());
        }

        self.worker_pool
            .submit(self.submit_policy, WorkRequest::handle(interest, face))
            .await
    }

    /// Publishes `message` under the next generation on behalf of `subject`.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] if `subject` may not publish on the
    ///   channel prefix.
    /// - [`Error::GenerationExhausted`] once every generation has been used.
    pub fn publish(&self, subject: &str, message: M) -> Result<Generation> {
        self.policy
            .check(subject, &self.handler.config().prefix, Action::Publish)?;
        self.handler.publish(message)
    }

    /// Stops the channel on behalf of `subject`: refuses new requests, drains
    /// in-flight ones and stops the workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if `subject` may not stop the
    /// channel.
    pub async fn shutdown(&self, subject: &str) -> Result<()> {
        self.policy
            .check(subject, &self.handler.config().prefix, Action::Stop)?;
        self.worker_pool.shutdown().await
    }
}
