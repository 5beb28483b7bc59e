use crate::server::{
    service::handler::RequestHandler,
    streaming::{processor::process_interest, request::WorkRequest},
};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// Each worker handles one request at a time using the shared
/// [`RequestHandler`], then decrements the pool's in-flight counter. It runs
/// until a shutdown request arrives or its channel closes.
///
/// # Arguments
///
/// - `worker_id`: Unique numeric identifier for this worker (used for
///   logs/tracing).
/// - `rx`: Receiver through which [`WorkRequest`]s are received.
/// - `handler`: The channel's request handler.
/// - `inflight`: Counter shared with the pool.
pub async fn worker_loop<M>(
    worker_id: usize,
    mut rx: mpsc::Receiver<WorkRequest>,
    handler: Arc<RequestHandler<M>>,
    inflight: Arc<AtomicUsize>,
) where
    M: Send + Sync + 'static,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    while let Some(work) = rx.recv().await {
        match work {
            WorkRequest::Handle {
                interest,
                face,
                received_at,
            } => {
                process_interest(worker_id, &handler, &interest, face.as_ref(), received_at).await;
                inflight.fetch_sub(1, Ordering::AcqRel);
            }
            WorkRequest::Shutdown { response } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}
