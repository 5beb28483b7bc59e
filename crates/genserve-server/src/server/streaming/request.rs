use crate::server::face::Face;
use genserve_core::Interest;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// A message sent from the worker pool to an individual worker task.
///
/// [`WorkRequest`]s are sent over bounded asynchronous channels and are
/// consumed by the worker's main event loop.
pub enum WorkRequest {
    /// Resolve and answer one inbound request.
    ///
    /// - `interest`: The request as received, prefix included.
    /// - `face`: Where response segments are published.
    /// - `received_at`: Ingress timestamp, used for the duration metric.
    Handle {
        interest: Interest,
        face: Arc<dyn Face>,
        received_at: Instant,
    },

    /// Request the worker to shut down gracefully.
    ///
    /// - `response`: One-shot channel for acknowledging that the worker has
    ///   completed its shutdown routine.
    Shutdown { response: oneshot::Sender<()> },
}

impl WorkRequest {
    pub fn handle(interest: Interest, face: Arc<dyn Face>) -> Self {
        Self::Handle {
            interest,
            face,
            received_at: Instant::now(),
        }
    }
}
