use crate::server::{
    face::Face,
    service::handler::RequestHandler,
    telemetry::{
        increment_encoding_errors, increment_not_found, increment_parse_drops,
        increment_requests_served, record_request_duration,
    },
};
use genserve_core::{Error, Interest};
use std::time::Instant;

/// Runs one request through the handler on a worker and records the result.
///
/// The handler has already raised any lifecycle notifications; this only logs
/// and counts. Nothing is retried: exact generation + segment addressing makes
/// re-requesting safe, so retries belong to the requester.
#[allow(clippy::used_underscore_binding)]
pub async fn process_interest<M>(
    _worker_id: usize,
    handler: &RequestHandler<M>,
    interest: &Interest,
    face: &dyn Face,
    received_at: Instant,
) where
    M: Send + Sync + 'static,
{
    match handler.handle(interest, face).await {
        Ok(_outcome) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Worker {_worker_id} served generation {} ({} segments) for {}",
                _outcome.generation,
                _outcome.segments_sent,
                interest.name
            );
            increment_requests_served();
        }
        Err(Error::Parse(_e)) => {
            #[cfg(feature = "tracing")]
            tracing::trace!("Worker {_worker_id} dropped {}: {_e}", interest.name);
            increment_parse_drops();
        }
        Err(Error::NotFound { selector: _selector }) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} found nothing for {_selector:?}");
            increment_not_found();
        }
        Err(Error::Encoding(_e)) => {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker {_worker_id} failed to encode {}: {_e}", interest.name);
            increment_encoding_errors();
        }
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {_worker_id} failed {}: {_e}", interest.name);
        }
    }

    record_request_duration(received_at.elapsed().as_secs_f64() * 1_000.0);
}
