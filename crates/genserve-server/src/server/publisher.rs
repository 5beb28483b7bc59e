//! Demo content: a periodically published node status message.
//!
//! [`StatusSource`] builds the messages. It is used both by [`run_publisher`]
//! and, when lazy-latest is enabled, as the channel's [`LatestProvider`].

use crate::server::service::{content::ContentService, provider::LatestProvider};
use core::time::Duration;
use portable_atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub node: String,
    /// Per-source sequence number, starting at 0.
    pub sequence: u64,
    pub uptime_ms: u64,
    /// Filler used to exercise segmentation.
    pub padding: String,
}

pub struct StatusSource {
    node: String,
    padding: usize,
    started_at: Instant,
    sequence: AtomicU64,
}

impl StatusSource {
    pub fn new(node: impl Into<String>, padding: usize) -> Self {
        Self {
            node: node.into(),
            padding,
            started_at: Instant::now(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn next_status(&self) -> StatusMessage {
        let uptime_ms = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        StatusMessage {
            node: self.node.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            uptime_ms,
            padding: ".".repeat(self.padding),
        }
    }
}

impl LatestProvider<StatusMessage> for StatusSource {
    fn latest(&self) -> Option<StatusMessage> {
        Some(self.next_status())
    }
}

/// Publishes a fresh status every `period` until `token` is cancelled.
///
/// A refused publish (missing capability) stops the publisher; nothing else
/// does.
pub async fn run_publisher(
    service: ContentService<StatusMessage>,
    source: Arc<StatusSource>,
    subject: String,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match service.publish(&subject, source.next_status()) {
            Ok(_generation) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Published status generation {_generation}");
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Publisher stopped: {_e}");
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Publisher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::service::{
        config::{ChannelConfig, PoolOptions},
        handler::RequestHandler,
        observer::LogObserver,
    };
    use core::num::NonZeroUsize;
    use genserve_core::{Action, ActionSet, Capability, GenerationCache, JsonFormat, Name, Policy};

    #[test]
    fn status_sequence_advances() {
        let source = StatusSource::new("node-a", 3);
        let first = source.next_status();
        let second = source.latest().unwrap();

        assert_eq!(first.node, "node-a");
        assert_eq!(first.padding, "...");
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
    }

    #[tokio::test]
    async fn publishes_until_cancelled() {
        let prefix = Name::from_uri("/node/status").unwrap();
        let handler = RequestHandler::new(
            ChannelConfig::new(prefix.clone()),
            Arc::new(GenerationCache::new(NonZeroUsize::new(1_024).unwrap())),
            Arc::new(JsonFormat::<StatusMessage>::new()),
            Arc::new(LogObserver),
        );
        let policy = Policy::new().grant(Capability::new("op", prefix, ActionSet::ALL));
        let service =
            ContentService::start(handler, PoolOptions::default(), Arc::new(policy), "op").unwrap();

        let token = CancellationToken::new();
        let task = tokio::spawn(run_publisher(
            service.clone(),
            Arc::new(StatusSource::new("node-a", 0)),
            "op".to_string(),
            Duration::from_millis(5),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        token.cancel();
        task.await.unwrap();

        let published = service.cache().len();
        assert!(published >= 2);
        let latest = service.cache().latest().unwrap();
        assert_eq!(latest.message().sequence, published as u64 - 1);
    }

    #[tokio::test]
    async fn stops_without_publish_capability() {
        let prefix = Name::from_uri("/node/status").unwrap();
        let handler = RequestHandler::new(
            ChannelConfig::new(prefix.clone()),
            Arc::new(GenerationCache::new(NonZeroUsize::new(8).unwrap())),
            Arc::new(JsonFormat::<StatusMessage>::new()),
            Arc::new(LogObserver),
        );
        let actions = ActionSet::of(&[Action::Start, Action::Serve, Action::Stop]);
        let policy = Policy::new().grant(Capability::new("op", prefix, actions));
        let service =
            ContentService::start(handler, PoolOptions::default(), Arc::new(policy), "op").unwrap();

        run_publisher(
            service.clone(),
            Arc::new(StatusSource::new("node-a", 0)),
            "op".to_string(),
            Duration::from_millis(1),
            CancellationToken::new(),
        )
        .await;

        assert!(service.cache().is_empty());
    }
}
