//! Request handling for one channel.
//!
//! [`RequestHandler`] turns an [`Interest`] into response segments:
//!
//! 1. **Parsing**: strip the subscription prefix and parse the rest. A
//!    malformed name is dropped with no notification and no response.
//! 2. **Resolving**: look the selector up in the [`GenerationCache`]. `Latest`
//!    may consult the [`LatestProvider`] once, per [`LatestPolicy`]. Its
//!    message is published under the handler's publishing subject, which must
//!    hold `Publish` on the prefix. Nothing found raises a single `NotFound`
//!    notification.
//! 3. **Encoding**: encode on first use and memoize on the cache entry.
//! 4. **Responding**: publish the requested segment, or the run chosen by
//!    [`SendPolicy`](super::config::SendPolicy), then raise `Served`.
//!
//! A successful request raises exactly two notifications (`Resolved`, then
//! `Served`).

use super::{
    config::{ChannelConfig, LatestPolicy},
    observer::{LifecycleEvent, Observer},
    provider::LatestProvider,
};
use crate::server::{face::Face, streaming::coordinator::respond};
use genserve_core::{
    Action, CacheEntry, Encoded, Error, Format, Generation, GenerationCache, Interest, ParseError,
    Policy, RequestDescriptor, Result, Selector, parse,
};
use std::sync::Arc;

/// What a successfully handled request produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub generation: Generation,
    pub segments_sent: u64,
}

/// Who lazily computed messages are published as.
struct PublishGate {
    policy: Arc<Policy>,
    subject: String,
}

/// Resolves, encodes, segments and answers requests for one channel.
pub struct RequestHandler<M> {
    config: ChannelConfig,
    cache: Arc<GenerationCache<M>>,
    format: Arc<dyn Format<M>>,
    observer: Arc<dyn Observer>,
    provider: Option<Arc<dyn LatestProvider<M>>>,
    gate: Option<PublishGate>,
}

impl<M> RequestHandler<M>
where
    M: Send + Sync + 'static,
{
    pub fn new(
        config: ChannelConfig,
        cache: Arc<GenerationCache<M>>,
        format: Arc<dyn Format<M>>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            config,
            cache,
            format,
            observer,
            provider: None,
            gate: None,
        }
    }

    /// Installs the hook consulted when `Latest` cannot be served from the
    /// cache. It is only consulted once a publishing subject is set with
    /// [`Self::with_publish_gate`].
    #[must_use]
    pub fn with_latest_provider(mut self, provider: Arc<dyn LatestProvider<M>>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Publishes lazily computed messages as `subject`, checked against
    /// `policy` before the provider runs.
    #[must_use]
    pub fn with_publish_gate(mut self, policy: Arc<Policy>, subject: impl Into<String>) -> Self {
        self.gate = Some(PublishGate {
            policy,
            subject: subject.into(),
        });
        self
    }

    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    #[cfg(test)]
    pub const fn cache(&self) -> &Arc<GenerationCache<M>> {
        &self.cache
    }

    /// Publishes `message` under the next generation. Callers check the
    /// `Publish` capability first.
    pub(super) fn publish(&self, message: M) -> Result<Generation> {
        Ok(self.cache.add(message)?.generation())
    }

    /// Handles one request end to end.
    ///
    /// # Errors
    ///
    /// - [`Error::Parse`]: malformed name; nothing was notified or sent.
    /// - [`Error::NotFound`]: one `NotFound` notification; nothing sent.
    /// - [`Error::SegmentOutOfRange`]: explicit index past the last segment.
    /// - [`Error::Encoding`]: the format failed; nothing sent.
    /// - [`Error::Transport`]: the face accepted no segment.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(name = %interest.name)))]
    pub async fn handle(&self, interest: &Interest, face: &dyn Face) -> Result<Outcome> {
        let descriptor = self.parse(interest)?;

        let Some(entry) = self.resolve(descriptor.selector).await? else {
            self.observer.notify(&LifecycleEvent::NotFound {
                selector: descriptor.selector,
            });
            return Err(Error::NotFound {
                selector: descriptor.selector,
            });
        };

        let generation = entry.generation();
        self.observer.notify(&LifecycleEvent::Resolved {
            generation,
            selector: descriptor.selector,
        });

        let encoded = self.encode(entry).await?;
        let segments_sent = respond(&self.config, face, generation, &encoded, descriptor.segment)?;

        self.observer.notify(&LifecycleEvent::Served {
            generation,
            segments: segments_sent,
        });

        Ok(Outcome {
            generation,
            segments_sent,
        })
    }

    fn parse(&self, interest: &Interest) -> Result<RequestDescriptor> {
        let suffix = interest
            .name
            .suffix_after(&self.config.prefix)
            .ok_or(ParseError::OutsidePrefix)?;
        Ok(parse(
            suffix,
            interest.child_selector,
            self.config.generation_marker,
        )?)
    }

    async fn resolve(&self, selector: Selector) -> Result<Option<Arc<CacheEntry<M>>>> {
        match selector {
            Selector::Earliest => Ok(self.cache.earliest()),
            Selector::Exact(generation) => Ok(self.cache.get(generation)),
            Selector::Latest => match self.config.latest_policy {
                LatestPolicy::CacheFirst => {
                    let cached = match self.config.latest_max_age {
                        Some(max_age) => self.cache.latest_within(max_age),
                        None => self.cache.latest(),
                    };
                    match cached {
                        Some(entry) => Ok(Some(entry)),
                        None => self.compute_latest().await,
                    }
                }
                LatestPolicy::ProviderFirst => match self.compute_latest().await? {
                    Some(entry) => Ok(Some(entry)),
                    None => Ok(self.cache.latest()),
                },
            },
        }
    }

    /// Invokes the lazy-latest provider on a blocking thread and publishes
    /// what it returns.
    ///
    /// Without a publishing subject holding `Publish` on the prefix, the
    /// provider is not consulted.
    async fn compute_latest(&self) -> Result<Option<Arc<CacheEntry<M>>>> {
        let Some(provider) = self.provider.clone() else {
            return Ok(None);
        };
        let Some(gate) = &self.gate else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Lazy-latest provider skipped: no publishing subject");
            return Ok(None);
        };
        if gate
            .policy
            .check(&gate.subject, &self.config.prefix, Action::Publish)
            .is_err()
        {
            return Ok(None);
        }

        let message = tokio::task::spawn_blocking(move || provider.latest())
            .await
            .map_err(|e| Error::ChannelError {
                context: format!("Lazy-latest provider task failed: {e}"),
            })?;

        let Some(message) = message else {
            return Ok(None);
        };
        let entry = self.cache.add(message)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("Published lazily computed generation {}", entry.generation());
        Ok(Some(entry))
    }

    async fn encode(&self, entry: Arc<CacheEntry<M>>) -> Result<Arc<Encoded>> {
        let max_segment_size = self.config.max_segment_size;
        if entry.is_encoded() {
            return entry.encoded(self.format.as_ref(), max_segment_size);
        }

        let format = Arc::clone(&self.format);
        tokio::task::spawn_blocking(move || entry.encoded(format.as_ref(), max_segment_size))
            .await
            .map_err(|e| Error::ChannelError {
                context: format!("Encoding task failed: {e}"),
            })?
    }
}
