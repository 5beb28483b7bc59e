use crate::server::pool::manager::SubmitPolicy;
use core::num::NonZeroUsize;
use core::time::Duration;
use genserve_core::{Error, Name, Result, SEGMENT_MARKER};

/// Default upper bound on a response segment's payload, in bytes.
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 8_800;

/// Default marker byte tagging generation components.
pub const DEFAULT_GENERATION_MARKER: u8 = 0xFD;

/// Which segments to send when a request names no explicit segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SendPolicy {
    /// Send the whole run of segments starting at 0.
    #[default]
    All,
    /// Send segment 0 only; the requester fetches the rest by name.
    First,
}

/// When to consult the lazy-latest provider for a `Latest` request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LatestPolicy {
    /// Serve the cached latest generation if it qualifies (see
    /// [`ChannelConfig::latest_max_age`]); otherwise ask the provider.
    #[default]
    CacheFirst,
    /// Ask the provider first; fall back to the cached latest generation when
    /// it has nothing.
    ProviderFirst,
}

/// Per-channel request handling settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Subscription prefix; request names are parsed after it.
    pub prefix: Name,
    /// Marker byte tagging generation components. Must differ from the
    /// segment marker.
    pub generation_marker: u8,
    /// Upper bound on each response segment's payload.
    pub max_segment_size: NonZeroUsize,
    pub send_policy: SendPolicy,
    pub latest_policy: LatestPolicy,
    /// Under [`LatestPolicy::CacheFirst`], a cached latest generation older
    /// than this does not qualify. `None` means any age qualifies.
    pub latest_max_age: Option<Duration>,
}

impl ChannelConfig {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            generation_marker: DEFAULT_GENERATION_MARKER,
            max_segment_size: NonZeroUsize::new(DEFAULT_MAX_SEGMENT_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            send_policy: SendPolicy::default(),
            latest_policy: LatestPolicy::default(),
            latest_max_age: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the generation marker collides with
    /// the segment marker.
    pub fn validate(&self) -> Result<()> {
        if self.generation_marker == SEGMENT_MARKER {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "generation marker {:#04x} collides with the segment marker",
                    self.generation_marker
                ),
            });
        }
        Ok(())
    }
}

/// Sizing and admission settings for a service's worker pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub num_workers: usize,
    /// Depth of each worker's bounded queue.
    pub queue_depth: usize,
    pub submit_policy: SubmitPolicy,
    /// How long shutdown waits for in-flight requests to drain.
    pub shutdown_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            num_workers: 1,
            queue_depth: 64,
            submit_policy: SubmitPolicy::default(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}
