use crate::server::{
    pool::manager::SubmitPolicy,
    service::config::{
        ChannelConfig, DEFAULT_GENERATION_MARKER, DEFAULT_MAX_SEGMENT_SIZE, LatestPolicy,
        PoolOptions, SendPolicy,
    },
};
use anyhow::{Context, bail};
use clap::Parser;
use core::num::NonZeroUsize;
use core::time::Duration;
use genserve_core::{Name, SEGMENT_MARKER};

/// Runtime configuration for the `genserve-server` binary.
///
/// These settings control the channel being served, the worker pool, and the
/// demo publisher. All values are parsed from CLI arguments or environment
/// variables (a `.env` file is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "genserve-server",
    version,
    about = "Serves published message generations over named, segmented requests"
)]
pub struct CliArgs {
    /// Subscription prefix of the served channel, in URI form.
    ///
    /// Environment variable: `PREFIX`
    #[arg(long, env = "PREFIX", default_value_t = String::from("/genserve/status"))]
    pub prefix: String,

    /// UDP address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:6363"))]
    pub server_addr: String,

    /// Number of worker tasks resolving requests.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = num_cpus::get())]
    pub num_workers: usize,

    /// Bounded queue depth of each worker.
    ///
    /// Environment variable: `QUEUE_DEPTH`
    #[arg(long, env = "QUEUE_DEPTH", default_value_t = 64)]
    pub queue_depth: usize,

    /// What happens to a request when every worker queue is full.
    ///
    /// Environment variable: `SUBMIT_POLICY`
    #[arg(long, env = "SUBMIT_POLICY", value_enum, default_value_t = SubmitPolicy::Reject)]
    pub submit_policy: SubmitPolicy,

    /// Number of generations kept in the cache.
    ///
    /// Environment variable: `CACHE_CAPACITY`
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 16)]
    pub cache_capacity: usize,

    /// Upper bound on a response segment's payload, in bytes.
    ///
    /// Environment variable: `MAX_SEGMENT_SIZE`
    #[arg(long, env = "MAX_SEGMENT_SIZE", default_value_t = DEFAULT_MAX_SEGMENT_SIZE)]
    pub max_segment_size: usize,

    /// Marker byte of generation components. Must not be the segment marker
    /// (0).
    ///
    /// Environment variable: `GENERATION_MARKER`
    #[arg(long, env = "GENERATION_MARKER", default_value_t = DEFAULT_GENERATION_MARKER)]
    pub generation_marker: u8,

    /// Segments sent for a request that names no segment.
    ///
    /// Environment variable: `SEND_POLICY`
    #[arg(long, env = "SEND_POLICY", value_enum, default_value_t = SendPolicy::All)]
    pub send_policy: SendPolicy,

    /// When the lazy-latest provider is consulted.
    ///
    /// Environment variable: `LATEST_POLICY`
    #[arg(long, env = "LATEST_POLICY", value_enum, default_value_t = LatestPolicy::CacheFirst)]
    pub latest_policy: LatestPolicy,

    /// Maximum age, in milliseconds, of a cached latest generation that may
    /// still answer a `Latest` request. Unset means any age.
    ///
    /// Environment variable: `LATEST_MAX_AGE_MS`
    #[arg(long, env = "LATEST_MAX_AGE_MS")]
    pub latest_max_age_ms: Option<u64>,

    /// Register the status source as the lazy-latest provider.
    ///
    /// Environment variable: `LAZY_LATEST`
    #[arg(long, env = "LAZY_LATEST", default_value_t = false)]
    pub lazy_latest: bool,

    /// Interval of the demo publisher in milliseconds; 0 disables it.
    ///
    /// Environment variable: `PUBLISH_INTERVAL_MS`
    #[arg(long, env = "PUBLISH_INTERVAL_MS", default_value_t = 1_000)]
    pub publish_interval_ms: u64,

    /// Bytes of padding in each status message, to exercise segmentation.
    ///
    /// Environment variable: `STATUS_PADDING`
    #[arg(long, env = "STATUS_PADDING", default_value_t = 0)]
    pub status_padding: usize,

    /// Node name reported in status messages.
    ///
    /// Environment variable: `NODE_NAME`
    #[arg(long, env = "NODE_NAME", default_value_t = String::from("genserve"))]
    pub node_name: String,

    /// Subject granted every action on the prefix, used for start, stop and
    /// publish.
    ///
    /// Environment variable: `SUBJECT`
    #[arg(long, env = "SUBJECT", default_value_t = String::from("operator"))]
    pub subject: String,

    /// Seconds to wait for in-flight requests during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub channel: ChannelConfig,
    pub pool: PoolOptions,
    pub cache_capacity: NonZeroUsize,
    pub lazy_latest: bool,
    /// `None` disables the demo publisher.
    pub publish_interval: Option<Duration>,
    pub status_padding: usize,
    pub node_name: String,
    pub subject: String,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.queue_depth == 0 {
            bail!("QUEUE_DEPTH must be greater than 0");
        }

        let Some(cache_capacity) = NonZeroUsize::new(args.cache_capacity) else {
            bail!("CACHE_CAPACITY must be greater than 0");
        };

        let Some(max_segment_size) = NonZeroUsize::new(args.max_segment_size) else {
            bail!("MAX_SEGMENT_SIZE must be greater than 0");
        };

        if args.generation_marker == SEGMENT_MARKER {
            bail!(
                "GENERATION_MARKER ({:#04x}) must differ from the segment marker",
                args.generation_marker
            );
        }

        let prefix = Name::from_uri(&args.prefix)
            .with_context(|| format!("invalid PREFIX `{}`", args.prefix))?;

        let mut channel = ChannelConfig::new(prefix);
        channel.generation_marker = args.generation_marker;
        channel.max_segment_size = max_segment_size;
        channel.send_policy = args.send_policy;
        channel.latest_policy = args.latest_policy;
        channel.latest_max_age = args.latest_max_age_ms.map(Duration::from_millis);

        Ok(Self {
            server_addr: args.server_addr,
            channel,
            pool: PoolOptions {
                num_workers: args.num_workers,
                queue_depth: args.queue_depth,
                submit_policy: args.submit_policy,
                shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            },
            cache_capacity,
            lazy_latest: args.lazy_latest,
            publish_interval: (args.publish_interval_ms > 0)
                .then(|| Duration::from_millis(args.publish_interval_ms)),
            status_padding: args.status_padding,
            node_name: args.node_name,
            subject: args.subject,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            ["genserve-server", "--num-workers", "2"]
                .iter()
                .chain(args),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn builds_channel_from_flags() {
        let config = parse(&[
            "--prefix",
            "/node/status",
            "--send-policy",
            "first",
            "--latest-policy",
            "provider-first",
            "--latest-max-age-ms",
            "250",
            "--publish-interval-ms",
            "0",
        ])
        .unwrap();

        assert_eq!(config.channel.prefix, Name::from_uri("/node/status").unwrap());
        assert_eq!(config.channel.send_policy, SendPolicy::First);
        assert_eq!(config.channel.latest_policy, LatestPolicy::ProviderFirst);
        assert_eq!(
            config.channel.latest_max_age,
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.pool.num_workers, 2);
        assert!(config.publish_interval.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse(&["--queue-depth", "0"]).is_err());
        assert!(parse(&["--cache-capacity", "0"]).is_err());
        assert!(parse(&["--max-segment-size", "0"]).is_err());
        assert!(parse(&["--generation-marker", "0"]).is_err());
        assert!(parse(&["--prefix", "/bad/%zz"]).is_err());
    }
}
