//! Error types for the content-serving layer.
//!
//! This module defines the central `Error` enum shared by the core types and
//! the server. How each case propagates differs:
//!
//! - `Parse`: the request is dropped silently (no notification, no response).
//! - `NotFound`: one `NotFound` notification, no response.
//! - `SegmentOutOfRange`: no response; treated as a caller error.
//! - `Encoding`: no response; surfaced to the log, never retried.
//! - `Transport`: logged, never retried.
//! - `PoolSaturated` / `ServiceShutdown`: the request never reached a worker.

use crate::request::Selector;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the content-serving layer.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The request name does not match the request grammar.
    #[error("Malformed request: {0}")]
    Parse(#[from] ParseError),

    /// Nothing in the cache (or from the lazy-latest provider) satisfies the
    /// selector.
    #[error("No generation matches {selector:?}")]
    NotFound { selector: Selector },

    /// An explicitly requested segment index is past the last segment.
    #[error("Segment {segment} out of range ({count} segments)")]
    SegmentOutOfRange { segment: u64, count: u64 },

    /// The format collaborator failed to encode or decode a message.
    #[error("Encoding error: {0}")]
    Encoding(#[from] FormatError),

    /// The transport publish primitive failed.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// Every worker queue is full and the pool rejects new work.
    #[error("Worker pool is saturated")]
    PoolSaturated,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// Internal channel send/receive failure (e.g., closed channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The subject lacks the capability for the action on the resource.
    #[error("Permission denied: {subject} may not {action} {resource}")]
    PermissionDenied {
        subject: String,
        action: String,
        resource: String,
    },

    /// A name URI could not be parsed.
    #[error("Invalid name: {reason}")]
    InvalidName { reason: String },

    /// An explicit generation was not strictly greater than the newest cached
    /// generation.
    #[error("Generation {generation} is not newer than {latest}")]
    NonMonotonicGeneration { generation: u64, latest: u64 },

    /// Every generation number has been assigned.
    #[error("Generation space exhausted")]
    GenerationExhausted,

    /// No format was registered for the message type.
    #[error("No format registered for {type_name}")]
    FormatNotRegistered { type_name: &'static str },

    /// A configuration value is out of bounds.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Reasons a request name is rejected by the parser.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The name does not start with the subscription prefix.
    #[error("name is outside the subscription prefix")]
    OutsidePrefix,

    /// A component appears where the grammar expects something else.
    #[error("unexpected component at position {position}: expected {expected}")]
    UnexpectedComponent {
        position: usize,
        expected: &'static str,
    },

    /// More components follow a complete request.
    #[error("{count} trailing component(s)")]
    TrailingComponents { count: usize },
}

/// Failure reported by a [`Format`](crate::Format) implementation.
#[derive(Clone, thiserror::Error, Debug)]
#[error("{format} {operation} failed: {reason}")]
pub struct FormatError {
    pub format: &'static str,
    pub operation: &'static str,
    pub reason: String,
}

impl FormatError {
    pub fn encode(format: &'static str, reason: impl ToString) -> Self {
        Self {
            format,
            operation: "encode",
            reason: reason.to_string(),
        }
    }

    pub fn decode(format: &'static str, reason: impl ToString) -> Self {
        Self {
            format,
            operation: "decode",
            reason: reason.to_string(),
        }
    }
}
