//! Server-side components of the `genserve` content service.
//!
//! This module contains the building blocks necessary to run a content channel
//! over UDP, including request handling, worker pool orchestration, the demo
//! publisher and telemetry setup.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration.
//! - [`face`] - Transport seam and the UDP face.
//! - [`pool`] - Bounded worker pool.
//! - [`publisher`] - Periodic status publisher and lazy-latest source.
//! - [`service`] - Content channel: handler, ingress service, collaborators.
//! - [`streaming`] - Per-request work items and segment emission.
//! - [`telemetry`] - Structured logging and optional OpenTelemetry export.

pub mod config;
pub mod face;
pub mod pool;
pub mod publisher;
pub mod service;
pub mod streaming;
pub mod telemetry;
