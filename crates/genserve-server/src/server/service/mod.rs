//! The content channel: configuration, request handling and the collaborator
//! seams it publishes through.
//!
//! - [`config`]: per-channel and pool settings.
//! - [`content`]: [`content::ContentService`], the ingress boundary.
//! - [`handler`]: [`handler::RequestHandler`], the per-request state machine.
//! - [`observer`]: lifecycle notifications.
//! - [`provider`]: the lazy-latest hook.

pub mod config;
pub mod content;
pub mod handler;
pub mod observer;
pub mod provider;
