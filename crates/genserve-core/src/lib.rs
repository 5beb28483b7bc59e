#![doc = include_str!("../README.md")]

pub mod access;
pub mod cache;
mod error;
pub mod format;
pub mod name;
pub mod request;
pub mod segment;

pub use access::{Action, ActionSet, Capability, Policy};
pub use cache::{CacheEntry, Encoded, GenerationCache};
pub use error::*;
pub use format::{Format, FormatRegistry, JsonFormat, RawFormat};
pub use name::{Component, Name, SEGMENT_MARKER};
pub use request::{ChildSelector, Generation, Interest, RequestDescriptor, Selector, parse};
pub use segment::Segment;
