//! Message formats.
//!
//! A [`Format`] turns a message into the bytes that get segmented and back.
//! Formats are resolved once, at configuration time, from a
//! [`FormatRegistry`] keyed by the message type.

use crate::{Error, FormatError, Result};
use bytes::Bytes;
use core::any::{Any, TypeId, type_name};
use core::marker::PhantomData;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;

/// Encodes and decodes messages of type `M`.
pub trait Format<M>: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns a [`FormatError`] if the message cannot be represented.
    fn encode(&self, message: &M) -> core::result::Result<Bytes, FormatError>;

    /// # Errors
    ///
    /// Returns a [`FormatError`] if `bytes` is not a valid encoding.
    fn decode(&self, bytes: &[u8]) -> core::result::Result<M, FormatError>;
}

/// JSON encoding via `serde_json`.
pub struct JsonFormat<M> {
    _message: PhantomData<fn() -> M>,
}

impl<M> JsonFormat<M> {
    pub const fn new() -> Self {
        Self {
            _message: PhantomData,
        }
    }
}

impl<M> Default for JsonFormat<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Format<M> for JsonFormat<M>
where
    M: Serialize + DeserializeOwned,
{
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &M) -> core::result::Result<Bytes, FormatError> {
        serde_json::to_vec(message)
            .map(Bytes::from)
            .map_err(|e| FormatError::encode(self.name(), e))
    }

    fn decode(&self, bytes: &[u8]) -> core::result::Result<M, FormatError> {
        serde_json::from_slice(bytes).map_err(|e| FormatError::decode(self.name(), e))
    }
}

/// Identity format for messages that already are bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawFormat;

impl Format<Bytes> for RawFormat {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, message: &Bytes) -> core::result::Result<Bytes, FormatError> {
        Ok(message.clone())
    }

    fn decode(&self, bytes: &[u8]) -> core::result::Result<Bytes, FormatError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// Formats keyed by message type.
#[derive(Default)]
pub struct FormatRegistry {
    formats: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `format` for `M`, replacing any previous registration.
    pub fn register<M: 'static>(&mut self, format: Arc<dyn Format<M>>) -> &mut Self {
        self.formats.insert(TypeId::of::<M>(), Arc::new(format));
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::FormatNotRegistered`] if nothing was registered for
    /// `M`.
    pub fn resolve<M: 'static>(&self) -> Result<Arc<dyn Format<M>>> {
        self.formats
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Format<M>>>())
            .cloned()
            .ok_or(Error::FormatNotRegistered {
                type_name: type_name::<M>(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: f64,
    }

    #[test]
    fn json_format_reports_decode_failures() {
        let format = JsonFormat::<Reading>::new();
        let bytes = format
            .encode(&Reading {
                sensor: "t0".into(),
                value: 21.5,
            })
            .unwrap();
        assert_eq!(format.decode(&bytes).unwrap().sensor, "t0");

        let err = format.decode(b"{not json").unwrap_err();
        assert_eq!(err.format, "json");
        assert_eq!(err.operation, "decode");
    }

    #[test]
    fn registry_resolves_by_message_type() {
        let mut registry = FormatRegistry::new();
        registry
            .register::<Reading>(Arc::new(JsonFormat::<Reading>::new()))
            .register::<Bytes>(Arc::new(RawFormat));

        assert_eq!(registry.resolve::<Reading>().unwrap().name(), "json");
        assert_eq!(registry.resolve::<Bytes>().unwrap().name(), "raw");
        assert!(matches!(
            registry.resolve::<String>(),
            Err(Error::FormatNotRegistered { .. })
        ));
    }
}
