//! Hierarchical names and their components.
//!
//! A [`Name`] is an ordered list of opaque [`Component`]s. Numeric components
//! use the NDN `nonNegativeInteger` encoding (big-endian, 1/2/4/8 bytes), and
//! may be prefixed with a single marker byte that tags what the number means.
//! The generation marker is configured per channel; segment indices always use
//! [`SEGMENT_MARKER`].

use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use core::fmt;

/// Marker byte that tags a segment-index component.
pub const SEGMENT_MARKER: u8 = 0x00;

/// A single, opaque name component.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component(Bytes);

impl Component {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes `value` in the smallest of 1, 2, 4 or 8 big-endian bytes.
    pub fn from_number(value: u64) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        put_non_negative_integer(&mut buf, value);
        Self(buf.freeze())
    }

    /// Encodes `value` after a leading `marker` byte.
    pub fn from_number_with_marker(value: u64, marker: u8) -> Self {
        let mut buf = BytesMut::with_capacity(9);
        buf.put_u8(marker);
        put_non_negative_integer(&mut buf, value);
        Self(buf.freeze())
    }

    pub fn from_segment(segment: u64) -> Self {
        Self::from_number_with_marker(segment, SEGMENT_MARKER)
    }

    /// Decodes a plain `nonNegativeInteger` component.
    pub fn to_number(&self) -> Option<u64> {
        read_non_negative_integer(&self.0)
    }

    /// Decodes a number tagged with `marker`.
    ///
    /// Returns `None` when the first byte is not `marker` or the remainder is
    /// not a valid `nonNegativeInteger`.
    pub fn to_number_with_marker(&self, marker: u8) -> Option<u64> {
        match self.0.split_first() {
            Some((&first, rest)) if first == marker => read_non_negative_integer(rest),
            _ => None,
        }
    }

    pub fn to_segment(&self) -> Option<u64> {
        self.to_number_with_marker(SEGMENT_MARKER)
    }

    pub fn is_segment(&self) -> bool {
        self.to_segment().is_some()
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({self})")
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if is_unreserved(b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{b:02X}")?;
            }
        }
        Ok(())
    }
}

fn put_non_negative_integer(buf: &mut BytesMut, value: u64) {
    if value <= u64::from(u8::MAX) {
        buf.put_u8(value as u8);
    } else if value <= u64::from(u16::MAX) {
        buf.put_u16(value as u16);
    } else if value <= u64::from(u32::MAX) {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
}

fn read_non_negative_integer(bytes: &[u8]) -> Option<u64> {
    match bytes.len() {
        1 | 2 | 4 | 8 => Some(bytes.iter().fold(0_u64, |acc, &b| (acc << 8) | u64::from(b))),
        _ => None,
    }
}

const fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// An ordered sequence of [`Component`]s.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    pub const fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses the URI form, e.g. `/status/%FD%02/%00%01`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if the URI does not start with `/` or
    /// contains a malformed percent escape.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let rest = uri.strip_prefix('/').ok_or_else(|| Error::InvalidName {
            reason: format!("'{uri}' must start with '/'"),
        })?;

        let mut name = Self::new();
        for raw in rest.split('/').filter(|raw| !raw.is_empty()) {
            name.push(Component::new(percent_decode(raw)?));
        }
        Ok(name)
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// Returns a copy of this name with `component` appended.
    #[must_use]
    pub fn append(&self, component: Component) -> Self {
        let mut name = self.clone();
        name.push(component);
        name
    }

    /// Returns the component at `index`; negative indices count from the end.
    pub fn get(&self, index: isize) -> Option<&Component> {
        let idx = if index < 0 {
            self.components.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.components.get(idx)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.components.starts_with(&self.components)
    }

    /// Returns the components of `self` that follow `prefix`, or `None` if
    /// `prefix` does not match.
    pub fn suffix_after(&self, prefix: &Self) -> Option<&[Component]> {
        self.components.strip_prefix(prefix.components.as_slice())
    }
}

impl FromIterator<Component> for Name {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

fn percent_decode(raw: &str) -> Result<Vec<u8>> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| core::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| Error::InvalidName {
                    reason: format!("bad percent escape in '{raw}'"),
                })?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_use_smallest_width() {
        assert_eq!(Component::from_number(0).len(), 1);
        assert_eq!(Component::from_number(255).len(), 1);
        assert_eq!(Component::from_number(256).len(), 2);
        assert_eq!(Component::from_number(70_000).len(), 4);
        assert_eq!(Component::from_number(u64::MAX).len(), 8);
        assert_eq!(Component::from_number(70_000).to_number(), Some(70_000));
    }

    #[test]
    fn marker_must_match() {
        let component = Component::from_number_with_marker(2, 42);
        assert_eq!(component.to_number_with_marker(42), Some(2));
        assert_eq!(component.to_number_with_marker(0xFD), None);
        assert!(!component.is_segment());
        assert_eq!(Component::from_segment(999).to_segment(), Some(999));
    }

    #[test]
    fn odd_length_numbers_are_rejected() {
        assert_eq!(Component::new(vec![1, 2, 3]).to_number(), None);
        assert_eq!(Component::new(vec![42]).to_number_with_marker(42), None);
    }

    #[test]
    fn uri_form_escapes_binary_components() {
        let name = Name::from_uri("/test/name")
            .unwrap()
            .append(Component::from_number_with_marker(2, 0xFD));
        assert_eq!(name.to_string(), "/test/name/%FD%02");
        assert_eq!(Name::from_uri(&name.to_string()).unwrap(), name);
        assert_eq!(Name::new().to_string(), "/");
    }

    #[test]
    fn bad_uris_fail() {
        assert!(Name::from_uri("test").is_err());
        assert!(Name::from_uri("/a/%G1").is_err());
        assert!(Name::from_uri("/a/%F").is_err());
    }

    #[test]
    fn prefix_and_negative_indexing() {
        let prefix = Name::from_uri("/test/name").unwrap();
        let full = prefix
            .append(Component::from_number_with_marker(3, 42))
            .append(Component::from_segment(1));

        assert!(prefix.is_prefix_of(&full));
        assert!(!full.is_prefix_of(&prefix));
        assert_eq!(full.suffix_after(&prefix).map(<[_]>::len), Some(2));
        assert_eq!(full.get(-2).and_then(|c| c.to_number_with_marker(42)), Some(3));
        assert_eq!(full.get(-1).and_then(Component::to_segment), Some(1));
        assert!(full.get(-5).is_none());
        assert!(Name::from_uri("/other").unwrap().suffix_after(&full).is_none());
    }
}
