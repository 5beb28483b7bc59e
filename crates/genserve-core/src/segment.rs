//! Splitting encoded messages into transport-sized segments.
//!
//! Responses address one segment at a time through [`segment_range`] (see
//! [`Encoded::segment`](crate::Encoded::segment)). [`split`] is the bulk form
//! of the same cut: every segment of a buffer at once, identical to calling
//! [`segment_range`] for each index in turn.

use crate::{Generation, Name};
use bytes::Bytes;
use core::num::NonZeroUsize;

/// One response unit: a size-bounded slice of a generation's encoding.
///
/// `name` is `<prefix>/<generation>/<index>` so the requester can address the
/// segment directly in a follow-up request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub name: Name,
    pub generation: Generation,
    pub index: u64,
    pub final_index: u64,
    pub payload: Bytes,
}

impl Segment {
    pub const fn is_final(&self) -> bool {
        self.index == self.final_index
    }
}

/// Number of segments needed for `len` bytes: `ceil(len / max)`, and at least
/// one so that an empty message still has a segment 0.
pub const fn segment_count(len: usize, max_segment_size: NonZeroUsize) -> u64 {
    if len == 0 {
        1
    } else {
        len.div_ceil(max_segment_size.get()) as u64
    }
}

/// Byte range of segment `index`, or `None` past the last segment.
pub fn segment_range(
    len: usize,
    max_segment_size: NonZeroUsize,
    index: u64,
) -> Option<core::ops::Range<usize>> {
    if index >= segment_count(len, max_segment_size) {
        return None;
    }
    let start = usize::try_from(index).ok()?.checked_mul(max_segment_size.get())?;
    let end = start.saturating_add(max_segment_size.get()).min(len);
    Some(start..end)
}

/// Splits `bytes` into ordered slices of at most `max_segment_size` bytes.
/// Slice `i` covers `segment_range(bytes.len(), max_segment_size, i)`.
///
/// Slices share the underlying buffer; concatenating them in order yields
/// `bytes` exactly.
pub fn split(bytes: &Bytes, max_segment_size: NonZeroUsize) -> Vec<Bytes> {
    if bytes.is_empty() {
        return vec![Bytes::new()];
    }
    bytes
        .chunks(max_segment_size.get())
        .map(|chunk| bytes.slice_ref(chunk))
        .collect()
}
