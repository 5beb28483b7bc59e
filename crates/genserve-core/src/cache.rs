//! Bounded, generation-ordered message cache.
//!
//! [`GenerationCache`] holds the most recent `capacity` published generations
//! of a channel. Each [`add`](GenerationCache::add) assigns the next
//! generation, so insertion order and numeric order coincide and eviction is
//! FIFO by generation.
//!
//! Lookups hand out [`Arc<CacheEntry>`] snapshots. Evicting an entry only
//! drops the cache's reference: a request that already resolved it keeps
//! reading a complete entry, and the entry's encoded buffer is freed once the
//! last reader is done.

use crate::{Error, Format, Generation, Result, segment};
use bytes::Bytes;
use core::num::NonZeroUsize;
use core::time::Duration;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// The encoded form of a message, ready to be segmented.
#[derive(Debug)]
pub struct Encoded {
    bytes: Bytes,
    max_segment_size: NonZeroUsize,
    segment_count: u64,
}

impl Encoded {
    pub fn new(bytes: Bytes, max_segment_size: NonZeroUsize) -> Self {
        let segment_count = segment::segment_count(bytes.len(), max_segment_size);
        Self {
            bytes,
            max_segment_size,
            segment_count,
        }
    }

    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub const fn max_segment_size(&self) -> NonZeroUsize {
        self.max_segment_size
    }

    pub const fn segment_count(&self) -> u64 {
        self.segment_count
    }

    /// Returns segment `index` as a slice of the shared buffer.
    pub fn segment(&self, index: u64) -> Option<Bytes> {
        segment::segment_range(self.bytes.len(), self.max_segment_size, index)
            .map(|range| self.bytes.slice(range))
    }
}

/// One published generation of a message.
#[derive(Debug)]
pub struct CacheEntry<M> {
    generation: Generation,
    message: M,
    published_at: Instant,
    encoded: Mutex<Option<Arc<Encoded>>>,
}

impl<M> CacheEntry<M> {
    fn new(generation: Generation, message: M) -> Self {
        Self {
            generation,
            message,
            published_at: Instant::now(),
            encoded: Mutex::new(None),
        }
    }

    pub const fn generation(&self) -> Generation {
        self.generation
    }

    pub const fn message(&self) -> &M {
        &self.message
    }

    pub const fn published_at(&self) -> Instant {
        self.published_at
    }

    pub fn is_encoded(&self) -> bool {
        self.encoded.lock().is_some()
    }

    /// Returns the memoized encoding, encoding the message on first use.
    ///
    /// Racing callers serialize on the entry's slot, so `format` runs at most
    /// once per entry. A failed encode is not memoized. If a different
    /// `max_segment_size` is requested, the cached bytes are re-segmented
    /// without encoding again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if `format` fails.
    pub fn encoded(
        &self,
        format: &dyn Format<M>,
        max_segment_size: NonZeroUsize,
    ) -> Result<Arc<Encoded>> {
        let mut slot = self.encoded.lock();

        let bytes = match slot.as_ref() {
            Some(encoded) if encoded.max_segment_size == max_segment_size => {
                return Ok(Arc::clone(encoded));
            }
            Some(encoded) => encoded.bytes.clone(),
            None => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    "Encoding generation {} with {}",
                    self.generation,
                    format.name()
                );
                format.encode(&self.message)?
            }
        };

        let encoded = Arc::new(Encoded::new(bytes, max_segment_size));
        *slot = Some(Arc::clone(&encoded));
        Ok(encoded)
    }
}

struct CacheState<M> {
    entries: VecDeque<Arc<CacheEntry<M>>>,
    /// `None` once `Generation::MAX` has been assigned.
    next_generation: Option<Generation>,
}

/// A bounded, insertion-ordered store of published generations.
///
/// Safe to share between one or more publishers and any number of readers.
pub struct GenerationCache<M> {
    capacity: NonZeroUsize,
    state: RwLock<CacheState<M>>,
}

impl<M> GenerationCache<M> {
    /// Creates an empty cache whose first generation will be `1`.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_first_generation(capacity, 1)
    }

    /// Creates an empty cache whose first assigned generation is `first`.
    pub fn with_first_generation(capacity: NonZeroUsize, first: Generation) -> Self {
        Self {
            capacity,
            state: RwLock::new(CacheState {
                entries: VecDeque::with_capacity(capacity.get()),
                next_generation: Some(first),
            }),
        }
    }

    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Publishes `message` under the next generation, evicting the oldest
    /// entry if the cache is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GenerationExhausted`] once `Generation::MAX` has been
    /// assigned.
    pub fn add(&self, message: M) -> Result<Arc<CacheEntry<M>>> {
        let mut state = self.state.write();
        let generation = state.next_generation.ok_or(Error::GenerationExhausted)?;
        state.next_generation = generation.checked_add(1);
        Ok(self.push_locked(&mut state, generation, message))
    }

    /// Publishes `message` under an explicit `generation`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonMonotonicGeneration`] if `generation` is not
    /// greater than every generation assigned so far.
    pub fn insert(&self, generation: Generation, message: M) -> Result<Arc<CacheEntry<M>>> {
        let mut state = self.state.write();
        match state.next_generation {
            Some(next) if generation >= next => {}
            next => {
                return Err(Error::NonMonotonicGeneration {
                    generation,
                    latest: next.map_or(Generation::MAX, |next| next.saturating_sub(1)),
                });
            }
        }
        state.next_generation = generation.checked_add(1);
        Ok(self.push_locked(&mut state, generation, message))
    }

    fn push_locked(
        &self,
        state: &mut CacheState<M>,
        generation: Generation,
        message: M,
    ) -> Arc<CacheEntry<M>> {
        while state.entries.len() >= self.capacity.get() {
            let _evicted = state.entries.pop_front();
            #[cfg(feature = "tracing")]
            if let Some(evicted) = &_evicted {
                tracing::trace!("Evicted generation {}", evicted.generation);
            }
        }

        let entry = Arc::new(CacheEntry::new(generation, message));
        state.entries.push_back(Arc::clone(&entry));
        entry
    }

    /// The smallest generation currently cached.
    pub fn earliest(&self) -> Option<Arc<CacheEntry<M>>> {
        self.state.read().entries.front().cloned()
    }

    /// The largest generation currently cached.
    pub fn latest(&self) -> Option<Arc<CacheEntry<M>>> {
        self.state.read().entries.back().cloned()
    }

    /// The latest entry, provided it was published at most `max_age` ago.
    pub fn latest_within(&self, max_age: Duration) -> Option<Arc<CacheEntry<M>>> {
        self.latest()
            .filter(|entry| entry.published_at.elapsed() <= max_age)
    }

    /// Exact lookup; never substitutes a neighbouring generation.
    pub fn get(&self, generation: Generation) -> Option<Arc<CacheEntry<M>>> {
        let state = self.state.read();
        state
            .entries
            .binary_search_by_key(&generation, |entry| entry.generation)
            .ok()
            .map(|idx| Arc::clone(&state.entries[idx]))
    }

    /// Generations currently cached, oldest first.
    pub fn generations(&self) -> Vec<Generation> {
        self.state
            .read()
            .entries
            .iter()
            .map(|entry| entry.generation)
            .collect()
    }
}

#[cfg(test)]
mod tests;
