use super::*;
use crate::{FormatError, RawFormat};
use core::sync::atomic::{AtomicUsize, Ordering};
use std::thread::scope;

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn message(len: usize) -> Bytes {
    Bytes::from(vec![7_u8; len])
}

struct CountingFormat {
    calls: AtomicUsize,
}

impl Format<Bytes> for CountingFormat {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn encode(&self, message: &Bytes) -> core::result::Result<Bytes, FormatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(message.clone())
    }

    fn decode(&self, bytes: &[u8]) -> core::result::Result<Bytes, FormatError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

struct FailingFormat;

impl Format<Bytes> for FailingFormat {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn encode(&self, _message: &Bytes) -> core::result::Result<Bytes, FormatError> {
        Err(FormatError::encode(self.name(), "boom"))
    }

    fn decode(&self, _bytes: &[u8]) -> core::result::Result<Bytes, FormatError> {
        Err(FormatError::decode(self.name(), "boom"))
    }
}

#[test]
fn earliest_moves_after_eviction() {
    let cache = GenerationCache::new(capacity(3));
    let g1 = cache.add(message(1)).unwrap().generation();
    let g2 = cache.add(message(1)).unwrap().generation();
    let g3 = cache.add(message(1)).unwrap().generation();
    assert!(g1 < g2 && g2 < g3);
    assert_eq!(cache.earliest().unwrap().generation(), g1);
    assert_eq!(cache.latest().unwrap().generation(), g3);

    let g4 = cache.add(message(1)).unwrap().generation();
    assert_eq!(cache.earliest().unwrap().generation(), g2);
    assert_eq!(cache.latest().unwrap().generation(), g4);
    assert!(cache.get(g1).is_none());
    assert_eq!(cache.generations(), vec![g2, g3, g4]);
}

#[test]
fn never_exceeds_capacity() {
    for k in 1..6 {
        let cache = GenerationCache::new(capacity(k));
        for i in 0..20 {
            cache.add(message(i)).unwrap();
            assert!(cache.len() <= k);
        }
        assert_eq!(cache.len(), k);
    }
}

#[test]
fn exact_lookup_does_not_substitute() {
    let cache = GenerationCache::new(capacity(5));
    cache.add(message(1)).unwrap();
    cache.add(message(2)).unwrap();
    cache.add(message(3)).unwrap();

    assert_eq!(cache.get(2).unwrap().message().len(), 2);
    assert!(cache.get(0).is_none());
    assert!(cache.get(999).is_none());
}

#[test]
fn empty_cache_resolves_nothing() {
    let cache = GenerationCache::<Bytes>::new(capacity(2));
    assert!(cache.is_empty());
    assert!(cache.earliest().is_none());
    assert!(cache.latest().is_none());
    assert!(cache.latest_within(Duration::from_secs(60)).is_none());
}

#[test]
fn explicit_generations_must_increase() {
    let cache = GenerationCache::new(capacity(5));
    cache.insert(10, message(1)).unwrap();
    assert!(matches!(
        cache.insert(10, message(1)),
        Err(Error::NonMonotonicGeneration {
            generation: 10,
            latest: 10
        })
    ));
    assert_eq!(cache.add(message(1)).unwrap().generation(), 11);
}

#[test]
fn generation_space_exhaustion_is_an_error() {
    let cache = GenerationCache::with_first_generation(capacity(4), u64::MAX - 1);
    assert_eq!(cache.add(message(1)).unwrap().generation(), u64::MAX - 1);
    assert_eq!(cache.add(message(1)).unwrap().generation(), u64::MAX);
    assert!(matches!(cache.add(message(1)), Err(Error::GenerationExhausted)));
    assert!(matches!(
        cache.insert(u64::MAX, message(1)),
        Err(Error::NonMonotonicGeneration {
            generation: u64::MAX,
            latest: u64::MAX
        })
    ));
    assert_eq!(cache.generations(), [u64::MAX - 1, u64::MAX]);

    let cache = GenerationCache::new(capacity(4));
    cache.insert(u64::MAX, message(1)).unwrap();
    assert!(matches!(cache.add(message(1)), Err(Error::GenerationExhausted)));
    assert_eq!(cache.get(u64::MAX).unwrap().generation(), u64::MAX);
}

#[test]
fn stale_latest_does_not_qualify() {
    let cache = GenerationCache::new(capacity(2));
    cache.add(message(1)).unwrap();
    assert!(cache.latest_within(Duration::from_secs(3600)).is_some());
    std::thread::sleep(Duration::from_millis(5));
    assert!(cache.latest_within(Duration::ZERO).is_none());
}

#[test]
fn evicted_entry_stays_readable() {
    let cache = GenerationCache::new(capacity(1));
    let held = cache.add(message(16)).unwrap();
    let encoded = held.encoded(&RawFormat, capacity(8)).unwrap();
    cache.add(message(1)).unwrap();

    assert!(cache.get(held.generation()).is_none());
    assert_eq!(held.message().len(), 16);
    assert_eq!(encoded.segment_count(), 2);
    assert_eq!(encoded.segment(1).unwrap().len(), 8);
}

#[test]
fn encoding_is_memoized_under_races() {
    let cache = GenerationCache::new(capacity(2));
    let entry = cache.add(message(10_000)).unwrap();
    let format = CountingFormat {
        calls: AtomicUsize::new(0),
    };

    scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                let encoded = entry.encoded(&format, capacity(8_800)).unwrap();
                assert_eq!(encoded.segment_count(), 2);
            });
        }
    });

    assert_eq!(format.calls.load(Ordering::SeqCst), 1);
    assert!(entry.is_encoded());

    // Re-segmenting reuses the encoded bytes.
    let small = entry.encoded(&format, capacity(1_000)).unwrap();
    assert_eq!(small.segment_count(), 10);
    assert_eq!(format.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_encoding_is_not_memoized() {
    let cache = GenerationCache::new(capacity(2));
    let entry = cache.add(message(4)).unwrap();

    assert!(matches!(
        entry.encoded(&FailingFormat, capacity(8)),
        Err(Error::Encoding(_))
    ));
    assert!(!entry.is_encoded());
    assert!(entry.encoded(&RawFormat, capacity(8)).is_ok());
}

#[test]
fn concurrent_publishers_assign_unique_generations() {
    let cache = GenerationCache::new(capacity(64));
    scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..16 {
                    cache.add(message(1)).unwrap();
                }
            });
        }
    });

    let generations = cache.generations();
    assert_eq!(generations, (1..=64).collect::<Vec<_>>());
}
