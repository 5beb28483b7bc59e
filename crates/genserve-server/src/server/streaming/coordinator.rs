use crate::server::{
    face::Face,
    service::config::{ChannelConfig, SendPolicy},
    telemetry::{increment_segments_sent, increment_transport_errors},
};
use genserve_core::{Component, Encoded, Error, Generation, Result, Segment};

/// Publishes the response segments of one resolved generation.
///
/// With an explicit `requested` index only that segment is sent. Otherwise the
/// channel's [`SendPolicy`] decides between segment 0 alone and the full run
/// starting at 0.
///
/// A failed `put` is logged and counted but not retried; the remaining
/// segments are still attempted.
///
/// # Returns
///
/// The number of segments the face accepted (at least one).
///
/// # Errors
///
/// - [`Error::SegmentOutOfRange`] if `requested` is past the last segment.
///   Nothing is sent.
/// - [`Error::Transport`] if no segment could be sent.
pub fn respond(
    config: &ChannelConfig,
    face: &dyn Face,
    generation: Generation,
    encoded: &Encoded,
    requested: Option<u64>,
) -> Result<u64> {
    let count = encoded.segment_count();
    let indices = match requested {
        Some(segment) if segment >= count => {
            return Err(Error::SegmentOutOfRange { segment, count });
        }
        Some(segment) => segment..segment + 1,
        None => match config.send_policy {
            SendPolicy::First => 0..1,
            SendPolicy::All => 0..count,
        },
    };

    let base = config.prefix.append(Component::from_number_with_marker(
        generation,
        config.generation_marker,
    ));
    let final_index = count - 1;

    let mut sent = 0;
    let mut last_error = None;
    for index in indices {
        let Some(payload) = encoded.segment(index) else {
            break;
        };
        let segment = Segment {
            name: base.append(Component::from_segment(index)),
            generation,
            index,
            final_index,
            payload,
        };

        match face.put(&segment) {
            Ok(()) => sent += 1,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to publish {}: {e}", segment.name);
                increment_transport_errors();
                last_error = Some(e);
            }
        }
    }

    increment_segments_sent(sent);
    if sent == 0 {
        return Err(last_error.unwrap_or_else(|| Error::Transport {
            context: format!("no segment of generation {generation} was sent"),
        }));
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use core::num::NonZeroUsize;
    use genserve_core::Name;
    use std::sync::Mutex;

    const MARKER: u8 = 42;

    #[derive(Default)]
    struct Recorder {
        segments: Mutex<Vec<Segment>>,
        fail_index: Option<u64>,
    }

    impl Face for Recorder {
        fn put(&self, segment: &Segment) -> Result<()> {
            if self.fail_index == Some(segment.index) {
                return Err(Error::Transport {
                    context: "refused".to_string(),
                });
            }
            self.segments.lock().unwrap().push(segment.clone());
            Ok(())
        }
    }

    fn config(send_policy: SendPolicy) -> ChannelConfig {
        let mut config = ChannelConfig::new(Name::from_uri("/test/name").unwrap());
        config.generation_marker = MARKER;
        config.max_segment_size = NonZeroUsize::new(4).unwrap();
        config.send_policy = send_policy;
        config
    }

    fn encoded(len: usize) -> Encoded {
        Encoded::new(
            Bytes::from((0..len).map(|i| i as u8).collect::<Vec<_>>()),
            NonZeroUsize::new(4).unwrap(),
        )
    }

    #[test]
    fn sends_full_run_by_default() {
        let face = Recorder::default();
        let sent = respond(&config(SendPolicy::All), &face, 7, &encoded(10), None).unwrap();
        assert_eq!(sent, 3);

        let segments = face.segments.lock().unwrap();
        let indices: Vec<_> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, [0, 1, 2]);
        assert!(segments.iter().all(|s| s.final_index == 2 && s.generation == 7));
        assert_eq!(
            segments[0].name.get(-2).and_then(|c| c.to_number_with_marker(MARKER)),
            Some(7)
        );
        assert_eq!(
            segments.iter().flat_map(|s| s.payload.to_vec()).collect::<Vec<_>>(),
            (0..10).collect::<Vec<u8>>()
        );
    }

    #[test]
    fn first_policy_sends_segment_zero() {
        let face = Recorder::default();
        let sent = respond(&config(SendPolicy::First), &face, 1, &encoded(10), None).unwrap();
        assert_eq!(sent, 1);
        assert_eq!(face.segments.lock().unwrap()[0].index, 0);
    }

    #[test]
    fn explicit_segment_is_bounds_checked() {
        let face = Recorder::default();
        let sent = respond(&config(SendPolicy::All), &face, 1, &encoded(10), Some(1)).unwrap();
        assert_eq!(sent, 1);
        assert_eq!(face.segments.lock().unwrap()[0].payload.as_ref(), [4, 5, 6, 7]);

        let err = respond(&config(SendPolicy::All), &face, 1, &encoded(10), Some(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::SegmentOutOfRange {
                segment: 3,
                count: 3
            }
        ));
        assert_eq!(face.segments.lock().unwrap().len(), 1);
    }

    #[test]
    fn transport_failures_are_skipped_not_retried() {
        let face = Recorder {
            fail_index: Some(1),
            ..Recorder::default()
        };
        let sent = respond(&config(SendPolicy::All), &face, 1, &encoded(10), None).unwrap();
        assert_eq!(sent, 2);

        let face = Recorder {
            fail_index: Some(0),
            ..Recorder::default()
        };
        let err = respond(&config(SendPolicy::All), &face, 1, &encoded(3), None).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
