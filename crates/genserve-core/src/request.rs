//! Request parsing.
//!
//! The name components following the subscription prefix obey:
//!
//! ```text
//! request := generation-component? segment-component?
//! ```
//!
//! A generation component is a number tagged with the channel's generation
//! marker; a segment component is a number tagged with
//! [`SEGMENT_MARKER`](crate::SEGMENT_MARKER). A segment component is only
//! meaningful after a generation component, so one in first position is
//! rejected.

use crate::{Component, Name, ParseError};

/// Publish-order version number of a message on a channel.
pub type Generation = u64;

/// Transport-level hint choosing among the children of a name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildSelector {
    Leftmost,
    Rightmost,
}

/// How a request picks a generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Selector {
    Earliest,
    Latest,
    Exact(Generation),
}

/// A structured request produced by [`parse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub selector: Selector,
    pub segment: Option<u64>,
}

/// An inbound request as delivered by a face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub child_selector: Option<ChildSelector>,
}

impl Interest {
    pub const fn new(name: Name) -> Self {
        Self {
            name,
            child_selector: None,
        }
    }

    #[must_use]
    pub const fn with_child_selector(mut self, child_selector: ChildSelector) -> Self {
        self.child_selector = Some(child_selector);
        self
    }
}

/// Parses the components following the subscription prefix.
///
/// With no generation component the hint decides the selector: `Rightmost`
/// selects the latest generation, anything else the earliest.
///
/// # Errors
///
/// Returns a [`ParseError`] if the components do not match the grammar.
pub fn parse(
    suffix: &[Component],
    hint: Option<ChildSelector>,
    generation_marker: u8,
) -> Result<RequestDescriptor, ParseError> {
    let mut components = suffix.iter();

    let Some(first) = components.next() else {
        let selector = match hint {
            Some(ChildSelector::Rightmost) => Selector::Latest,
            Some(ChildSelector::Leftmost) | None => Selector::Earliest,
        };
        return Ok(RequestDescriptor {
            selector,
            segment: None,
        });
    };

    let generation = first
        .to_number_with_marker(generation_marker)
        .ok_or(ParseError::UnexpectedComponent {
            position: 0,
            expected: "generation",
        })?;

    let segment = match components.next() {
        None => None,
        Some(component) => Some(component.to_segment().ok_or(
            ParseError::UnexpectedComponent {
                position: 1,
                expected: "segment",
            },
        )?),
    };

    let trailing = components.count();
    if trailing > 0 {
        return Err(ParseError::TrailingComponents { count: trailing });
    }

    Ok(RequestDescriptor {
        selector: Selector::Exact(generation),
        segment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: u8 = 42;

    fn generation(value: u64) -> Component {
        Component::from_number_with_marker(value, MARKER)
    }

    #[test]
    fn hints_select_earliest_or_latest() {
        let left = parse(&[], Some(ChildSelector::Leftmost), MARKER).unwrap();
        let right = parse(&[], Some(ChildSelector::Rightmost), MARKER).unwrap();
        let none = parse(&[], None, MARKER).unwrap();

        assert_eq!(left.selector, Selector::Earliest);
        assert_eq!(right.selector, Selector::Latest);
        assert_eq!(none.selector, Selector::Earliest);
        assert_eq!(right.segment, None);
    }

    #[test]
    fn generation_component_wins_over_hint() {
        let descriptor = parse(&[generation(2)], Some(ChildSelector::Rightmost), MARKER).unwrap();
        assert_eq!(descriptor.selector, Selector::Exact(2));
        assert_eq!(descriptor.segment, None);
    }

    #[test]
    fn generation_then_segment() {
        let descriptor = parse(&[generation(3), Component::from_segment(1)], None, MARKER).unwrap();
        assert_eq!(
            descriptor,
            RequestDescriptor {
                selector: Selector::Exact(3),
                segment: Some(1),
            }
        );
    }

    #[test]
    fn bare_segment_is_rejected() {
        let err = parse(&[Component::from_segment(999)], None, MARKER).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedComponent {
                position: 0,
                expected: "generation",
            }
        );
    }

    #[test]
    fn wrong_marker_and_trailing_components_are_rejected() {
        let other_marker = Component::from_number_with_marker(2, 0xFD);
        assert!(parse(&[other_marker], None, MARKER).is_err());
        assert!(parse(&[generation(1), Component::from("x")], None, MARKER).is_err());

        let err = parse(
            &[generation(1), Component::from_segment(0), Component::from("x")],
            None,
            MARKER,
        )
        .unwrap_err();
        assert_eq!(err, ParseError::TrailingComponents { count: 1 });
    }
}
