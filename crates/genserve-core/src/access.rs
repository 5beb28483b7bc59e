//! Capability-based authorization.
//!
//! A [`Policy`] is an explicit table of [`Capability`] records. Every
//! privileged operation at the service boundary (starting or stopping a
//! service, publishing, serving) is checked with [`Policy::check`] and nowhere
//! else.

use crate::{Error, Name, Result};
use core::fmt;

/// A privileged operation on a named resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Publish,
    Serve,
    Start,
    Stop,
}

impl Action {
    const fn bit(self) -> u8 {
        match self {
            Self::Publish => 1 << 0,
            Self::Serve => 1 << 1,
            Self::Start => 1 << 2,
            Self::Stop => 1 << 3,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Publish => "publish",
            Self::Serve => "serve",
            Self::Start => "start",
            Self::Stop => "stop",
        };
        f.write_str(s)
    }
}

/// A set of [`Action`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ActionSet(u8);

impl ActionSet {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b1111);

    pub fn of(actions: &[Action]) -> Self {
        actions.iter().fold(Self::NONE, |set, &action| set.with(action))
    }

    #[must_use]
    pub const fn with(self, action: Action) -> Self {
        Self(self.0 | action.bit())
    }

    pub const fn contains(self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }
}

/// Grants `subject` the `actions` on every name under `resource`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    pub subject: String,
    pub resource: Name,
    pub actions: ActionSet,
}

impl Capability {
    pub fn new(subject: impl Into<String>, resource: Name, actions: ActionSet) -> Self {
        Self {
            subject: subject.into(),
            resource,
            actions,
        }
    }

    fn covers(&self, subject: &str, resource: &Name, action: Action) -> bool {
        self.subject == subject
            && self.actions.contains(action)
            && self.resource.is_prefix_of(resource)
    }
}

/// An explicit table of capabilities. Anything not granted is denied.
#[derive(Clone, Debug, Default)]
pub struct Policy {
    capabilities: Vec<Capability>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn grant(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] unless some capability for
    /// `subject` covers `resource` with `action`.
    pub fn check(&self, subject: &str, resource: &Name, action: Action) -> Result<()> {
        if self
            .capabilities
            .iter()
            .any(|capability| capability.covers(subject, resource, action))
        {
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::warn!("Denied {subject} {action} on {resource}");

        Err(Error::PermissionDenied {
            subject: subject.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn grants_cover_sub_names_only() {
        let policy = Policy::new().grant(Capability::new(
            "node",
            name("/status"),
            ActionSet::of(&[Action::Publish, Action::Serve]),
        ));

        assert!(policy.check("node", &name("/status"), Action::Publish).is_ok());
        assert!(policy.check("node", &name("/status/cpu"), Action::Serve).is_ok());
        assert!(policy.check("node", &name("/other"), Action::Publish).is_err());
        assert!(policy.check("node", &name("/status"), Action::Stop).is_err());
        assert!(matches!(
            policy.check("guest", &name("/status"), Action::Publish),
            Err(Error::PermissionDenied { .. })
        ));
    }

    #[test]
    fn action_sets() {
        assert!(ActionSet::ALL.contains(Action::Stop));
        assert!(!ActionSet::NONE.contains(Action::Start));
        assert_eq!(
            ActionSet::of(&[Action::Start, Action::Stop]),
            ActionSet::NONE.with(Action::Start).with(Action::Stop)
        );
    }
}
