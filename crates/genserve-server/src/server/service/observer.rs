//! Lifecycle notifications.
//!
//! Observers are called synchronously from the worker handling the request.
//! A successful request raises exactly two events, [`LifecycleEvent::Resolved`]
//! then [`LifecycleEvent::Served`]; a request that resolves to nothing raises a
//! single [`LifecycleEvent::NotFound`]; a malformed request raises none.

use genserve_core::{Generation, Selector};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The selector resolved to a cached (or freshly computed) generation.
    Resolved {
        generation: Generation,
        selector: Selector,
    },
    /// At least one response segment was transmitted.
    Served { generation: Generation, segments: u64 },
    /// Nothing satisfies the selector.
    NotFound { selector: Selector },
}

/// Receives [`LifecycleEvent`]s. Fire-and-forget.
pub trait Observer: Send + Sync {
    fn notify(&self, event: &LifecycleEvent);
}

/// An explicit list of observers, notified in registration order.
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl Observer for ObserverList {
    fn notify(&self, event: &LifecycleEvent) {
        for observer in &self.observers {
            observer.notify(event);
        }
    }
}

/// Forwards events into a channel; a closed receiver drops them.
impl Observer for mpsc::UnboundedSender<LifecycleEvent> {
    fn notify(&self, event: &LifecycleEvent) {
        let _ = self.send(event.clone());
    }
}

/// Writes events to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, _event: &LifecycleEvent) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Lifecycle: {:?}", _event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LifecycleEvent>>);

    impl Observer for Recorder {
        fn notify(&self, event: &LifecycleEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn list_fans_out_in_order() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let list = ObserverList::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(LogObserver));

        let event = LifecycleEvent::NotFound {
            selector: Selector::Exact(9),
        };
        list.notify(&event);

        assert_eq!(first.0.lock().unwrap().as_slice(), [event.clone()]);
        assert_eq!(second.0.lock().unwrap().as_slice(), [event]);
    }

    #[test]
    fn channel_observer_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.notify(&LifecycleEvent::Served {
            generation: 1,
            segments: 2,
        });
    }
}
