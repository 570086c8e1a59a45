//! Ordered observer collections with replay-on-subscribe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned on registration; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Receives values of type `T`. Implemented for plain closures.
///
/// Callbacks run synchronously on the notifying task and must not call back
/// into the component that is notifying them.
pub trait Observer<T>: Send + Sync {
    fn on_change(&self, value: &T);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn on_change(&self, value: &T) {
        self(value)
    }
}

/// Observers kept in registration order.
pub struct ObserverRegistry<O: ?Sized> {
    entries: Vec<(ObserverId, Arc<O>)>,
}

impl<O: ?Sized> Default for ObserverRegistry<O> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<O: ?Sized> ObserverRegistry<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<O>) -> ObserverId {
        let id = ObserverId::next();
        self.entries.push((id, observer));
        id
    }

    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<O>> {
        self.entries.iter().map(|(_, observer)| observer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A current value plus the observers that follow it.
///
/// `subscribe` delivers the current value before it returns, so a subscriber
/// can never miss the state that was already true when it joined.
pub struct Subject<T> {
    value: T,
    observers: ObserverRegistry<dyn Observer<T>>,
}

impl<T> Subject<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            observers: ObserverRegistry::new(),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer<T>>) -> ObserverId {
        observer.on_change(&self.value);
        self.observers.register(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    pub fn publish(&mut self, value: T) {
        self.value = value;
        for observer in self.observers.iter() {
            observer.on_change(&self.value);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<T: PartialEq> Subject<T> {
    /// Publishes only when `value` differs from the current one.
    pub fn publish_if_changed(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.publish(value);
        true
    }
}
