//! Topic-keyed readiness notifications.
//!
//! The loader registers "all of these named groups are loaded" interest
//! under a [`Topic`] built from the sorted name list. [`ReadinessBus`] is
//! the minimal registry behind that: subscribe, publish, clear. Each
//! publish takes a stable snapshot of the subscriber list, so a callback
//! that re-enters the bus can neither lose nor double-fire the other
//! subscriptions of the same publish.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::resource::ResourceKind;

/// Callback registered under a topic.
pub type ReadyFn = Box<dyn FnMut() + Send>;

/// Composite readiness key: a kind plus a sorted name list.
///
/// Built as a value type rather than a joined string so lookups cannot
/// collide on separator characters inside names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic {
    kind: ResourceKind,
    names: Vec<String>,
}

impl Topic {
    /// Build the topic for `names`, sorting them into canonical order.
    #[must_use]
    pub fn new<S: AsRef<str>>(kind: ResourceKind, names: &[S]) -> Self {
        let mut names: Vec<String> = names.iter().map(|n| n.as_ref().to_owned()).collect();
        names.sort();
        Self { kind, names }
    }

    /// The resource kind this topic is scoped to.
    #[must_use]
    pub fn kind(&self) -> ResourceKind { self.kind }

    /// The sorted names composing this topic.
    #[must_use]
    pub fn names(&self) -> &[String] { &self.names }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.names.join("|"))
    }
}

/// Handle identifying one subscription, returned by
/// [`subscribe`](ReadinessBus::subscribe) and accepted by
/// [`unsubscribe`](ReadinessBus::unsubscribe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(self) -> u64 { self.0 }
}

type Subscriber = (SubscriptionId, Arc<Mutex<ReadyFn>>);

/// Minimal topic-keyed publish/subscribe registry.
#[derive(Default)]
pub struct ReadinessBus {
    topics: Mutex<HashMap<Topic, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl ReadinessBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, HashMap<Topic, Vec<Subscriber>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` under `topic`.
    pub fn subscribe(&self, topic: Topic, callback: ReadyFn) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(Mutex::new(callback))));
        id
    }

    /// Drop the subscription identified by `id`, if it still exists.
    ///
    /// Unknown topics and already-removed ids are tolerated.
    pub fn unsubscribe(&self, topic: &Topic, id: SubscriptionId) {
        let mut topics = self.lock();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|(sid, _)| *sid != id);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Invoke every current subscriber of `topic`, in subscription order.
    ///
    /// Subscriptions are not cleared; the snapshot is taken before the
    /// first callback runs. A callback that re-enters `publish` for its own
    /// topic is skipped by the nested publish (a running callback cannot be
    /// re-entered); every other subscriber still fires.
    pub fn publish(&self, topic: &Topic) {
        let snapshot: Vec<Arc<Mutex<ReadyFn>>> = self
            .lock()
            .get(topic)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for callback in snapshot {
            if let Ok(mut callback) = callback.try_lock() {
                (*callback)();
            }
        }
    }

    /// Drop every subscription under `topic` without invoking anything.
    pub fn clear(&self, topic: &Topic) { self.lock().remove(topic); }

    /// Invoke and drop every current subscriber of `topic`.
    ///
    /// The list is detached before the first callback runs, so a callback
    /// that re-subscribes the same topic survives for the next readiness
    /// transition.
    pub fn flush(&self, topic: &Topic) {
        let Some(subscribers) = self.lock().remove(topic) else {
            return;
        };
        for (_, callback) in subscribers {
            let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
            (*callback)();
        }
    }

    /// Topics with at least one subscription, for readiness sweeps.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> { self.lock().keys().cloned().collect() }
}

impl fmt::Debug for ReadinessBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessBus")
            .field("topics", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
