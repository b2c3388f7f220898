//! EventBus - synchronous keyed publish/subscribe.
//!
//! Design:
//! - Subscriptions are stored per key, in registration order.
//! - `post` snapshots the list for the key before invoking anything, so a
//!   handler added during a post never sees that post.
//! - Each snapshot entry is re-checked right before it runs: a subscription
//!   removed by an earlier handler of the same post is skipped, and a `once`
//!   subscription is removed before its handler is called.
//! - The lock is never held while a handler runs. Handlers may subscribe,
//!   unsubscribe and post again (re-entrancy is the normal case for
//!   dependency resolution).
//! - Handler panics are not caught; they unwind into the caller of `post`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handler type stored by the bus.
pub type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Token returned by `on`/`once`, used to unsubscribe.
///
/// Closures have no identity of their own, so the token stands in for "the
/// handler that was registered".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription<P> {
    id: SubscriptionId,
    once: bool,
    handler: Handler<P>,
}

/// Keyed, synchronous event bus.
///
/// `K` is the discriminator handlers register against (a `TaskStatus` for
/// tasks and managers, `()` for a plain signal). `P` is the payload handed to
/// every handler by reference.
pub struct EventBus<K, P> {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<K, Vec<Subscription<P>>>>,
}

/// Bus without a discriminator or payload: a one-key signal.
pub type Signal = EventBus<(), ()>;

impl<K, P> EventBus<K, P>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe `handler` to every post of `key` until removed with `off`.
    ///
    /// Registering the same closure twice yields two independent
    /// subscriptions; both run.
    pub fn on<F>(&self, key: K, handler: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe(key, false, Arc::new(handler))
    }

    /// Subscribe `handler` to the next post of `key` only.
    pub fn once<F>(&self, key: K, handler: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe(key, true, Arc::new(handler))
    }

    /// Remove a subscription.
    ///
    /// Returns `false` (and does nothing) when `id` is not registered under
    /// `key`, e.g. because a `once` subscription already fired.
    pub fn off(&self, key: &K, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        let Some(list) = subscriptions.get_mut(key) else {
            return false;
        };
        let Some(index) = list.iter().position(|s| s.id == id) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            subscriptions.remove(key);
        }
        true
    }

    /// Invoke every handler currently subscribed to `key`, in registration
    /// order, on the calling thread.
    ///
    /// Posting a key nobody listens to is a no-op.
    pub fn post(&self, key: &K, payload: &P) {
        let snapshot: Vec<SubscriptionId> = match self.lock().get(key) {
            Some(list) => list.iter().map(|s| s.id).collect(),
            None => return,
        };

        for id in snapshot {
            let Some(handler) = self.claim(key, id) else {
                continue;
            };
            handler(payload);
        }
    }

    /// Number of live subscriptions for `key`.
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.lock().get(key).map_or(0, Vec::len)
    }

    /// Is there no subscription at all, for any key?
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn subscribe(&self, key: K, once: bool, handler: Handler<P>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(key)
            .or_default()
            .push(Subscription { id, once, handler });
        id
    }

    /// Look `id` up again right before running it. One-shot subscriptions are
    /// removed here, before the handler gets a chance to run.
    fn claim(&self, key: &K, id: SubscriptionId) -> Option<Handler<P>> {
        let mut subscriptions = self.lock();
        let list = subscriptions.get_mut(key)?;
        let index = list.iter().position(|s| s.id == id)?;

        if !list[index].once {
            return Some(Arc::clone(&list[index].handler));
        }

        let subscription = list.remove(index);
        if list.is_empty() {
            subscriptions.remove(key);
        }
        Some(subscription.handler)
    }

    // Handlers never run under the lock, so poisoning can only come from a
    // panic inside the bus itself; the map is still consistent then.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Vec<Subscription<P>>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, P> Default for EventBus<K, P>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> fmt::Debug for EventBus<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions = self
            .subscriptions
            .lock()
            .map(|s| s.values().map(Vec::len).sum::<usize>())
            .unwrap_or_default();
        f.debug_struct("EventBus")
            .field("subscriptions", &subscriptions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let log = Arc::clone(&log);
            move |entry: &str| log.lock().unwrap().push(entry.to_owned())
        };
        (log, sink)
    }

    #[test]
    fn post_without_subscribers_is_noop() {
        let bus: EventBus<&str, u32> = EventBus::new();
        bus.post(&"nobody", &1);
        assert!(bus.is_empty());
    }

    #[test]
    fn on_fires_every_post_in_registration_order() {
        let bus: EventBus<&str, u32> = EventBus::new();
        let (log, sink) = recorder();

        let first = sink.clone();
        bus.on("k", move |n| first(&format!("a{n}")));
        let second = sink.clone();
        bus.on("k", move |n| second(&format!("b{n}")));

        bus.post(&"k", &1);
        bus.post(&"k", &2);

        assert_eq!(*log.lock().unwrap(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn keys_are_isolated() {
        let bus: EventBus<u8, ()> = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.on(1, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.post(&2, &());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.post(&1, &());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_registrations_are_all_honored() {
        let bus: Signal = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handler = {
            let hits = Arc::clone(&hits);
            move |_: &()| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        };
        bus.on((), handler.clone());
        bus.on((), handler);

        bus.post(&(), &());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_fires_a_single_time() {
        let bus: Signal = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.once((), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.post(&(), &());
        bus.post(&(), &());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(&()), 0);
    }

    #[test]
    fn off_removes_and_is_idempotent() {
        let bus: EventBus<&str, ()> = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = bus.on("k", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.off(&"k", id));
        assert!(!bus.off(&"k", id));
        assert!(!bus.off(&"other", id));

        bus.post(&"k", &());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn off_after_once_fired_returns_false() {
        let bus: Signal = EventBus::new();
        let id = bus.once((), |_| {});
        bus.post(&(), &());
        assert!(!bus.off(&(), id));
    }

    #[test]
    fn handler_added_during_post_misses_that_post() {
        let bus: Arc<Signal> = Arc::new(EventBus::new());
        let (log, sink) = recorder();

        let inner_bus = Arc::clone(&bus);
        let outer_sink = sink.clone();
        bus.once((), move |_| {
            outer_sink("outer");
            let late_sink = sink.clone();
            inner_bus.on((), move |_| late_sink("late"));
        });

        bus.post(&(), &());
        assert_eq!(*log.lock().unwrap(), vec!["outer"]);

        bus.post(&(), &());
        assert_eq!(*log.lock().unwrap(), vec!["outer", "late"]);
    }

    #[test]
    fn handler_removed_during_post_is_skipped() {
        let bus: Arc<EventBus<&'static str, ()>> = Arc::new(EventBus::new());
        let (log, sink) = recorder();

        let victim_slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let remover_bus = Arc::clone(&bus);
        let remover_slot = Arc::clone(&victim_slot);
        let remover_sink = sink.clone();
        bus.on("k", move |_| {
            remover_sink("remover");
            if let Some(id) = *remover_slot.lock().unwrap() {
                remover_bus.off(&"k", id);
            }
        });
        let victim_sink = sink.clone();
        let victim = bus.on("k", move |_| victim_sink("victim"));
        *victim_slot.lock().unwrap() = Some(victim);

        bus.post(&"k", &());
        assert_eq!(*log.lock().unwrap(), vec!["remover"]);
    }

    #[test]
    fn once_handler_that_resubscribes_does_not_recurse() {
        let bus: Arc<Signal> = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));

        fn arm(bus: &Arc<Signal>, hits: &Arc<AtomicUsize>) {
            let again_bus = Arc::clone(bus);
            let again_hits = Arc::clone(hits);
            bus.once((), move |_| {
                again_hits.fetch_add(1, Ordering::SeqCst);
                arm(&again_bus, &again_hits);
            });
        }
        arm(&bus, &hits);

        bus.post(&(), &());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(&()), 1);

        bus.post(&(), &());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn nested_post_from_handler_is_allowed() {
        let bus: Arc<EventBus<u8, ()>> = Arc::new(EventBus::new());
        let (log, sink) = recorder();

        let relay = Arc::clone(&bus);
        let relay_sink = sink.clone();
        bus.on(1, move |_| {
            relay_sink("one");
            relay.post(&2, &());
        });
        bus.on(2, move |_| sink("two"));

        bus.post(&1, &());
        assert_eq!(*log.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn handler_panic_reaches_the_poster_and_bus_stays_usable() {
        let bus: Signal = EventBus::new();
        bus.once((), |_| panic!("boom"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.post(&(), &())));
        assert!(result.is_err());

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.on((), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        bus.post(&(), &());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
