//! Dependencies: named boolean preconditions a task waits on.
//!
//! A dependency is shared (`Arc<dyn Dependency>`); the same instance may gate
//! any number of tasks. Whoever decides the condition flips it; tasks only
//! read it and ask to be told about the next activation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::Signal;

/// Callback registered through [`Dependency::once_active`].
pub type ActivationCallback = Box<dyn Fn() + Send + Sync>;

/// A named condition that a task can wait on.
pub trait Dependency: Send + Sync {
    /// Stable name, used for lookup and diagnostics. Not required to be
    /// unique, although it conventionally is within one task.
    fn name(&self) -> &str;

    /// Current state. No side effects.
    fn is_active(&self) -> bool;

    /// Run `action` on the next activation edge, once.
    ///
    /// This does NOT fire when the dependency is already active. Callers must
    /// check [`Dependency::is_active`] first and only register while it is
    /// still inactive; otherwise the callback waits for an edge that may
    /// never come.
    fn once_active(&self, action: ActivationCallback);
}

/// Reference dependency driven by an explicit [`ToggleDependency::set_active`].
pub struct ToggleDependency {
    name: String,
    active: AtomicBool,
    activated: Signal,
}

impl ToggleDependency {
    /// Create an inactive dependency.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: AtomicBool::new(false),
            activated: Signal::new(),
        }
    }

    /// Convenience for the common "share it between tasks" case.
    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Flip the condition.
    ///
    /// Setting the current value again is a no-op. A false -> true edge runs
    /// every callback registered since the previous edge, exactly once, on
    /// this thread. Going back to false is allowed and notifies nobody.
    pub fn set_active(&self, active: bool) {
        if self.active.swap(active, Ordering::SeqCst) == active {
            return;
        }
        if active {
            tracing::debug!("dependency '{}' became active", self.name);
            self.activated.post(&(), &());
        }
    }

    /// Number of callbacks waiting for the next activation.
    pub fn pending_callbacks(&self) -> usize {
        self.activated.subscriber_count(&())
    }
}

impl Dependency for ToggleDependency {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn once_active(&self, action: ActivationCallback) {
        self.activated.once((), move |_| action());
    }
}

impl fmt::Debug for ToggleDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToggleDependency")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("pending_callbacks", &self.pending_callbacks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(hits: &Arc<AtomicUsize>) -> ActivationCallback {
        let hits = Arc::clone(hits);
        Box::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn starts_inactive_with_its_name() {
        let dep = ToggleDependency::new("gate");
        assert_eq!(dep.name(), "gate");
        assert!(!dep.is_active());
    }

    #[test]
    fn activation_fires_once_callbacks_exactly_once() {
        let dep = ToggleDependency::new("gate");
        let hits = Arc::new(AtomicUsize::new(0));
        dep.once_active(counting(&hits));
        dep.once_active(counting(&hits));
        assert_eq!(dep.pending_callbacks(), 2);

        dep.set_active(true);
        assert!(dep.is_active());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(dep.pending_callbacks(), 0);
    }

    #[test]
    fn setting_same_value_is_noop() {
        let dep = ToggleDependency::new("gate");
        let hits = Arc::new(AtomicUsize::new(0));

        dep.set_active(false);
        dep.set_active(true);
        dep.once_active(counting(&hits));
        dep.set_active(true);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(dep.pending_callbacks(), 1);
    }

    #[test]
    fn registering_while_active_waits_for_next_edge() {
        let dep = ToggleDependency::new("gate");
        dep.set_active(true);

        let hits = Arc::new(AtomicUsize::new(0));
        dep.once_active(counting(&hits));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        dep.set_active(false);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        dep.set_active(true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn each_edge_only_fires_callbacks_registered_before_it() {
        let dep = ToggleDependency::new("gate");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        dep.once_active(counting(&first));
        dep.set_active(true);
        dep.set_active(false);
        dep.once_active(counting(&second));
        dep.set_active(true);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
