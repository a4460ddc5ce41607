//! Id-keyed listener registry for adapter events.
//!
//! Listeners are invoked inline on the emitting thread; keep them fast. The
//! orchestrator's listeners only enqueue a signal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A callback registered for a parameterless event.
pub type Listener = Box<dyn Fn() + Send + Sync>;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Handle returned by a subscription, used to unsubscribe.
///
/// Ids are unique within the process, so removing an id from a registry
/// that never issued it is a harmless no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn Fn() + Send + Sync>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Arc<dyn Fn() + Send + Sync>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.entries().push((id, Arc::from(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries().iter().any(|(existing, _)| *existing == id)
    }

    /// Invoke every listener registered at the time of the call.
    ///
    /// The lock is released before invoking, so a listener may add or
    /// remove subscriptions on this registry. Returns the number invoked.
    pub fn emit(&self) -> usize {
        let snapshot: Vec<_> = self.entries().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in &snapshot {
            listener();
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ListenerRegistry::new();

        let c1 = Arc::clone(&counter);
        registry.add(Box::new(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&counter);
        registry.add(Box::new(move || {
            c2.fetch_add(10, Ordering::SeqCst);
        }));

        assert_eq!(registry.emit(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ListenerRegistry::new();
        let c = Arc::clone(&counter);
        let id = registry.add(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.emit(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let registry = Arc::new(ListenerRegistry::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let reg = Arc::clone(&registry);
        let own_id = Arc::clone(&slot);
        let id = registry.add(Box::new(move || {
            if let Some(id) = *own_id.lock().unwrap() {
                reg.remove(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        assert_eq!(registry.emit(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_unique_across_registries() {
        let a = ListenerRegistry::new();
        let b = ListenerRegistry::new();
        let id_a = a.add(Box::new(|| {}));
        let id_b = b.add(Box::new(|| {}));
        assert_ne!(id_a, id_b);
        assert!(!b.remove(id_a));
        assert!(a.contains(id_a));
    }
}
