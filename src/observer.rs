//! Observer capability and the copy-on-write membership list.
//!
//! The registry only holds [`Weak`] references: membership never keeps a
//! presentation component alive. Writers swap in a fresh list under the lock;
//! fan-out works on a [`Members`] snapshot with the lock released, so
//! callbacks may register or unregister without deadlocking or observing a
//! half-built list.
//!
//! Entries added with [`ObserverRegistry::register_pending`] stay out of
//! fan-out until [`ObserverRegistry::activate`] is called. The engine
//! activates on its own thread right before queueing the newcomer's snapshot,
//! so that snapshot is the first thing the observer hears.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub trait TimerObserver: Send + Sync {
    fn on_tick(&self, elapsed_ms: u64);
    fn on_state_changed(&self, running: bool, paused: bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Clone)]
struct Entry {
    id: ObserverId,
    observer: Weak<dyn TimerObserver>,
    active: bool,
}

/// Active observers captured at one instant.
#[derive(Clone)]
pub struct Members {
    entries: Arc<Vec<Entry>>,
}

impl Members {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ObserverRegistry {
    entries: Mutex<Arc<Vec<Entry>>>,
    next_id: AtomicU64,
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Arc<Vec<Entry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<Vec<Entry>> {
        Arc::clone(&self.lock())
    }

    fn insert<O>(&self, observer: &Arc<O>, active: bool) -> ObserverId
    where
        O: TimerObserver + 'static,
    {
        let observer: Arc<dyn TimerObserver> = observer.clone();
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.lock();
        let mut next: Vec<Entry> = entries
            .iter()
            .filter(|e| e.observer.strong_count() > 0)
            .cloned()
            .collect();
        next.push(Entry {
            id,
            observer: Arc::downgrade(&observer),
            active,
        });
        *entries = Arc::new(next);
        id
    }

    /// Adds `observer` to fan-out immediately.
    pub fn register<O>(&self, observer: &Arc<O>) -> ObserverId
    where
        O: TimerObserver + 'static,
    {
        self.insert(observer, true)
    }

    /// Adds `observer` without including it in fan-out yet.
    pub fn register_pending<O>(&self, observer: &Arc<O>) -> ObserverId
    where
        O: TimerObserver + 'static,
    {
        self.insert(observer, false)
    }

    /// Includes a pending entry in fan-out. Returns `false` if `id` is no
    /// longer registered.
    pub fn activate(&self, id: ObserverId) -> bool {
        let mut entries = self.lock();
        if !entries.iter().any(|e| e.id == id) {
            return false;
        }
        let next: Vec<Entry> = entries
            .iter()
            .map(|e| Entry {
                active: e.active || e.id == id,
                ..e.clone()
            })
            .collect();
        *entries = Arc::new(next);
        true
    }

    /// Returns `false` if `id` was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut entries = self.lock();
        let found = entries.iter().any(|e| e.id == id);
        let next: Vec<Entry> = entries
            .iter()
            .filter(|e| e.id != id && e.observer.strong_count() > 0)
            .cloned()
            .collect();
        *entries = Arc::new(next);
        found
    }

    pub fn clear(&self) {
        *self.lock() = Arc::new(Vec::new());
    }

    /// Registered entries, pending ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, id: ObserverId) -> Option<Arc<dyn TimerObserver>> {
        self.snapshot()
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.observer.upgrade())
    }

    pub fn members(&self) -> Members {
        let entries = self
            .snapshot()
            .iter()
            .filter(|e| e.active)
            .cloned()
            .collect();
        Members {
            entries: Arc::new(entries),
        }
    }

    /// Calls `f` for every live member of `members` that is still registered,
    /// in registration order.
    pub fn deliver(&self, members: &Members, mut f: impl FnMut(&dyn TimerObserver)) {
        let current = self.snapshot();
        for entry in members.entries.iter() {
            if !current.iter().any(|e| e.id == entry.id) {
                continue;
            }
            if let Some(observer) = entry.observer.upgrade() {
                f(observer.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        ticks: Mutex<Vec<u64>>,
        states: Mutex<Vec<(bool, bool)>>,
    }

    impl TimerObserver for Counter {
        fn on_tick(&self, elapsed_ms: u64) {
            self.ticks.lock().unwrap().push(elapsed_ms);
        }

        fn on_state_changed(&self, running: bool, paused: bool) {
            self.states.lock().unwrap().push((running, paused));
        }
    }

    #[test]
    fn test_fan_out_to_all() {
        let registry = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        registry.register(&a);
        registry.register(&b);

        let members = registry.members();
        registry.deliver(&members, |o| o.on_tick(40));
        registry.deliver(&members, |o| o.on_state_changed(true, false));

        assert_eq!(*a.ticks.lock().unwrap(), vec![40]);
        assert_eq!(*b.ticks.lock().unwrap(), vec![40]);
        assert_eq!(*b.states.lock().unwrap(), vec![(true, false)]);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let registry = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        let id = registry.register(&a);
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));

        registry.deliver(&registry.members(), |o| o.on_tick(10));
        assert!(a.ticks.lock().unwrap().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_does_not_own_observers() {
        let registry = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        let id = registry.register(&a);
        drop(a);

        assert!(registry.get(id).is_none());
        registry.deliver(&registry.members(), |o| o.on_tick(5));

        // dead entries go away on the next caller-driven write
        let b = Arc::new(Counter::default());
        registry.register(&b);
        assert_eq!(registry.len(), 1);
    }

    struct SelfRemoving {
        registry: Arc<ObserverRegistry>,
        id: Mutex<Option<ObserverId>>,
        calls: Mutex<u32>,
    }

    impl TimerObserver for SelfRemoving {
        fn on_tick(&self, _elapsed_ms: u64) {
            *self.calls.lock().unwrap() += 1;
            if let Some(id) = self.id.lock().unwrap().take() {
                self.registry.unregister(id);
            }
        }

        fn on_state_changed(&self, _running: bool, _paused: bool) {}
    }

    #[test]
    fn test_unregister_during_fan_out() {
        let registry = Arc::new(ObserverRegistry::new());
        let remover = Arc::new(SelfRemoving {
            registry: Arc::clone(&registry),
            id: Mutex::new(None),
            calls: Mutex::new(0),
        });
        let other = Arc::new(Counter::default());
        let id = registry.register(&remover);
        *remover.id.lock().unwrap() = Some(id);
        registry.register(&other);

        registry.deliver(&registry.members(), |o| o.on_tick(1));
        registry.deliver(&registry.members(), |o| o.on_tick(2));

        assert_eq!(*remover.calls.lock().unwrap(), 1);
        assert_eq!(*other.ticks.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_removed_after_capture_is_skipped() {
        let registry = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let id = registry.register(&a);
        registry.register(&b);

        let members = registry.members();
        registry.unregister(id);
        registry.deliver(&members, |o| o.on_tick(9));

        assert!(a.ticks.lock().unwrap().is_empty());
        assert_eq!(*b.ticks.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_pending_excluded_until_activated() {
        let registry = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        let id = registry.register_pending(&a);
        assert_eq!(registry.len(), 1);
        assert!(registry.members().is_empty());

        let before = registry.members();
        assert!(registry.activate(id));
        registry.deliver(&before, |o| o.on_tick(1));
        registry.deliver(&registry.members(), |o| o.on_tick(2));
        assert_eq!(*a.ticks.lock().unwrap(), vec![2]);

        registry.unregister(id);
        assert!(!registry.activate(id));
    }

    #[test]
    fn test_clear_releases_everything() {
        let registry = ObserverRegistry::new();
        let a = Arc::new(Counter::default());
        registry.register(&a);
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(Arc::strong_count(&a), 1);
    }
}
