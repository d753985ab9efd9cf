//! Per-name listener table and the synchronous dispatch path.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use eventrelay_core::{Event, Payload};

/// Callback invoked with the event and its bare payload.
pub type Listener = Arc<dyn Fn(&Event, Option<&Payload>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(u64);

/// Name → ordered listeners. A name is active iff its list is non-empty.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    by_name: BTreeMap<String, Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    /// Register one listener under every name in `names`.
    pub(crate) fn insert(&mut self, names: &[String], listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        for name in names {
            self.by_name
                .entry(name.clone())
                .or_default()
                .push((id, listener.clone()));
        }
        id
    }

    /// Remove the listener from `names`; returns whether anything was removed.
    pub(crate) fn remove(&mut self, id: ListenerId, names: &[String]) -> bool {
        let mut removed = false;
        for name in names {
            let Some(listeners) = self.by_name.get_mut(name) else {
                continue;
            };
            let before = listeners.len();
            listeners.retain(|(entry, _)| *entry != id);
            removed |= listeners.len() != before;
            if listeners.is_empty() {
                self.by_name.remove(name);
            }
        }
        removed
    }

    pub(crate) fn listeners_for(&self, name: &str) -> Vec<Listener> {
        self.by_name
            .get(name)
            .map(|listeners| listeners.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }

    /// Sorted names with at least one listener.
    pub(crate) fn active_names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.by_name.clear();
    }
}

/// Run every listener registered for `event.name()`.
///
/// The registry lock is released before any listener runs, so listeners may
/// subscribe, unsubscribe or trigger. A panicking listener is logged and the
/// remaining listeners still run. Returns the number of listeners invoked.
pub(crate) fn dispatch(registry: &Mutex<ListenerRegistry>, event: &Event) -> usize {
    let listeners = registry
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .listeners_for(event.name());

    for listener in &listeners {
        let outcome = catch_unwind(AssertUnwindSafe(|| listener(event, event.payload())));
        if outcome.is_err() {
            tracing::error!(event = %event.name(), "event listener panicked");
        }
    }
    listeners.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = counter.clone();
        Arc::new(move |_: &Event, _: Option<&Payload>| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn active_names_are_sorted_and_deduplicated() {
        let mut registry = ListenerRegistry::default();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.insert(&names(&["b", "a"]), counting(&counter));
        registry.insert(&names(&["a"]), counting(&counter));
        assert_eq!(registry.active_names(), names(&["a", "b"]));
    }

    #[test]
    fn remove_only_drops_that_listener() {
        let mut registry = ListenerRegistry::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = registry.insert(&names(&["a"]), counting(&counter));
        registry.insert(&names(&["a"]), counting(&counter));

        assert!(registry.remove(first, &names(&["a"])));
        assert_eq!(registry.listeners_for("a").len(), 1);
        assert!(!registry.remove(first, &names(&["a"])), "second removal is a no-op");
    }

    #[test]
    fn name_becomes_inactive_with_last_listener() {
        let mut registry = ListenerRegistry::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = registry.insert(&names(&["a", "b"]), counting(&counter));
        registry.remove(id, &names(&["a", "b"]));
        assert!(registry.active_names().is_empty());
    }

    #[test]
    fn dispatch_survives_panicking_listener() {
        let registry = Mutex::new(ListenerRegistry::default());
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = registry.lock().expect("lock");
            guard.insert(
                &names(&["boom"]),
                Arc::new(|_: &Event, _: Option<&Payload>| panic!("listener failure")),
            );
            guard.insert(&names(&["boom"]), counting(&counter));
        }

        let event = Event::new("boom").expect("event");
        assert_eq!(dispatch(&registry, &event), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
