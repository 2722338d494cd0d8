//! Observable ordered container for a node's children.
//!
//! `ObservableList` is the single source of truth for the children of a
//! node. Every mutation announces itself through one `ChangeEvent` carrying
//! the whole affected batch; consumers (the synchronizer) never diff the
//! list themselves.
//!
//! # Event Contract
//!
//! - One event per atomic mutation: `add_all` of N items is one `Added`
//!   event with N items, not N events.
//! - An event carries only additions or only removals, never both.
//! - Empty mutations emit nothing.
//! - Events from one list are observed in mutation order.

use parking_lot::{Mutex, RwLock};

use cloudscape_core::Signal;

/// Whether an event describes additions or removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Items were inserted into the list.
    Added,
    /// Items were removed from the list.
    Removed,
}

/// An immutable description of one atomic list mutation.
#[derive(Clone)]
pub struct ChangeEvent<T> {
    /// Whether the items were added or removed.
    pub kind: ChangeKind,
    /// The affected items, in list order.
    pub items: Vec<T>,
}

/// An ordered list that announces every mutation as a batch event.
///
/// # Thread Safety
///
/// `ObservableList` is `Send + Sync`. Mutations from different threads are
/// serialized; the event for a mutation is emitted while the mutation order
/// lock is still held, so listeners observe events in the same order the
/// mutations were applied. Listeners must therefore not mutate the same
/// list from inside a change handler.
pub struct ObservableList<T> {
    /// Held across mutation plus emission to keep event order equal to
    /// mutation order.
    order: Mutex<()>,
    items: RwLock<Vec<T>>,
    changed: Signal<ChangeEvent<T>>,
}

impl<T: Clone + Send + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> ObservableList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            order: Mutex::new(()),
            items: RwLock::new(Vec::new()),
            changed: Signal::new(),
        }
    }

    /// Get a snapshot of the current items.
    pub fn items(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Number of items in the list.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// The change signal. One emission per atomic mutation.
    pub fn on_changed(&self) -> &Signal<ChangeEvent<T>> {
        &self.changed
    }

    /// Disconnect every change listener (bulk teardown).
    pub fn remove_all_listeners(&self) {
        self.changed.disconnect_all();
    }

    /// Append one item, emitting one `Added` event.
    pub fn add(&self, item: T) {
        self.add_all(vec![item]);
    }

    /// Append a batch of items, emitting exactly one `Added` event.
    ///
    /// An empty batch emits nothing.
    pub fn add_all(&self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        let _order = self.order.lock();
        self.items.write().extend(items.iter().cloned());
        self.changed.emit(ChangeEvent {
            kind: ChangeKind::Added,
            items,
        });
    }

    /// Remove every item matching the predicate, emitting exactly one
    /// `Removed` event carrying the removed subset.
    ///
    /// Returns the removed items. No event is emitted when nothing matched.
    pub fn remove_if<F>(&self, pred: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let _order = self.order.lock();
        let removed = {
            let mut items = self.items.write();
            let mut removed = Vec::new();
            items.retain(|item| {
                if pred(item) {
                    removed.push(item.clone());
                    false
                } else {
                    true
                }
            });
            removed
        };
        if !removed.is_empty() {
            self.changed.emit(ChangeEvent {
                kind: ChangeKind::Removed,
                items: removed.clone(),
            });
        }
        removed
    }

    /// Remove all items, emitting exactly one `Removed` event.
    pub fn clear(&self) {
        let _order = self.order.lock();
        let removed = std::mem::take(&mut *self.items.write());
        if !removed.is_empty() {
            self.changed.emit(ChangeEvent {
                kind: ChangeKind::Removed,
                items: removed,
            });
        }
    }

    /// Replace the whole contents: one `Removed` event for the departing
    /// items followed by one `Added` event for the arriving items.
    ///
    /// This is a mutation of the same list, not a list swap; the listener
    /// set survives. Either event is skipped when its subset is empty.
    pub fn replace_all(&self, new_items: Vec<T>) {
        let _order = self.order.lock();
        let removed = {
            let mut items = self.items.write();
            std::mem::replace(&mut *items, new_items.clone())
        };
        if !removed.is_empty() {
            self.changed.emit(ChangeEvent {
                kind: ChangeKind::Removed,
                items: removed,
            });
        }
        if !new_items.is_empty() {
            self.changed.emit(ChangeEvent {
                kind: ChangeKind::Added,
                items: new_items,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn collect_events(list: &ObservableList<i32>) -> Arc<Mutex<Vec<(ChangeKind, Vec<i32>)>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        list.on_changed().connect(move |event| {
            events_clone.lock().push((event.kind, event.items.clone()));
        });
        events
    }

    #[test]
    fn test_add_all_emits_one_event() {
        let list = ObservableList::new();
        let events = collect_events(&list);

        list.add_all(vec![1, 2, 3]);

        assert_eq!(list.items(), vec![1, 2, 3]);
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (ChangeKind::Added, vec![1, 2, 3]));
    }

    #[test]
    fn test_empty_mutations_emit_nothing() {
        let list: ObservableList<i32> = ObservableList::new();
        let events = collect_events(&list);

        list.add_all(vec![]);
        list.remove_if(|_| true);
        list.clear();
        list.replace_all(vec![]);

        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_remove_if_emits_removed_subset() {
        let list = ObservableList::new();
        list.add_all(vec![1, 2, 3, 4, 5]);
        let events = collect_events(&list);

        let removed = list.remove_if(|n| n % 2 == 0);

        assert_eq!(removed, vec![2, 4]);
        assert_eq!(list.items(), vec![1, 3, 5]);
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (ChangeKind::Removed, vec![2, 4]));
    }

    #[test]
    fn test_replace_all_removed_then_added() {
        let list = ObservableList::new();
        list.add_all(vec![1, 2]);
        let events = collect_events(&list);

        list.replace_all(vec![10, 20, 30]);

        assert_eq!(list.items(), vec![10, 20, 30]);
        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], (ChangeKind::Removed, vec![1, 2]));
        assert_eq!(events[1], (ChangeKind::Added, vec![10, 20, 30]));
    }

    #[test]
    fn test_replace_all_from_empty_skips_removed() {
        let list = ObservableList::new();
        let events = collect_events(&list);

        list.replace_all(vec![7]);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (ChangeKind::Added, vec![7]));
    }

    #[test]
    fn test_listener_set_survives_replace_all() {
        let list = ObservableList::new();
        let events = collect_events(&list);

        list.replace_all(vec![1]);
        list.replace_all(vec![2]);

        // Both replacements observed by the same listener.
        assert_eq!(events.lock().len(), 3);
    }

    #[test]
    fn test_remove_all_listeners() {
        let list = ObservableList::new();
        let events = collect_events(&list);

        list.add(1);
        list.remove_all_listeners();
        list.add(2);

        assert_eq!(events.lock().len(), 1);
        assert_eq!(list.on_changed().connection_count(), 0);
    }

    #[test]
    fn test_concurrent_mutations_keep_batches_atomic() {
        let list = Arc::new(ObservableList::new());
        let events = collect_events(&list);

        let mut handles = vec![];
        for t in 0..4 {
            let list_clone = list.clone();
            handles.push(std::thread::spawn(move || {
                let base = t * 100;
                list_clone.add_all(vec![base, base + 1, base + 2]);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(list.len(), 12);
        let events = events.lock();
        assert_eq!(events.len(), 4);
        for (kind, items) in events.iter() {
            assert_eq!(*kind, ChangeKind::Added);
            assert_eq!(items.len(), 3);
            // Each batch arrives whole, never interleaved with another.
            assert_eq!(items[1], items[0] + 1);
            assert_eq!(items[2], items[0] + 2);
        }
    }
}
