//! Topic-based event bus for loosely coupled components.
//!
//! The bus lets distant parts of the host application talk to the explorer
//! (and to each other) without structural knowledge of the tree: a publisher
//! names a topic and hands over an opaque payload, and every subscriber of
//! that topic runs synchronously in registration order.
//!
//! Well-known topic names live in [`topics`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cloudscape_core::bus::{EventBus, topics};
//!
//! let bus = EventBus::new();
//!
//! bus.subscribe(topics::FOCUS_RESOURCE, |payload| {
//!     if let Some(id) = payload.downcast_ref::<u64>() {
//!         println!("focus resource {}", id);
//!     }
//! });
//!
//! bus.publish(topics::FOCUS_RESOURCE, Arc::new(17u64));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::logging::targets;

/// Well-known topic names.
pub mod topics {
    /// Select and scroll a resource into view.
    pub const FOCUS_RESOURCE: &str = "explorer.focus_resource";
    /// Draw attention to a resource without changing the selection.
    pub const HIGHLIGHT_RESOURCE: &str = "explorer.highlight_resource";
    /// A resource was created elsewhere and should be revealed.
    pub const RESOURCE_CREATED: &str = "resource.created";
    /// Request a full reload of the explorer contents.
    pub const REFRESH: &str = "explorer.refresh";
}

/// Type-erased payload carried by a published event.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Identifier for a bus subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

struct Subscriber {
    id: SubscriptionId,
    handler: Arc<dyn Fn(&Payload) + Send + Sync>,
}

/// A synchronous publish/subscribe bus keyed by topic string.
///
/// # Thread Safety
///
/// `EventBus` is `Send + Sync`. Handlers run in whichever thread calls
/// [`publish`](Self::publish); a panicking handler is caught and logged,
/// and delivery continues with the remaining subscribers.
#[derive(Default)]
pub struct EventBus {
    /// Per-topic subscriber lists in registration order.
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl EventBus {
    /// Create a new bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to a topic.
    ///
    /// Handlers for one topic run in registration order on publish.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .entry(topic.into())
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Remove a subscription from a topic.
    ///
    /// Returns `true` if the subscription was found and removed.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(list) = subscribers.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(topic);
        }
        removed
    }

    /// Publish a payload to every subscriber of a topic.
    ///
    /// Publishing to a topic with no subscribers is a no-op. The subscriber
    /// list is snapshotted before delivery, so handlers may subscribe or
    /// unsubscribe without deadlocking; such changes take effect on the next
    /// publish.
    pub fn publish(&self, topic: &str, payload: Payload) {
        let handlers: Vec<Arc<dyn Fn(&Payload) + Send + Sync>> = {
            let subscribers = self.subscribers.lock();
            match subscribers.get(topic) {
                Some(list) => list.iter().map(|s| s.handler.clone()).collect(),
                None => return,
            }
        };

        tracing::trace!(
            target: targets::BUS,
            topic,
            subscriber_count = handlers.len(),
            "publishing event"
        );

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&payload))).is_err() {
                tracing::warn!(
                    target: targets::BUS,
                    topic,
                    "subscriber panicked during publish; fault contained"
                );
            }
        }
    }

    /// Get the number of subscribers for a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .get(topic)
            .map_or(0, |list| list.len())
    }
}
