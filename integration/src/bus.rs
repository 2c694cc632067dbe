//! In-process event bus (§4.4).
//!
//! Publication is synchronous with respect to the caller: `publish` runs
//! every subscriber on the matched topic(s), in subscription order, before
//! returning. A subscriber that panics or returns an error is caught and
//! logged — it never propagates to the publisher, and never prevents the
//! remaining subscribers (on this topic or later topics) from running.

use crate::event::{Event, Topic};
use parking_lot::RwLock;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// A subscriber callback. Boxed so the bus can hold a heterogeneous set of
/// closures per topic.
type Handler = Box<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle returned by [`EventBus::subscribe`], usable with
/// [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

/// Synchronous, in-process multicast over the closed [`Topic`] set.
///
/// Cloning an `EventBus` shares the same underlying subscriber table (it
/// wraps an `Arc`), so a single instance can be handed to every producer and
/// consumer in the engine.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    topics: RwLock<indexmap::IndexMap<Topic, Vec<Subscription>, fnv::FnvBuildHasher>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.inner.topics.read();
        f.debug_struct("EventBus")
            .field(
                "subscribers",
                &topics.iter().map(|(t, subs)| (*t, subs.len())).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(indexmap::IndexMap::default()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register `handler` on `topic`. Returns a handle for
    /// [`EventBus::unsubscribe`].
    pub fn subscribe(&self, topic: Topic, handler: impl Fn(&Event) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.topics.write().entry(topic).or_default().push(Subscription {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a previously-registered subscription. No-op if already
    /// removed or if it never existed on this bus.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut topics = self.inner.topics.write();
        for subs in topics.values_mut() {
            subs.retain(|sub| sub.id != id);
        }
    }

    /// Deliver `event` to every subscriber of every topic it belongs to (per
    /// [`Event::topics`]), in subscription order within each topic. Runs
    /// synchronously on the caller; a subscriber panic is caught, logged,
    /// and does not affect sibling subscribers or the caller.
    pub fn publish(&self, event: Event) {
        let topics = event.topics();
        let guard = self.inner.topics.read();
        for topic in topics {
            let Some(subs) = guard.get(&topic) else {
                continue;
            };
            for sub in subs {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| (sub.handler)(&event)));
                if let Err(payload) = outcome {
                    let message = panic_message(&payload);
                    error!(topic = %topic, %message, "event bus subscriber panicked");
                }
            }
        }
    }

    /// Number of live subscriptions across all topics. Exposed for tests and
    /// diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.inner.topics.read().values().map(Vec::len).sum()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
