//! Subscription bookkeeping shared by every transport.

use crate::message::BusMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Buffered messages per subscription before new ones are dropped.
const SUBSCRIPTION_CAPACITY: usize = 256;

type SubscriberMap = HashMap<String, Vec<(u64, mpsc::Sender<BusMessage>)>>;

/// Routes incoming messages to subscribers by message name.
///
/// Uses `std::sync::RwLock`: every acquisition is a short map operation
/// and never spans an `.await`.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    subscribers: Arc<RwLock<SubscriberMap>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one receiver for all of `names`.
    pub fn subscribe(&self, names: &[&str]) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        {
            let mut subscribers = self
                .subscribers
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for name in names {
                subscribers
                    .entry((*name).to_string())
                    .or_default()
                    .push((id, tx.clone()));
            }
        }
        tracing::debug!(subscription = id, names = ?names, "registered bus subscription");
        Subscription {
            id,
            names: names.iter().map(|n| (*n).to_string()).collect(),
            receiver: rx,
            registry: self.clone(),
        }
    }

    /// Delivers `message` to every subscriber of its name.
    ///
    /// Returns the number of subscribers that accepted it. Full queues drop
    /// the message with a warning rather than stalling the transport.
    pub fn dispatch(&self, message: &BusMessage) -> usize {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(listeners) = subscribers.get(&message.msg_type) else {
            return 0;
        };
        let mut delivered = 0;
        for (id, sender) in listeners {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    subscription = id,
                    msg_type = %message.msg_type,
                    "dropping bus message for slow subscriber: {}",
                    e
                ),
            }
        }
        delivered
    }

    /// Number of live subscriptions for `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .map_or(0, Vec::len)
    }

    fn remove(&self, id: u64, names: &[String]) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for name in names {
            if let Some(listeners) = subscribers.get_mut(name) {
                listeners.retain(|(sub_id, _)| *sub_id != id);
                if listeners.is_empty() {
                    subscribers.remove(name);
                }
            }
        }
    }
}

/// A live subscription. Cancelled explicitly or on drop.
pub struct Subscription {
    id: u64,
    names: Vec<String>,
    receiver: mpsc::Receiver<BusMessage>,
    registry: SubscriptionRegistry,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next message. `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.receiver.recv().await
    }

    /// Returns a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.receiver.try_recv().ok()
    }

    /// Stops delivery and unregisters from every name.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id, &self.names);
        tracing::debug!(subscription = self.id, "cancelled bus subscription");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(name: &str) -> BusMessage {
        BusMessage::new(name, json!({}))
    }

    #[tokio::test]
    async fn dispatch_reaches_matching_subscribers_only() {
        let registry = SubscriptionRegistry::new();
        let mut a = registry.subscribe(&["alpha", "beta"]);
        let mut b = registry.subscribe(&["beta"]);

        assert_eq!(registry.dispatch(&msg("alpha")), 1);
        assert_eq!(registry.dispatch(&msg("beta")), 2);
        assert_eq!(registry.dispatch(&msg("gamma")), 0);

        assert_eq!(a.recv().await.unwrap().msg_type, "alpha");
        assert_eq!(a.recv().await.unwrap().msg_type, "beta");
        assert_eq!(b.recv().await.unwrap().msg_type, "beta");
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn cancel_unregisters_every_name() {
        let registry = SubscriptionRegistry::new();
        let sub = registry.subscribe(&["alpha", "beta"]);
        let _other = registry.subscribe(&["beta"]);
        assert_eq!(registry.subscriber_count("alpha"), 1);
        assert_eq!(registry.subscriber_count("beta"), 2);

        sub.cancel();
        assert_eq!(registry.subscriber_count("alpha"), 0);
        assert_eq!(registry.subscriber_count("beta"), 1);
        assert_eq!(registry.dispatch(&msg("alpha")), 0);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let registry = SubscriptionRegistry::new();
        let _sub = registry.subscribe(&["alpha"]);
        for _ in 0..SUBSCRIPTION_CAPACITY {
            assert_eq!(registry.dispatch(&msg("alpha")), 1);
        }
        assert_eq!(registry.dispatch(&msg("alpha")), 0);
    }
}
