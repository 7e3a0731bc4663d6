use crate::error::BusError;
use crate::message::BusMessage;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::MessageBus;
use std::sync::{Arc, Mutex};

/// In-process bus.
///
/// Emitted messages are delivered to local subscribers and kept in a log,
/// which makes it the transport for tests and for running the skill
/// without a host.
#[derive(Clone, Default)]
pub struct MemoryBus {
    registry: SubscriptionRegistry,
    log: Arc<Mutex<Vec<BusMessage>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a message as if another bus client had sent it.
    pub fn inject(&self, message: BusMessage) -> usize {
        self.registry.dispatch(&message)
    }

    /// Every message emitted through this bus so far.
    pub fn emitted(&self) -> Vec<BusMessage> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Emitted messages with the given name.
    pub fn emitted_named(&self, name: &str) -> Vec<BusMessage> {
        self.emitted()
            .into_iter()
            .filter(|m| m.msg_type == name)
            .collect()
    }
}

impl MessageBus for MemoryBus {
    fn emit(&self, message: BusMessage) -> Result<(), BusError> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
        self.registry.dispatch(&message);
        Ok(())
    }

    fn subscribe(&self, names: &[&str]) -> Subscription {
        self.registry.subscribe(names)
    }
}
