//! Message bus plumbing for the voice enrollment skill.
//!
//! The host platform connects skills and plugins through a publish/subscribe
//! bus of named JSON messages. This crate provides:
//!
//! - [`BusMessage`]: the `type` / `data` / `context` envelope
//! - [`Inbound`] / [`Outbound`]: typed payloads, decoded once at the boundary
//! - [`SubscriptionRegistry`]: name-based routing with cancellable
//!   [`Subscription`] handles
//! - [`WsBus`]: a reconnecting WebSocket client for the real bus
//! - [`MemoryBus`]: an in-process bus for tests and offline runs

mod error;
mod memory;
mod message;
pub mod payload;
mod registry;
mod ws;

pub use error::BusError;
pub use memory::MemoryBus;
pub use message::BusMessage;
pub use payload::{Inbound, Outbound, ResponseStatus};
pub use registry::{Subscription, SubscriptionRegistry};
pub use ws::WsBus;

/// A bus the skill can publish to and subscribe on.
pub trait MessageBus: Send + Sync {
    /// Queues `message` for delivery. Never waits on the network.
    fn emit(&self, message: BusMessage) -> Result<(), BusError>;

    /// Registers one receiver for every name in `names`.
    fn subscribe(&self, names: &[&str]) -> Subscription;

    /// Serializes and emits a typed payload.
    fn emit_outbound(&self, outbound: &Outbound) -> Result<(), BusError> {
        self.emit(outbound.to_message()?)
    }
}
