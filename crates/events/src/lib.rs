//! Domain events and their in-process distribution.
//!
//! Inventory and request aggregates emit typed events; infrastructure wraps
//! committed events in an [`EventEnvelope`] and publishes them on an
//! [`EventBus`] once the owning unit of work is durable.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
