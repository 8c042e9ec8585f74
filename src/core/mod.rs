//! Core infrastructure shared by the session and its tools.

pub mod event_bus;

pub use event_bus::{downcast_event, BoxedEvent, EventBus};
