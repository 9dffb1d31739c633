//! Event system of the client.
//!
//! This module provides the analytics event taxonomy, the readiness gate and
//! the [`ClientEventManager`] that fans events out to registered consumers.
//!
//! # Event Flow
//!
//! 1. A producer calls `log_event` (or `log_raw_event` with untrusted JSON)
//! 2. The dispatch task waits for the readiness gate
//! 3. Filterers run in registration order and may cancel the event
//! 4. Listeners run in registration order
//!
//! A failing consumer is logged and skipped; it never reaches the producer.

pub mod manager;
pub mod mapping;
pub mod ready;
pub mod types;

pub use manager::{ClientEventManager, EventFilterer, EventListener};
pub use mapping::{analytics_event_to_publisher_event, publisher_event_to_analytics_event};
pub use ready::{GateClosed, ReadyGate, ReadyTrigger, ready_gate};
pub use types::{
    AdditionalParameters, AnalyticsEvent, ClientEvent, EventOriginator, EventParams,
    EventValidationError, FilterResult,
};
