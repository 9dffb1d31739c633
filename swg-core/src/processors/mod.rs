//! Consumers and producers attached to the event manager.
//!
//! - `PropensityServer`: Listens to every dispatched event, reports a subset
//!   to the propensity endpoint and answers score queries
//! - `Propensity`: Publisher-facing producer of subscription states and
//!   events
pub mod propensity;
pub mod propensity_server;

pub use propensity::{Propensity, PropensityError};
pub use propensity_server::{CLIENT_ID_COOKIE, GetPropensity, PropensityServer};
