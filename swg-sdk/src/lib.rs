//! Shared wire types for the subscriptions propensity client.
//!
//! The HTTP transport lives behind the `client` cargo feature so crates that
//! only need the objects do not pull in `reqwest`.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
