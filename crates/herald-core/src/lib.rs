//! Core domain + application logic for Herald, a multi-destination post publisher.
//!
//! This crate is intentionally framework-agnostic. Telegram (and future
//! providers) live behind the `DestinationGateway` port implemented in adapter
//! crates.

pub mod config;
pub mod destinations;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod gateway;
pub mod locks;
pub mod logging;
pub mod notify;
pub mod publisher;
pub mod router;
pub mod scheduler;
pub mod splitter;
pub mod store;

#[cfg(test)]
mod test_support;

pub use errors::{Error, Result};
