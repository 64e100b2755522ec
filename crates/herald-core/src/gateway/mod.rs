//! Destination gateways: one delivery protocol per provider (Telegram today).

pub mod port;
pub mod registry;
pub mod throttled;

pub use port::{DestinationGateway, UnsupportedGateway};
pub use registry::GatewayRegistry;
