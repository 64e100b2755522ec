//! Telegram adapter (teloxide).
//!
//! This crate implements the `herald-core` `DestinationGateway` and `Notifier`
//! ports over the Telegram Bot API.

pub mod api;
pub mod gateway;
pub mod notifier;

pub use api::{BotApi, MessageExtras, Photo, TelegramApi, TelegramTarget};
pub use gateway::{TelegramGateway, TelegramSettings};
pub use notifier::TelegramNotifier;
