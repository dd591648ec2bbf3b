pub mod audit;
pub mod commands;
pub mod config;
pub mod custom_id;
pub mod data;
pub mod detectors;
pub mod discord;
pub mod duration;
pub mod error;
pub mod expiry;
pub mod handlers;
pub mod interaction;
pub mod lockdown;
pub mod logging;
pub mod pending;
pub mod platform;
pub mod registry;
pub mod router;
pub mod store;
pub mod strikes;
#[cfg(test)]
pub mod testing;

pub const BOT_NAME: &str = "strikeguard";
pub const COMMAND_TARGET: &str = "strikeguard::command";
pub const ERROR_TARGET: &str = "strikeguard::error";
pub const EVENT_TARGET: &str = "strikeguard::handlers";
pub const AUDIT_TARGET: &str = "strikeguard::audit";
pub const CONSOLE_TARGET: &str = "strikeguard";

pub use data::{Data, DataInner};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
