//! Bluetooth session management for the Gear VR Controller.
//! This module owns the connection lifecycle, the injected platform
//! capability, and the pump that turns notifications into state snapshots.

pub mod bluest_backend;
mod commands;
mod connection;
pub mod constants;
#[cfg(test)]
pub(crate) mod fake;
mod notification;
mod platform;
mod types;

// Re-export types that should be publicly accessible
pub use commands::{CommandExecutor, ControllerCommand};
pub use connection::ConnectionManager;
pub use constants::*; // Re-export all constants
pub use notification::NotificationHandler;
pub use platform::{
    BlePlatform, CacheMode, CharacteristicProps, CharacteristicRef, ConnectionEvent,
    ConnectionEventStream, DeviceHandle, PayloadStream, ServiceRef,
};
pub use types::{DiscoveredCharacteristics, SessionState};
