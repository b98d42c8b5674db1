//! Client-side driver for the Samsung Gear VR controller.
//!
//! The controller is a BLE handheld exposing a single vendor GATT service:
//! a write characteristic taking 16-bit mode commands and a notify
//! characteristic streaming fixed-layout 60-byte input packets. This crate
//! owns the two failure-prone pieces — the connection lifecycle state
//! machine (discovery, subscription, initialization, reconnect recovery,
//! teardown ordering) and the packet decoder — while device scanning and
//! any UI stay with the host application. The host injects a
//! [`BlePlatform`] implementation (the bundled [`BluestPlatform`] or its
//! own) and observes decoded [`ControllerState`] snapshots through a watch
//! channel.

pub mod core;
pub mod error;

pub use crate::core::bluetooth::bluest_backend::BluestPlatform;
pub use crate::core::bluetooth::{
    BlePlatform, CacheMode, CharacteristicProps, CharacteristicRef, CommandExecutor,
    ConnectionEvent, ConnectionManager, ControllerCommand, DeviceHandle, SessionState,
};
pub use crate::core::controller::{ControllerState, decode_packet};
pub use crate::error::{CommandError, ConnectError, DecodeError, PlatformError, TeardownError};
