//! Error types for the driver.
//! Each lifecycle operation surfaces its own error enum so callers can
//! distinguish recoverable write rejections from genuine session loss.

use thiserror::Error;

/// Errors reported by the platform BLE capability.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The remote characteristic refused the write.
    #[error("write not permitted by the remote characteristic")]
    WriteNotPermitted,

    /// The remote stack rejected the protocol data unit.
    #[error("invalid protocol data unit")]
    InvalidPdu,

    /// Access to the attribute was denied.
    #[error("access to the attribute was denied")]
    AccessDenied,

    /// The Bluetooth radio is off or missing; no recovery is possible
    /// without user action.
    #[error("bluetooth radio is not available")]
    RadioUnavailable,

    /// No device is registered under the given platform identifier.
    #[error("no device registered under id {0:?}")]
    DeviceNotFound(String),

    /// A service or characteristic reference outlived the discovery that
    /// produced it.
    #[error("service or characteristic reference is no longer valid")]
    StaleReference,

    /// Any other error from the platform backend.
    #[error("platform backend error: {0}")]
    Backend(#[from] bluest::Error),
}

impl PlatformError {
    /// Whether this is one of the write rejections the controller is known
    /// to produce for characteristics it advertises but does not honor.
    /// These are reported per attempt and never escalate.
    pub fn is_retryable_write(&self) -> bool {
        matches!(
            self,
            Self::WriteNotPermitted | Self::InvalidPdu | Self::AccessDenied
        )
    }
}

/// Errors from `ConnectionManager::connect` and reconnect recovery.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The previous session could not be torn down; no new connection was
    /// attempted.
    #[error("previous session could not be torn down: {0}")]
    PriorTeardown(#[source] TeardownError),

    /// No connection handle could be resolved for the identifier.
    #[error("could not resolve a connection handle: {0}")]
    Resolve(#[source] PlatformError),

    /// The notify configuration descriptor write was rejected.
    #[error("could not enable notifications: {0}")]
    Subscribe(#[source] PlatformError),

    /// An initialization command failed with a non-retryable error.
    #[error("initialization command failed: {0}")]
    Command(#[from] CommandError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Errors from `ConnectionManager::teardown`.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// The remote notify configuration could not be cleared. The session
    /// is still considered subscribed and the handle stays open.
    #[error("remote notify configuration could not be cleared: {0}")]
    Unsubscribe(#[source] PlatformError),

    /// The connection handle could not be released.
    #[error("connection handle could not be released: {0}")]
    Disconnect(#[source] PlatformError),
}

/// Errors from command writes.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No write characteristic is available on this session.
    #[error("no write characteristic available on this session")]
    CharacteristicMissing,

    /// The device rejected the write; it advertises write support it does
    /// not actually honor. Safe to retry or ignore.
    #[error("device rejected the write: {0}")]
    NotSupported(#[source] PlatformError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Errors from packet decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not the fixed event-packet length.
    #[error("input payload is {actual} bytes, expected 60")]
    Length { actual: usize },
}
