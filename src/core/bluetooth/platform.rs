//! Injected platform BLE capability.
//! The connection manager never talks to a Bluetooth stack directly; it is
//! handed an implementation of the traits below. The production backend
//! lives in `bluest_backend`; tests script a fake.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::PlatformError;

/// Raw notification payloads delivered for a subscribed characteristic.
pub type PayloadStream = BoxStream<'static, Vec<u8>>;

/// Connection-status changes reported for a device handle.
pub type ConnectionEventStream = BoxStream<'static, ConnectionEvent>;

/// How discovery treats the platform's GATT cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Query the remote device, bypassing any cached enumeration.
    Uncached,
    /// Accept whatever the platform has cached.
    Cached,
}

/// A connection-status change delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

/// Capability flags advertised by a characteristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProps {
    pub notify: bool,
    pub write: bool,
}

/// Reference to a discovered GATT service.
///
/// Valid only while the handle that produced it is live and the discovery
/// has not been re-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub uuid: Uuid,
    key: usize,
}

impl ServiceRef {
    pub fn new(uuid: Uuid, key: usize) -> Self {
        Self { uuid, key }
    }

    /// Opaque key the owning platform uses to find its backing object.
    pub fn key(&self) -> usize {
        self.key
    }
}

/// Reference to a discovered GATT characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicRef {
    pub uuid: Uuid,
    pub props: CharacteristicProps,
    key: usize,
}

impl CharacteristicRef {
    pub fn new(uuid: Uuid, props: CharacteristicProps, key: usize) -> Self {
        Self { uuid, props, key }
    }

    pub fn key(&self) -> usize {
        self.key
    }
}

/// Entry point of the platform capability: resolves a connection handle
/// from an opaque device identifier.
#[async_trait]
pub trait BlePlatform: Send + Sync {
    async fn resolve_device(&self, device_id: &str) -> Result<Box<dyn DeviceHandle>, PlatformError>;
}

/// One platform connection, exclusively owned by a session.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// Enumerate the device's GATT services.
    async fn discover_services(&self, cache: CacheMode)
    -> Result<Vec<ServiceRef>, PlatformError>;

    /// Enumerate a service's characteristics.
    async fn discover_characteristics(
        &self,
        service: &ServiceRef,
        cache: CacheMode,
    ) -> Result<Vec<CharacteristicRef>, PlatformError>;

    /// Write the client characteristic configuration descriptor to Notify
    /// and attach a value-changed listener. The returned stream delivers
    /// every notification payload until `unsubscribe` or handle loss.
    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<PayloadStream, PlatformError>;

    /// Write the client characteristic configuration descriptor back to
    /// None, telling the remote device to stop notifying.
    async fn unsubscribe(&self, characteristic: &CharacteristicRef) -> Result<(), PlatformError>;

    /// Write a value to a characteristic; `Ok` means the remote stack
    /// acknowledged the write, nothing more.
    async fn write_value(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), PlatformError>;

    /// Attach a connection-status listener for this handle.
    async fn connection_events(&self) -> Result<ConnectionEventStream, PlatformError>;

    /// Release the underlying platform connection.
    async fn disconnect(&self) -> Result<(), PlatformError>;
}

/// Adapts an unbounded receiver into the owned stream types above.
pub(crate) fn channel_stream<T: Send + 'static>(
    rx: mpsc::UnboundedReceiver<T>,
) -> BoxStream<'static, T> {
    Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
