//! Scripted platform fake for exercising the connection lifecycle.
//! Records every platform call in order and lets tests inject discovery
//! results, write rejections, notification payloads and connection events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    UUID_CONTROLLER_NOTIFY_CHAR, UUID_CONTROLLER_SERVICE, UUID_CONTROLLER_WRITE_CHAR,
};
use crate::core::bluetooth::platform::{
    BlePlatform, CacheMode, CharacteristicProps, CharacteristicRef, ConnectionEvent,
    ConnectionEventStream, DeviceHandle, PayloadStream, ServiceRef, channel_stream,
};
use crate::error::PlatformError;

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeOp {
    ResolveDevice(String),
    DiscoverServices,
    DiscoverCharacteristics(Uuid),
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    WriteValue(Uuid, Vec<u8>),
    WatchConnectionEvents,
    Disconnect,
}

/// A service the fake will report during discovery.
#[derive(Debug, Clone)]
pub struct FakeService {
    pub uuid: Uuid,
    pub characteristics: Vec<(Uuid, CharacteristicProps)>,
}

#[derive(Default)]
struct FakeShared {
    ops: Mutex<Vec<FakeOp>>,
    services: Mutex<Vec<FakeService>>,
    subscribe_fails: AtomicBool,
    unsubscribe_fails: AtomicBool,
    write_rejected: AtomicBool,
    payload_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    event_tx: Mutex<Option<mpsc::UnboundedSender<ConnectionEvent>>>,
}

#[derive(Clone)]
pub struct FakePlatform {
    shared: Arc<FakeShared>,
}

impl FakePlatform {
    /// A platform exposing the vendor service with correctly flagged
    /// notify and write characteristics.
    pub fn with_vendor_service() -> Self {
        Self::with_services(vec![FakeService {
            uuid: UUID_CONTROLLER_SERVICE,
            characteristics: vec![
                (
                    UUID_CONTROLLER_NOTIFY_CHAR,
                    CharacteristicProps {
                        notify: true,
                        write: false,
                    },
                ),
                (
                    UUID_CONTROLLER_WRITE_CHAR,
                    CharacteristicProps {
                        notify: false,
                        write: true,
                    },
                ),
            ],
        }])
    }

    pub fn with_services(services: Vec<FakeService>) -> Self {
        let shared = FakeShared::default();
        *shared.services.lock().unwrap() = services;
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Drains and returns the recorded calls.
    pub fn take_ops(&self) -> Vec<FakeOp> {
        std::mem::take(&mut *self.shared.ops.lock().unwrap())
    }

    /// Ordered payloads of every attempted value write.
    pub fn written_values(&self) -> Vec<Vec<u8>> {
        self.shared
            .ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                FakeOp::WriteValue(_, payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn set_subscribe_fails(&self, fails: bool) {
        self.shared.subscribe_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_unsubscribe_fails(&self, fails: bool) {
        self.shared.unsubscribe_fails.store(fails, Ordering::SeqCst);
    }

    /// When set, every value write is rejected with `WriteNotPermitted`.
    pub fn set_write_rejected(&self, rejected: bool) {
        self.shared.write_rejected.store(rejected, Ordering::SeqCst);
    }

    /// Delivers a notification payload to the subscribed listener.
    pub fn push_payload(&self, payload: Vec<u8>) {
        if let Some(tx) = self.shared.payload_tx.lock().unwrap().as_ref() {
            let _ = tx.send(payload);
        }
    }

    /// Delivers a connection-status change to the registered listener.
    pub fn push_connection_event(&self, event: ConnectionEvent) {
        if let Some(tx) = self.shared.event_tx.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl BlePlatform for FakePlatform {
    async fn resolve_device(&self, device_id: &str) -> Result<Box<dyn DeviceHandle>, PlatformError> {
        self.shared
            .ops
            .lock()
            .unwrap()
            .push(FakeOp::ResolveDevice(device_id.to_string()));
        Ok(Box::new(FakeHandle {
            shared: self.shared.clone(),
        }))
    }
}

struct FakeHandle {
    shared: Arc<FakeShared>,
}

impl FakeHandle {
    fn record(&self, op: FakeOp) {
        self.shared.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl DeviceHandle for FakeHandle {
    async fn discover_services(
        &self,
        _cache: CacheMode,
    ) -> Result<Vec<ServiceRef>, PlatformError> {
        self.record(FakeOp::DiscoverServices);
        let services = self.shared.services.lock().unwrap();
        Ok(services
            .iter()
            .enumerate()
            .map(|(key, service)| ServiceRef::new(service.uuid, key))
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceRef,
        _cache: CacheMode,
    ) -> Result<Vec<CharacteristicRef>, PlatformError> {
        self.record(FakeOp::DiscoverCharacteristics(service.uuid));
        let services = self.shared.services.lock().unwrap();
        let service = services
            .get(service.key())
            .ok_or(PlatformError::StaleReference)?;
        Ok(service
            .characteristics
            .iter()
            .enumerate()
            .map(|(key, &(uuid, props))| CharacteristicRef::new(uuid, props, key))
            .collect())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<PayloadStream, PlatformError> {
        self.record(FakeOp::Subscribe(characteristic.uuid));
        if self.shared.subscribe_fails.load(Ordering::SeqCst) {
            return Err(PlatformError::AccessDenied);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.payload_tx.lock().unwrap() = Some(tx);
        Ok(channel_stream(rx))
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicRef) -> Result<(), PlatformError> {
        self.record(FakeOp::Unsubscribe(characteristic.uuid));
        if self.shared.unsubscribe_fails.load(Ordering::SeqCst) {
            return Err(PlatformError::AccessDenied);
        }
        *self.shared.payload_tx.lock().unwrap() = None;
        Ok(())
    }

    async fn write_value(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        self.record(FakeOp::WriteValue(characteristic.uuid, payload.to_vec()));
        if self.shared.write_rejected.load(Ordering::SeqCst) {
            return Err(PlatformError::WriteNotPermitted);
        }
        Ok(())
    }

    async fn connection_events(&self) -> Result<ConnectionEventStream, PlatformError> {
        self.record(FakeOp::WatchConnectionEvents);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.event_tx.lock().unwrap() = Some(tx);
        Ok(channel_stream(rx))
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        self.record(FakeOp::Disconnect);
        *self.shared.payload_tx.lock().unwrap() = None;
        *self.shared.event_tx.lock().unwrap() = None;
        Ok(())
    }
}
