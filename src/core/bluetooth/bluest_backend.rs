//! Platform capability backed by the `bluest` cross-platform BLE library.
//! The host's scanner registers discovered devices here; sessions then
//! resolve them by identifier without this crate doing any discovery UI.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device, Service};
use futures_util::StreamExt;
use log::{info, warn};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::platform::{
    BlePlatform, CacheMode, CharacteristicProps, CharacteristicRef, ConnectionEvent,
    ConnectionEventStream, DeviceHandle, PayloadStream, ServiceRef, channel_stream,
};
use crate::error::PlatformError;

/// Production platform implementation.
pub struct BluestPlatform {
    adapter: Adapter,
    /// Devices the host has registered, keyed by platform identifier.
    devices: Arc<Mutex<HashMap<String, Device>>>,
}

impl BluestPlatform {
    /// Binds to the default adapter and waits for it to become available.
    pub async fn new() -> Result<Self, PlatformError> {
        let adapter = Adapter::default()
            .await
            .ok_or(PlatformError::RadioUnavailable)?;
        adapter.wait_available().await.map_err(map_error)?;
        info!("bluetooth adapter is available");
        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Makes a scanned device resolvable by its platform identifier and
    /// returns that identifier.
    pub async fn register_device(&self, device: Device) -> String {
        let id = device.id().to_string();
        self.devices.lock().await.insert(id.clone(), device);
        id
    }
}

#[async_trait]
impl BlePlatform for BluestPlatform {
    async fn resolve_device(&self, device_id: &str) -> Result<Box<dyn DeviceHandle>, PlatformError> {
        let device = self
            .devices
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| PlatformError::DeviceNotFound(device_id.to_string()))?;

        if !device.is_connected().await {
            info!("initiating connection to {}", device_id);
            self.adapter
                .connect_device(&device)
                .await
                .map_err(map_error)?;
        }

        Ok(Box::new(BluestHandle {
            adapter: self.adapter.clone(),
            device,
            services: StdMutex::new(Vec::new()),
            characteristics: StdMutex::new(Vec::new()),
            subscriptions: StdMutex::new(HashMap::new()),
        }))
    }
}

/// One live `bluest` connection. Discovery results are kept here so the
/// value refs handed out can be mapped back to their backing objects.
struct BluestHandle {
    adapter: Adapter,
    device: Device,
    services: StdMutex<Vec<Service>>,
    characteristics: StdMutex<Vec<Characteristic>>,
    subscriptions: StdMutex<HashMap<usize, CancellationToken>>,
}

impl BluestHandle {
    fn service(&self, reference: &ServiceRef) -> Result<Service, PlatformError> {
        self.services
            .lock()
            .unwrap()
            .get(reference.key())
            .cloned()
            .ok_or(PlatformError::StaleReference)
    }

    fn characteristic(&self, reference: &CharacteristicRef) -> Result<Characteristic, PlatformError> {
        self.characteristics
            .lock()
            .unwrap()
            .get(reference.key())
            .cloned()
            .ok_or(PlatformError::StaleReference)
    }
}

#[async_trait]
impl DeviceHandle for BluestHandle {
    async fn discover_services(&self, cache: CacheMode) -> Result<Vec<ServiceRef>, PlatformError> {
        let services = match cache {
            CacheMode::Uncached => self.device.discover_services().await,
            CacheMode::Cached => self.device.services().await,
        }
        .map_err(map_error)?;

        let refs = services
            .iter()
            .enumerate()
            .map(|(key, service)| ServiceRef::new(service.uuid(), key))
            .collect();

        // Re-enumeration invalidates every previously handed-out ref.
        *self.services.lock().unwrap() = services;
        self.characteristics.lock().unwrap().clear();
        Ok(refs)
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceRef,
        cache: CacheMode,
    ) -> Result<Vec<CharacteristicRef>, PlatformError> {
        let service = self.service(service)?;
        let discovered = match cache {
            CacheMode::Uncached => service.discover_characteristics().await,
            CacheMode::Cached => service.characteristics().await,
        }
        .map_err(map_error)?;

        let mut described = Vec::with_capacity(discovered.len());
        for characteristic in &discovered {
            let props = characteristic.properties().await.map_err(map_error)?;
            described.push((
                characteristic.uuid(),
                CharacteristicProps {
                    notify: props.notify,
                    write: props.write,
                },
            ));
        }

        let mut table = self.characteristics.lock().unwrap();
        let base = table.len();
        let refs = described
            .into_iter()
            .enumerate()
            .map(|(offset, (uuid, props))| CharacteristicRef::new(uuid, props, base + offset))
            .collect();
        table.extend(discovered);
        Ok(refs)
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<PayloadStream, PlatformError> {
        let inner = self.characteristic(characteristic)?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (payload_tx, payload_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();

        // The notify stream borrows its characteristic, so both live in
        // the forwarding task; dropping the stream on cancellation clears
        // the remote notify configuration.
        tokio::spawn(async move {
            let stream = match inner.notify().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(map_error(err)));
                    return;
                }
            };
            let mut stream = std::pin::pin!(stream);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_for_task.cancelled() => break,
                    next = stream.next() => match next {
                        Some(Ok(payload)) => {
                            if payload_tx.send(payload).is_err() {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            warn!("error in notification stream: {}", err);
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(PlatformError::StaleReference),
        }
        self.subscriptions
            .lock()
            .unwrap()
            .insert(characteristic.key(), cancel);
        Ok(channel_stream(payload_rx))
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicRef) -> Result<(), PlatformError> {
        let token = self
            .subscriptions
            .lock()
            .unwrap()
            .remove(&characteristic.key());
        if let Some(token) = token {
            token.cancel();
        }
        Ok(())
    }

    async fn write_value(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        self.characteristic(characteristic)?
            .write(payload)
            .await
            .map_err(map_error)
    }

    async fn connection_events(&self) -> Result<ConnectionEventStream, PlatformError> {
        let adapter = self.adapter.clone();
        let device = self.device.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let events = match adapter.device_connection_events(&device).await {
                Ok(events) => {
                    let _ = ready_tx.send(Ok(()));
                    events
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(map_error(err)));
                    return;
                }
            };
            let mut events = std::pin::pin!(events);
            while let Some(event) = events.next().await {
                let mapped = match event {
                    bluest::ConnectionEvent::Connected => ConnectionEvent::Connected,
                    bluest::ConnectionEvent::Disconnected => ConnectionEvent::Disconnected,
                };
                if event_tx.send(mapped).is_err() {
                    break;
                }
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(PlatformError::StaleReference),
        }
        Ok(channel_stream(event_rx))
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        let tokens: Vec<CancellationToken> = self
            .subscriptions
            .lock()
            .unwrap()
            .drain()
            .map(|(_, token)| token)
            .collect();
        for token in tokens {
            token.cancel();
        }

        self.adapter
            .disconnect_device(&self.device)
            .await
            .map_err(map_error)
    }
}

/// Maps backend errors onto the driver taxonomy. The three write
/// rejections the controller is known to produce become their dedicated
/// variants so callers can classify them as retryable.
fn map_error(err: bluest::Error) -> PlatformError {
    use bluest::error::{AttError, ErrorKind};

    let mapped = match err.kind() {
        ErrorKind::Protocol(AttError::WRITE_NOT_PERMITTED) => Some(PlatformError::WriteNotPermitted),
        ErrorKind::Protocol(AttError::INVALID_PDU) => Some(PlatformError::InvalidPdu),
        ErrorKind::Protocol(AttError::INSUFFICIENT_AUTHORIZATION) => {
            Some(PlatformError::AccessDenied)
        }
        ErrorKind::NotAuthorized => Some(PlatformError::AccessDenied),
        ErrorKind::AdapterUnavailable => Some(PlatformError::RadioUnavailable),
        _ => None,
    };
    mapped.unwrap_or(PlatformError::Backend(err))
}
