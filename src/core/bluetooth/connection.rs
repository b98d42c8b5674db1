//! Connection lifecycle for the Gear VR Controller.
//! Owns the session state machine: handle resolution, service and
//! characteristic discovery, notification subscription, initialization
//! commands, reconnect recovery and teardown ordering.

use futures_util::StreamExt;
use log::{info, warn};
use tokio::sync::watch;

use crate::core::bluetooth::commands::{CommandExecutor, ControllerCommand};
use crate::core::bluetooth::constants::UUID_CONTROLLER_SERVICE;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::platform::{
    BlePlatform, CacheMode, ConnectionEvent, ConnectionEventStream, DeviceHandle, ServiceRef,
};
use crate::core::bluetooth::types::{DiscoveredCharacteristics, SessionState};
use crate::core::controller::ControllerState;
use crate::error::{CommandError, ConnectError, PlatformError, TeardownError};

/// One active (or torn-down) connection to a controller.
///
/// Exclusively owns its platform handle; the discovered references are
/// valid only while that handle is.
struct Session {
    device_id: String,
    handle: Box<dyn DeviceHandle>,
    service: Option<ServiceRef>,
    characteristics: DiscoveredCharacteristics,
    subscribed: bool,
    state: SessionState,
    notifications: NotificationHandler,
    events: Option<ConnectionEventStream>,
}

impl Session {
    fn new(device_id: String, handle: Box<dyn DeviceHandle>) -> Self {
        Self {
            device_id,
            handle,
            service: None,
            characteristics: DiscoveredCharacteristics::default(),
            subscribed: false,
            state: SessionState::Connecting,
            notifications: NotificationHandler::new(),
            events: None,
        }
    }
}

/// Owns at most one session and drives it through its lifecycle.
///
/// At most one lifecycle operation (connect, reconnect recovery, teardown)
/// may be in flight at a time; every operation takes `&mut self`, so the
/// borrow checker enforces this.
pub struct ConnectionManager<P: BlePlatform> {
    platform: P,
    session: Option<Session>,
}

impl<P: BlePlatform> ConnectionManager<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            session: None,
        }
    }

    /// Connects to the device behind `device_id` and runs the full
    /// initialization sequence: resolve handle, register the
    /// connection-status listener, discover the vendor service and its
    /// characteristics, enable notifications, then issue the high-frequency
    /// and sensor-streaming commands in order.
    ///
    /// Any prior session is torn down first; if that fails, no new
    /// connection is attempted. On a mid-sequence failure the partial
    /// session is kept (nothing is rolled back) so the caller can decide
    /// to tear it down or retry.
    ///
    /// Returns a receiver over decoded state snapshots.
    pub async fn connect(
        &mut self,
        device_id: &str,
    ) -> Result<watch::Receiver<ControllerState>, ConnectError> {
        self.teardown().await.map_err(ConnectError::PriorTeardown)?;

        info!("connecting to device {}", device_id);
        let handle = self
            .platform
            .resolve_device(device_id)
            .await
            .map_err(ConnectError::Resolve)?;
        let mut session = Session::new(device_id.to_string(), handle);

        let events = session
            .handle
            .connection_events()
            .await
            .map_err(ConnectError::Platform)?;
        session.events = Some(events);

        let result = Self::initialize_session(&mut session).await;
        let state_rx = session.notifications.subscribe();
        self.session = Some(session);
        result?;

        info!("device {} connected", device_id);
        Ok(state_rx)
    }

    /// Tears the current session down, telling the remote device to stop
    /// notifying before the local handle is released.
    ///
    /// If the notify configuration cannot be cleared the session is left
    /// in place, still considered subscribed, and the failure is returned;
    /// a later retry will attempt the descriptor write again. Without an
    /// active subscription no descriptor write is attempted at all.
    pub async fn teardown(&mut self) -> Result<(), TeardownError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if session.subscribed {
            if let Some(notify) = session.characteristics.notify.clone() {
                if let Err(err) = session.handle.unsubscribe(&notify).await {
                    warn!("unsubscribe failed, keeping session: {}", err);
                    self.session = Some(session);
                    return Err(TeardownError::Unsubscribe(err));
                }
            }
            session.notifications.detach();
            session.subscribed = false;
        }

        // Drop the status listener before the handle goes away.
        session.events = None;
        session
            .handle
            .disconnect()
            .await
            .map_err(TeardownError::Disconnect)?;
        info!("device {} disconnected", session.device_id);
        Ok(())
    }

    /// Writes a single command to the controller.
    pub async fn run_command(&mut self, command: ControllerCommand) -> Result<(), CommandError> {
        let session = self
            .session
            .as_ref()
            .ok_or(CommandError::CharacteristicMissing)?;
        CommandExecutor::new(
            session.handle.as_ref(),
            session.characteristics.write.as_ref(),
        )
        .run_command(command)
        .await
    }

    /// Waits for the next connection-status change reported by the
    /// platform. Returns `None` once the stream ends or no session exists.
    pub async fn next_connection_event(&mut self) -> Option<ConnectionEvent> {
        let session = self.session.as_mut()?;
        session.events.as_mut()?.next().await
    }

    /// Applies one connection-status change to the session.
    pub async fn handle_connection_event(
        &mut self,
        event: ConnectionEvent,
    ) -> Result<(), ConnectError> {
        match event {
            ConnectionEvent::Connected => self.on_connection_restored().await,
            ConnectionEvent::Disconnected => {
                if let Some(session) = self.session.as_mut() {
                    info!("device {} reported disconnected", session.device_id);
                    session.state = SessionState::Disconnected;
                }
                Ok(())
            }
        }
    }

    /// Applies connection-status changes as they arrive until the platform
    /// closes the event stream or a recovery step fails hard.
    pub async fn drive_connection_events(&mut self) -> Result<(), ConnectError> {
        while let Some(event) = self.next_connection_event().await {
            self.handle_connection_event(event).await?;
        }
        Ok(())
    }

    /// Reconnect recovery: re-runs discovery through the two
    /// initialization commands against the retained handle. The remote
    /// GATT server may have been re-enumerated, so cached characteristic
    /// references are never reused.
    pub async fn on_connection_restored(&mut self) -> Result<(), ConnectError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        info!(
            "device {} restored, re-running initialization",
            session.device_id
        );
        session.state = SessionState::Connecting;
        Self::initialize_session(session).await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|session| session.state)
            .unwrap_or(SessionState::Disconnected)
    }

    /// Whether the remote notify configuration is set and a listener is
    /// attached.
    pub fn is_subscribed(&self) -> bool {
        self.session
            .as_ref()
            .map(|session| session.subscribed)
            .unwrap_or(false)
    }

    /// A receiver over decoded state snapshots for the current session.
    pub fn controller_state(&self) -> Option<watch::Receiver<ControllerState>> {
        self.session
            .as_ref()
            .map(|session| session.notifications.subscribe())
    }

    /// Discovery through initialization, shared by connect and reconnect
    /// recovery.
    ///
    /// Discovery that reports nothing (or fails for reasons other than a
    /// missing radio) degrades to an empty capability set: the session
    /// completes without references and later operations report the
    /// missing characteristic. A failed notify-descriptor write or a
    /// non-retryable command failure aborts the sequence.
    async fn initialize_session(session: &mut Session) -> Result<(), ConnectError> {
        session.notifications.detach();
        session.subscribed = false;
        session.characteristics = DiscoveredCharacteristics::default();
        session.service = None;

        let services = match session.handle.discover_services(CacheMode::Uncached).await {
            Ok(services) => services,
            Err(err @ PlatformError::RadioUnavailable) => return Err(ConnectError::Platform(err)),
            Err(err) => {
                warn!("service discovery failed, continuing with none: {}", err);
                Vec::new()
            }
        };
        session.service = services
            .into_iter()
            .find(|service| service.uuid == UUID_CONTROLLER_SERVICE);
        session.state = SessionState::ServiceDiscovered;

        if let Some(service) = session.service.clone() {
            let characteristics = match session
                .handle
                .discover_characteristics(&service, CacheMode::Uncached)
                .await
            {
                Ok(characteristics) => characteristics,
                Err(err @ PlatformError::RadioUnavailable) => {
                    return Err(ConnectError::Platform(err));
                }
                Err(err) => {
                    warn!(
                        "characteristic discovery failed, continuing with none: {}",
                        err
                    );
                    Vec::new()
                }
            };
            session.characteristics = DiscoveredCharacteristics::match_from(&characteristics);
        } else {
            warn!("vendor service not found on device {}", session.device_id);
        }
        session.state = SessionState::CharacteristicsEnumerated;

        if let Some(notify) = session.characteristics.notify.clone() {
            let payloads = session
                .handle
                .subscribe(&notify)
                .await
                .map_err(ConnectError::Subscribe)?;
            session.notifications.attach(payloads);
            session.subscribed = true;
            session.state = SessionState::Subscribed;
        } else {
            warn!(
                "notify characteristic not found, session will receive no input from {}",
                session.device_id
            );
        }

        CommandExecutor::new(
            session.handle.as_ref(),
            session.characteristics.write.as_ref(),
        )
        .initialize()
        .await?;

        if session.state == SessionState::Subscribed {
            session.state = SessionState::Active;
        }
        Ok(())
    }
}
