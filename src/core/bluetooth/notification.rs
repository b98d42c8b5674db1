//! Notification handling for the controller's input stream.
//! The pump task spawned here is the single update context for the state
//! snapshot: it decodes each payload into its own copy and publishes the
//! completed batch, so observers never see a half-decoded state.

use futures_util::StreamExt;
use log::{debug, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::platform::PayloadStream;
use crate::core::controller::{ControllerState, decode_packet};

/// Owns the decode pump and the state channel observers subscribe to.
pub struct NotificationHandler {
    state_tx: watch::Sender<ControllerState>,
    pump: Option<(CancellationToken, JoinHandle<()>)>,
}

impl NotificationHandler {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ControllerState::default());
        Self {
            state_tx,
            pump: None,
        }
    }

    /// A receiver over decoded snapshots. Each `changed` tick corresponds
    /// to exactly one accepted notification payload.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state_tx.subscribe()
    }

    /// Attach the payload listener: spawn the pump over `payloads`.
    /// Any previously attached pump is stopped first.
    pub fn attach(&mut self, payloads: PayloadStream) {
        self.detach();

        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();
        let state_tx = self.state_tx.clone();
        let handle = tokio::spawn(async move {
            Self::pump_payloads(payloads, state_tx, cancel_for_task).await;
        });
        self.pump = Some((cancel, handle));
    }

    /// Detach the payload listener, stopping the pump task.
    pub fn detach(&mut self) {
        if let Some((cancel, _handle)) = self.pump.take() {
            cancel.cancel();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.pump.is_some()
    }

    async fn pump_payloads(
        mut payloads: PayloadStream,
        state_tx: watch::Sender<ControllerState>,
        cancel: CancellationToken,
    ) {
        info!("listening for controller notifications");

        // The pump-local snapshot doubles as the decode scratch buffer;
        // nothing else reads it between fills.
        let mut snapshot = state_tx.borrow().clone();
        loop {
            tokio::select! {
                // Cancellation wins over a ready payload so detach is
                // prompt even under a notification burst.
                biased;
                _ = cancel.cancelled() => break,
                next = payloads.next() => match next {
                    Some(data) => {
                        if let Err(err) = decode_packet(&mut snapshot, &data) {
                            // Expected under transient radio conditions.
                            debug!("dropping malformed notification: {}", err);
                            continue;
                        }
                        let _ = state_tx.send(snapshot.clone());
                    }
                    None => break,
                },
            }
        }

        info!("notification stream ended");
    }
}

impl Default for NotificationHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::{EVENT_PACKET_LEN, OFFSET_BUTTONS};
    use crate::core::bluetooth::platform::channel_stream;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn decodes_payloads_into_the_state_channel() {
        let mut handler = NotificationHandler::new();
        let mut state_rx = handler.subscribe();

        let (tx, rx) = mpsc::unbounded_channel();
        handler.attach(channel_stream(rx));

        let mut packet = vec![0u8; EVENT_PACKET_LEN];
        packet[OFFSET_BUTTONS] = 0b0000_0001;
        tx.send(packet).unwrap();

        state_rx.changed().await.unwrap();
        assert!(state_rx.borrow().trigger_button);
    }

    #[tokio::test]
    async fn malformed_payloads_are_dropped_silently() {
        let mut handler = NotificationHandler::new();
        let mut state_rx = handler.subscribe();

        let (tx, rx) = mpsc::unbounded_channel();
        handler.attach(channel_stream(rx));

        // A truncated payload, then a valid one; only the valid payload
        // may surface on the channel.
        tx.send(vec![0xFFu8; 10]).unwrap();
        let mut packet = vec![0u8; EVENT_PACKET_LEN];
        packet[OFFSET_BUTTONS] = 0b0000_0010;
        tx.send(packet).unwrap();

        state_rx.changed().await.unwrap();
        let state = state_rx.borrow_and_update().clone();
        assert!(state.home_button);
        assert!(!state.trigger_button);
        assert!(!state_rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn detach_stops_the_pump() {
        let mut handler = NotificationHandler::new();
        let state_rx = handler.subscribe();

        let (tx, rx) = mpsc::unbounded_channel();
        handler.attach(channel_stream(rx));
        assert!(handler.is_attached());

        handler.detach();
        assert!(!handler.is_attached());

        // Payloads sent after detach never reach the channel.
        let mut packet = vec![0u8; EVENT_PACKET_LEN];
        packet[OFFSET_BUTTONS] = 0b0000_0001;
        let _ = tx.send(packet);
        tokio::task::yield_now().await;
        assert!(!state_rx.has_changed().unwrap());
    }
}
