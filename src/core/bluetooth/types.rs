//! Shared session types.

use serde::Serialize;

use crate::core::bluetooth::constants::{UUID_CONTROLLER_NOTIFY_CHAR, UUID_CONTROLLER_WRITE_CHAR};
use crate::core::bluetooth::platform::CharacteristicRef;

/// Lifecycle state of a session.
///
/// States advance strictly in order during connect; teardown or handle
/// loss returns to `Disconnected`, and reconnect recovery restarts from
/// `Connecting`. No state is ever skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    ServiceDiscovered,
    CharacteristicsEnumerated,
    Subscribed,
    Active,
}

/// The vendor characteristics found by an enumeration pass.
///
/// Either reference may be absent: a discovery that returns nothing leaves
/// the session without capabilities rather than failing it, and later
/// operations report the missing characteristic instead.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredCharacteristics {
    pub notify: Option<CharacteristicRef>,
    pub write: Option<CharacteristicRef>,
}

impl DiscoveredCharacteristics {
    /// Picks out the notify and write characteristics. A characteristic is
    /// accepted only when both its UUID and its advertised capability flag
    /// match; the device has been seen advertising the right UUID with the
    /// wrong flags.
    pub fn match_from(characteristics: &[CharacteristicRef]) -> Self {
        let notify = characteristics
            .iter()
            .find(|c| c.uuid == UUID_CONTROLLER_NOTIFY_CHAR && c.props.notify)
            .cloned();
        let write = characteristics
            .iter()
            .find(|c| c.uuid == UUID_CONTROLLER_WRITE_CHAR && c.props.write)
            .cloned();
        Self { notify, write }
    }
}
