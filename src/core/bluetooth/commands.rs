//! Gear VR Controller commands.
//! Commands are 16-bit opcodes written to the controller's write
//! characteristic. There is no request/response correlation: success means
//! the remote stack acknowledged the write, never that firmware acted.

use log::{debug, info, warn};

use crate::core::bluetooth::platform::{CharacteristicRef, DeviceHandle};
use crate::error::CommandError;

/// Commands accepted by the controller's write characteristic.
///
/// Several opcodes are accepted by firmware but have no documented effect;
/// they are listed so callers can issue them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Turn all modes off and stop sending data
    Off,
    /// Enable sending of input data
    Sensor,
    /// Firmware update function (undocumented)
    FirmwareUpdateFunc,
    /// Calibration (undocumented)
    Calibrate,
    /// Keep-alive (undocumented)
    KeepAlive,
    /// Setting (undocumented)
    Setting,
    /// Enable low-power mode
    LpmEnable,
    /// Disable low-power mode
    LpmDisable,
    /// Enable high-frequency (VR) mode
    VrMode,
}

impl ControllerCommand {
    /// The command's 16-bit opcode.
    pub fn opcode(self) -> u16 {
        match self {
            Self::Off => 0x0000,
            Self::Sensor => 0x0100,
            Self::FirmwareUpdateFunc => 0x0200,
            Self::Calibrate => 0x0300,
            Self::KeepAlive => 0x0400,
            Self::Setting => 0x0500,
            Self::LpmEnable => 0x0600,
            Self::LpmDisable => 0x0700,
            Self::VrMode => 0x0800,
        }
    }

    /// Wire representation: the opcode serialized little-endian.
    pub fn to_bytes(self) -> [u8; 2] {
        self.opcode().to_le_bytes()
    }
}

/// Issues commands through a session's write characteristic.
pub struct CommandExecutor<'a> {
    handle: &'a dyn DeviceHandle,
    write_char: Option<&'a CharacteristicRef>,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(handle: &'a dyn DeviceHandle, write_char: Option<&'a CharacteristicRef>) -> Self {
        Self { handle, write_char }
    }

    /// Writes a single command and reports whether the remote stack
    /// acknowledged it. Rejections the device is known to produce for
    /// writes it advertises but does not honor come back as
    /// [`CommandError::NotSupported`].
    pub async fn run_command(&self, command: ControllerCommand) -> Result<(), CommandError> {
        let write_char = self.write_char.ok_or(CommandError::CharacteristicMissing)?;

        match self.handle.write_value(write_char, &command.to_bytes()).await {
            Ok(()) => {
                info!("command {:?} acknowledged", command);
                Ok(())
            }
            Err(err) if err.is_retryable_write() => Err(CommandError::NotSupported(err)),
            Err(err) => Err(CommandError::Platform(err)),
        }
    }

    /// Runs the initialization sequence: high-frequency mode, then sensor
    /// streaming, in that order. Skipped entirely when no write
    /// characteristic was discovered. Per-command rejections of the
    /// expected class are logged and do not abort the sequence.
    pub async fn initialize(&self) -> Result<(), CommandError> {
        if self.write_char.is_none() {
            debug!("no write characteristic discovered, skipping initialization commands");
            return Ok(());
        }

        for command in [ControllerCommand::VrMode, ControllerCommand::Sensor] {
            match self.run_command(command).await {
                Ok(()) => {}
                Err(CommandError::NotSupported(err)) => {
                    warn!("device rejected {:?} during initialization: {}", command, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
