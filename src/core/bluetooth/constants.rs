//! Protocol constants for the Gear VR Controller.
//! UUIDs, the notification payload layout, and the unit-conversion factors
//! applied to raw sensor samples.

use uuid::Uuid;

/// The UUID of the controller's vendor service ("OculusThreemote" in ASCII)
pub const UUID_CONTROLLER_SERVICE: Uuid =
    Uuid::from_u128(0x4f63756c_7573_2054_6872_65656d6f7465);

/// The UUID of the controller's notification characteristic
pub const UUID_CONTROLLER_NOTIFY_CHAR: Uuid =
    Uuid::from_u128(0xc8c51726_81bc_483b_a052_f7a14ea3d281);

/// The UUID of the controller's write characteristic
pub const UUID_CONTROLLER_WRITE_CHAR: Uuid =
    Uuid::from_u128(0xc8c51726_81bc_483b_a052_f7a14ea3d282);

/// Length of an input notification payload in bytes. Payloads of any other
/// length are dropped without decoding.
pub const EVENT_PACKET_LEN: usize = 60;

/// Offset of the first accelerometer axis (three i16 LE values, 2-byte stride)
pub const OFFSET_ACCEL: usize = 4;

/// Offset of the first gyroscope axis (three i16 LE values, 2-byte stride)
pub const OFFSET_GYRO: usize = 10;

/// Offset of the first magnetometer axis (three i16 LE values, 2-byte stride)
pub const OFFSET_MAG: usize = 32;

/// Offset of the three bytes holding both 10-bit touchpad axes
pub const OFFSET_TOUCHPAD: usize = 54;

/// Offset of the button status byte
pub const OFFSET_BUTTONS: usize = 58;

/// Button bit positions within the status byte
pub const BUTTON_TRIGGER: u8 = 1 << 0;
pub const BUTTON_HOME: u8 = 1 << 1;
pub const BUTTON_BACK: u8 = 1 << 2;
pub const BUTTON_TOUCHPAD: u8 = 1 << 3;
pub const BUTTON_VOLUME_UP: u8 = 1 << 4;
pub const BUTTON_VOLUME_DOWN: u8 = 1 << 5;

/// Raw sensor samples are scaled up by this before unit conversion.
pub const SENSOR_RAW_SCALE: f32 = 10000.0;

/// Standard gravitational acceleration, m/s² per g
pub const ACCEL_GRAVITY: f32 = 9.80665;

/// Device-specific accelerometer calibration divisor
pub const ACCEL_DIVISOR: f32 = 2048.0;

/// Empirical accelerometer correction, applied last
pub const ACCEL_FACTOR: f32 = 0.00001;

/// Degrees-to-radians conversion
pub const GYRO_DEG_TO_RAD: f32 = 0.017453292;

/// Device-specific gyroscope calibration divisor
pub const GYRO_DIVISOR: f32 = 14.285;

/// Empirical gyroscope correction, applied last
pub const GYRO_FACTOR: f32 = 0.0001;

/// Magnetometer raw unit to µT
pub const MAG_FACTOR: f32 = 0.06;
