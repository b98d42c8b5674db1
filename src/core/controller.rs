//! Gear VR Controller input state and packet decoding.
//! This module maps the 60-byte notification payload onto the typed state
//! snapshot: button flags, touchpad axes, and the inertial/magnetic sensors.

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    ACCEL_DIVISOR, ACCEL_FACTOR, ACCEL_GRAVITY, BUTTON_BACK, BUTTON_HOME, BUTTON_TOUCHPAD,
    BUTTON_TRIGGER, BUTTON_VOLUME_DOWN, BUTTON_VOLUME_UP, EVENT_PACKET_LEN, GYRO_DEG_TO_RAD,
    GYRO_DIVISOR, GYRO_FACTOR, MAG_FACTOR, OFFSET_ACCEL, OFFSET_BUTTONS, OFFSET_GYRO, OFFSET_MAG,
    OFFSET_TOUCHPAD, SENSOR_RAW_SCALE,
};
use crate::error::DecodeError;

/// Last-known decoded input state of the controller.
///
/// A snapshot starts all-zero when its session is created and is updated in
/// place by [`decode_packet`] for every accepted notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// The large touchpad button (a physical click, not a touch)
    pub touchpad_button: bool,
    /// The trigger button on the underside
    pub trigger_button: bool,
    /// The home button on the right side
    pub home_button: bool,
    /// The back button on the left side
    pub back_button: bool,
    pub volume_up_button: bool,
    pub volume_down_button: bool,

    /// Touchpad x axis. Physical range 0..=315, origin at the top left.
    pub touchpad_x: u16,
    /// Touchpad y axis. Physical range 0..=315.
    pub touchpad_y: u16,
    /// Whether a finger is on the touchpad. Derived as `x != 0 && y != 0`,
    /// so a touch resting exactly on the origin reads as inactive; the
    /// device offers no way to tell the two apart.
    pub touchpad_active: bool,

    /// Accelerometer, m/s²
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,

    /// Gyroscope, rad/s
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,

    /// Magnetometer, µT
    pub mag_x: f32,
    pub mag_y: f32,
    pub mag_z: f32,
}

/// Decodes one notification payload into `state`.
///
/// Rejects any payload whose length differs from the fixed packet size and
/// leaves `state` untouched in that case. Fields are written in a fixed
/// order (buttons, touchpad, inertial, magnetic); callers that expose the
/// snapshot to observers must publish it only after this returns.
pub fn decode_packet(state: &mut ControllerState, data: &[u8]) -> Result<(), DecodeError> {
    if data.len() != EVENT_PACKET_LEN {
        return Err(DecodeError::Length { actual: data.len() });
    }

    let status = data[OFFSET_BUTTONS];
    state.trigger_button = status & BUTTON_TRIGGER != 0;
    state.home_button = status & BUTTON_HOME != 0;
    state.back_button = status & BUTTON_BACK != 0;
    state.touchpad_button = status & BUTTON_TOUCHPAD != 0;
    state.volume_up_button = status & BUTTON_VOLUME_UP != 0;
    state.volume_down_button = status & BUTTON_VOLUME_DOWN != 0;

    // The two 10-bit axes are packed across three bytes: x is the low
    // nibble of the first byte plus the high six bits of the second, y is
    // the low two bits of the second plus all of the third.
    state.touchpad_x = (((data[OFFSET_TOUCHPAD] as u16 & 0xF) << 6)
        + ((data[OFFSET_TOUCHPAD + 1] as u16 & 0xFC) >> 2))
        & 0x3FF;
    state.touchpad_y = (((data[OFFSET_TOUCHPAD + 1] as u16 & 0x3) << 8)
        + data[OFFSET_TOUCHPAD + 2] as u16)
        & 0x3FF;
    state.touchpad_active = state.touchpad_x != 0 && state.touchpad_y != 0;

    state.accel_x = accel_axis(data, OFFSET_ACCEL);
    state.accel_y = accel_axis(data, OFFSET_ACCEL + 2);
    state.accel_z = accel_axis(data, OFFSET_ACCEL + 4);

    state.gyro_x = gyro_axis(data, OFFSET_GYRO);
    state.gyro_y = gyro_axis(data, OFFSET_GYRO + 2);
    state.gyro_z = gyro_axis(data, OFFSET_GYRO + 4);

    state.mag_x = mag_axis(data, OFFSET_MAG);
    state.mag_y = mag_axis(data, OFFSET_MAG + 2);
    state.mag_z = mag_axis(data, OFFSET_MAG + 4);

    Ok(())
}

fn raw_axis(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

// The multiply/divide order below is significant: f32 rounding makes the
// result depend on it, and downstream consumers calibrate against these
// exact values.
fn accel_axis(data: &[u8], offset: usize) -> f32 {
    raw_axis(data, offset) as f32 * SENSOR_RAW_SCALE * ACCEL_GRAVITY / ACCEL_DIVISOR * ACCEL_FACTOR
}

fn gyro_axis(data: &[u8], offset: usize) -> f32 {
    raw_axis(data, offset) as f32 * SENSOR_RAW_SCALE * GYRO_DEG_TO_RAD / GYRO_DIVISOR * GYRO_FACTOR
}

fn mag_axis(data: &[u8], offset: usize) -> f32 {
    raw_axis(data, offset) as f32 * MAG_FACTOR
}
