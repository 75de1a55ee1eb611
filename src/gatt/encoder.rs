//! Characteristic payload encoding.
//!
//! Pure, total functions over an already validated [`SimulatedValues`]
//! snapshot. All multi-byte fields are little-endian.

use crate::model::{SimulatedValues, clamp_battery};

/// Heart Rate Measurement flags: UINT8 value, no contact/energy/RR fields.
pub const HRM_FLAGS: u8 = 0x00;

/// Treadmill Data flags: bit 2 total distance, bit 3 inclination and ramp angle.
pub const TREADMILL_FLAGS: u16 = 0x000C;

pub const HEART_RATE_MEASUREMENT_LEN: usize = 2;
pub const TREADMILL_DATA_LEN: usize = 11;

pub fn encode_heart_rate(bpm: u8) -> [u8; HEART_RATE_MEASUREMENT_LEN] {
    [HRM_FLAGS, bpm]
}

/// Layout: flags(2) speed(2) total distance(3) inclination(2) ramp angle(2).
pub fn encode_treadmill_data(values: &SimulatedValues) -> [u8; TREADMILL_DATA_LEN] {
    let mut buf = [0u8; TREADMILL_DATA_LEN];
    buf[0..2].copy_from_slice(&TREADMILL_FLAGS.to_le_bytes());
    buf[2..4].copy_from_slice(&values.speed_centi_kph().to_le_bytes());
    // uint24: the top byte of the u32 does not fit on the wire
    buf[4..7].copy_from_slice(&values.distance_m().to_le_bytes()[..3]);
    buf[7..9].copy_from_slice(&values.incline_deci_pct().to_le_bytes());
    // ramp angle stays 0
    buf
}

pub fn encode_battery_level(pct: u8) -> [u8; 1] {
    [clamp_battery(i64::from(pct))]
}
