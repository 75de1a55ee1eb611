//! Value model for the simulated peripheral.
//!
//! Plain data only. Every mutator is crate-private: the simulator core is the
//! single writer, collaborators receive copies.

use heapless::String;
use serde::Serialize;

/// Heart rate reported before any command arrives.
pub const DEFAULT_HEART_RATE_BPM: u8 = 70;
/// Battery level reported before any command arrives.
pub const DEFAULT_BATTERY_PCT: u8 = 100;
/// Upper bound of the Battery Level characteristic.
pub const MAX_BATTERY_PCT: u8 = 100;

// ── Identity ──────────────────────────────────────────────────

/// Which peripheral the radio currently impersonates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceIdentity {
    #[default]
    None,
    HeartRate,
    Treadmill,
}

impl DeviceIdentity {
    /// Parse the `type` field of a config command. Unknown names map to `None`.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "heart_rate" => Self::HeartRate,
            "treadmill" => Self::Treadmill,
            _ => Self::None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::None => "",
            Self::HeartRate => "heart_rate",
            Self::Treadmill => "treadmill",
        }
    }

    /// GAP device name advertised for this identity.
    pub fn device_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::HeartRate => Some("HR Simulator"),
            Self::Treadmill => Some("Treadmill Sim"),
        }
    }

    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

// ── Simulated values ──────────────────────────────────────────

/// Physiological and mechanical values behind the characteristics.
///
/// `distance_m` is always `floor(distance_acc_m)`; the accumulator is the
/// authoritative quantity and only moves forward unless a distance command
/// resets it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedValues {
    heart_rate_bpm: u8,
    battery_pct: u8,
    speed_centi_kph: u16,
    incline_deci_pct: i16,
    distance_m: u32,
    distance_acc_m: f64,
}

impl Default for SimulatedValues {
    fn default() -> Self {
        Self {
            heart_rate_bpm: DEFAULT_HEART_RATE_BPM,
            battery_pct: DEFAULT_BATTERY_PCT,
            speed_centi_kph: 0,
            incline_deci_pct: 0,
            distance_m: 0,
            distance_acc_m: 0.0,
        }
    }
}

impl SimulatedValues {
    pub fn heart_rate_bpm(&self) -> u8 {
        self.heart_rate_bpm
    }

    pub fn battery_pct(&self) -> u8 {
        self.battery_pct
    }

    /// Instantaneous speed in 0.01 km/h.
    pub fn speed_centi_kph(&self) -> u16 {
        self.speed_centi_kph
    }

    /// Inclination in 0.1 %.
    pub fn incline_deci_pct(&self) -> i16 {
        self.incline_deci_pct
    }

    pub fn distance_m(&self) -> u32 {
        self.distance_m
    }

    pub fn distance_accumulator_m(&self) -> f64 {
        self.distance_acc_m
    }

    /// Speed converted to metres per second (1 km/h = 1/3.6 m/s).
    pub fn speed_mps(&self) -> f64 {
        f64::from(self.speed_centi_kph) / 360.0
    }

    pub(crate) fn set_heart_rate(&mut self, bpm: u8) {
        self.heart_rate_bpm = bpm;
    }

    /// Store a battery level, clamping into 0..=100. Returns the stored value.
    pub(crate) fn set_battery(&mut self, raw: i64) -> u8 {
        self.battery_pct = clamp_battery(raw);
        self.battery_pct
    }

    pub(crate) fn set_speed(&mut self, centi_kph: u16) {
        self.speed_centi_kph = centi_kph;
    }

    pub(crate) fn set_incline(&mut self, deci_pct: i16) {
        self.incline_deci_pct = deci_pct;
    }

    /// Explicit distance reset: both the accumulator and the reported value.
    pub(crate) fn reset_distance(&mut self, meters: u32) {
        self.distance_acc_m = f64::from(meters);
        self.distance_m = meters;
    }

    /// Integrate current speed over `elapsed_ms` of wall-clock time.
    pub(crate) fn advance_distance(&mut self, elapsed_ms: u64) {
        let elapsed_s = elapsed_ms as f64 / 1000.0;
        self.distance_acc_m += self.speed_mps() * elapsed_s;
        // `as` saturates at u32::MAX
        self.distance_m = self.distance_acc_m.floor() as u32;
    }
}

/// Clamp an arbitrary integer into the Battery Level range.
pub fn clamp_battery(raw: i64) -> u8 {
    raw.clamp(0, i64::from(MAX_BATTERY_PCT)) as u8
}

// ── Connection mirror ─────────────────────────────────────────

/// Informational snapshot of link state for external consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub wifi: bool,
    pub mqtt: bool,
    pub ble_client: bool,
    pub ip: String<16>,
}
