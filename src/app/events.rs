//! Outbound simulator events.
//!
//! The [`SimulatorCore`](super::service::SimulatorCore) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters decide what to do
//! with them: log to serial, publish over MQTT.

use heapless::String;

use crate::error::Error;
use crate::fsm::StateId;
use crate::model::{DeviceIdentity, SimulatedValues};

/// Structured events emitted by the simulator core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Status snapshot (state change or periodic).
    Status(StatusReport),

    /// Values snapshot for the active identity.
    Values(ValuesReport),

    /// The radio state machine moved.
    StateChanged { from: StateId, to: StateId },

    /// A fault was detected and handled; the loop continues.
    Fault(Error),

    /// The core finished its initial bring-up.
    Started(StateId),
}

/// What the status channel reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub identity: DeviceIdentity,
    /// A profile is selected and the radio is meant to be serving it.
    pub ble_started: bool,
    pub radio: StateId,
    pub ble_client: bool,
    pub wifi: bool,
    pub mqtt: bool,
    pub ip: String<16>,
}

/// Identity-specific values snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValuesReport {
    /// No identity selected.
    Idle,
    HeartRate { heart_rate: u8, battery: u8 },
    /// Speed in km/h and incline in percent, as floats for consumers.
    Treadmill { speed: f64, incline: f64, distance: u32 },
}

impl ValuesReport {
    pub fn from_values(identity: DeviceIdentity, values: &SimulatedValues) -> Self {
        match identity {
            DeviceIdentity::None => Self::Idle,
            DeviceIdentity::HeartRate => Self::HeartRate {
                heart_rate: values.heart_rate_bpm(),
                battery: values.battery_pct(),
            },
            DeviceIdentity::Treadmill => Self::Treadmill {
                speed: f64::from(values.speed_centi_kph()) / 100.0,
                incline: f64::from(values.incline_deci_pct()) / 10.0,
                distance: values.distance_m(),
            },
        }
    }
}
