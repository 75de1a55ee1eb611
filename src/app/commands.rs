//! Inbound commands to the simulator core.
//!
//! Transport adapters decode their payloads into these types and hand them
//! to [`SimulatorCore::handle_command`](super::service::SimulatorCore::handle_command).
//! Numeric fields stay loosely typed here; range checks belong to the core,
//! so a multi-field update can apply its valid fields and report the rest.

use heapless::String;

use crate::error::CommandError;
use crate::model::DeviceIdentity;

/// Commands that external adapters can send into the simulator core.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Switch the simulated peripheral, rebuilding the GATT profile.
    SetIdentity(DeviceIdentity),

    /// Partial update of the simulated values.
    SetFields(FieldUpdate),

    /// Force-disconnect the central, optionally tearing the stack down.
    Disconnect(DisconnectRequest),

    /// Link status reported by the network collaborator.
    ReportConnectivity(Connectivity),
}

/// A numeric JSON field as received.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    /// Present but not a number.
    Malformed,
}

/// Fields absent from the update are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldUpdate {
    pub heart_rate: Option<FieldValue>,
    pub battery: Option<FieldValue>,
    /// km/h
    pub speed: Option<FieldValue>,
    /// percent
    pub incline: Option<FieldValue>,
    /// metres
    pub distance: Option<FieldValue>,
}

impl FieldUpdate {
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none()
            && self.battery.is_none()
            && self.speed.is_none()
            && self.incline.is_none()
            && self.distance.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisconnectRequest {
    /// Raw requested duration; negative values are rejected by the core.
    pub duration_ms: i64,
    pub teardown: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connectivity {
    pub wifi: bool,
    pub mqtt: bool,
    pub ip: String<16>,
}

// ── Field validation ──────────────────────────────────────────

fn integer(value: FieldValue, field: &'static str) -> Result<i64, CommandError> {
    match value {
        FieldValue::Integer(v) => Ok(v),
        FieldValue::Real(_) | FieldValue::Malformed => Err(CommandError::Malformed(field)),
    }
}

fn real(value: FieldValue, field: &'static str) -> Result<f64, CommandError> {
    match value {
        FieldValue::Integer(v) => Ok(v as f64),
        FieldValue::Real(v) if v.is_finite() => Ok(v),
        FieldValue::Real(_) => Err(CommandError::OutOfRange(field)),
        FieldValue::Malformed => Err(CommandError::Malformed(field)),
    }
}

pub fn heart_rate_bpm(value: FieldValue) -> Result<u8, CommandError> {
    let v = integer(value, "heart_rate")?;
    u8::try_from(v).map_err(|_| CommandError::OutOfRange("heart_rate"))
}

/// Battery accepts any integer; clamping happens on store.
pub fn battery_raw(value: FieldValue) -> Result<i64, CommandError> {
    integer(value, "battery")
}

/// km/h → 0.01 km/h, rounded to the nearest unit.
pub fn speed_centi_kph(value: FieldValue) -> Result<u16, CommandError> {
    let centi = (real(value, "speed")? * 100.0).round();
    if (0.0..=f64::from(u16::MAX)).contains(&centi) {
        Ok(centi as u16)
    } else {
        Err(CommandError::OutOfRange("speed"))
    }
}

/// percent → 0.1 %, rounded to the nearest unit.
pub fn incline_deci_pct(value: FieldValue) -> Result<i16, CommandError> {
    let deci = (real(value, "incline")? * 10.0).round();
    if (f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&deci) {
        Ok(deci as i16)
    } else {
        Err(CommandError::OutOfRange("incline"))
    }
}

pub fn distance_m(value: FieldValue) -> Result<u32, CommandError> {
    let v = integer(value, "distance")?;
    u32::try_from(v).map_err(|_| CommandError::OutOfRange("distance"))
}

pub fn duration_ms(raw: i64) -> Result<u32, CommandError> {
    u32::try_from(raw).map_err(|_| CommandError::OutOfRange("duration_ms"))
}
