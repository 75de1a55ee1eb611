//! MQTT wire protocol: topic layout and JSON payloads.
//!
//! ```text
//!   ble-sim/{id}/config      ◀── {"type":"heart_rate"|"treadmill"|...}
//!   ble-sim/{id}/set         ◀── {"heart_rate":72,"speed":10.5,...}
//!   ble-sim/{id}/disconnect  ◀── {"duration_ms":500,"teardown":false}
//!   ble-sim/{id}/status      ──▶ retained, last-will {"online":false}
//!   ble-sim/{id}/values      ──▶ identity-specific snapshot
//!   ble-sim/{id}/error       ──▶ {"error":"..."}
//! ```
//!
//! Decoding is transport-agnostic: the MQTT adapter hands over topic and
//! raw bytes, and gets back a [`Command`] for the simulator core.

use core::fmt::Write;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::app::commands::{Command, DisconnectRequest, FieldUpdate, FieldValue};
use crate::app::events::{StatusReport, ValuesReport};
use crate::config::FIRMWARE_VERSION;
use crate::error::{CommandError, Error};
use crate::model::DeviceIdentity;

pub const TOPIC_ROOT: &str = "ble-sim";

/// Last-will payload published (retained) on the status topic.
pub const LWT_PAYLOAD: &[u8] = br#"{"online":false}"#;

/// Fully qualified topic name.
pub type Topic = heapless::String<64>;

// ───────────────────────────────────────────────────────────────
// Topics
// ───────────────────────────────────────────────────────────────

/// Inbound command channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundTopic {
    Config,
    Set,
    Disconnect,
}

impl InboundTopic {
    pub const ALL: [InboundTopic; 3] = [Self::Config, Self::Set, Self::Disconnect];

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Set => "set",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Outbound report channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundTopic {
    Status,
    Values,
    Error,
}

impl OutboundTopic {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Values => "values",
            Self::Error => "error",
        }
    }

    /// Only the status topic is retained, so late subscribers see liveness.
    pub fn retained(self) -> bool {
        matches!(self, Self::Status)
    }
}

/// `ble-sim/{device_id}/{suffix}`. Device ids longer than the topic buffer
/// are rejected by config validation, so truncation never happens in practice.
pub fn topic(device_id: &str, suffix: &str) -> Topic {
    let mut t = Topic::new();
    let _ = write!(t, "{}/{}/{}", TOPIC_ROOT, device_id, suffix);
    t
}

/// Match an incoming topic against this device's command channels.
pub fn parse_topic(device_id: &str, topic: &str) -> Result<InboundTopic, CommandError> {
    let suffix = topic
        .strip_prefix(TOPIC_ROOT)
        .and_then(|t| t.strip_prefix('/'))
        .and_then(|t| t.strip_prefix(device_id))
        .and_then(|t| t.strip_prefix('/'))
        .ok_or(CommandError::UnknownTopic)?;
    InboundTopic::ALL
        .into_iter()
        .find(|t| t.suffix() == suffix)
        .ok_or(CommandError::UnknownTopic)
}

// ───────────────────────────────────────────────────────────────
// Inbound decoding
// ───────────────────────────────────────────────────────────────

/// Decode a command payload received on `topic`.
pub fn decode_command(topic: InboundTopic, payload: &[u8]) -> Result<Command, CommandError> {
    let doc: Value = serde_json::from_slice(payload).map_err(|_| CommandError::BadPayload)?;
    let Value::Object(obj) = doc else {
        return Err(CommandError::BadPayload);
    };

    match topic {
        InboundTopic::Config => Ok(Command::SetIdentity(decode_identity(&obj))),
        InboundTopic::Set => Ok(Command::SetFields(decode_fields(&obj))),
        InboundTopic::Disconnect => decode_disconnect(&obj).map(Command::Disconnect),
    }
}

/// Missing, non-string or unknown `type` selects no identity.
fn decode_identity(obj: &Map<String, Value>) -> DeviceIdentity {
    obj.get("type")
        .and_then(Value::as_str)
        .map_or(DeviceIdentity::None, DeviceIdentity::from_wire)
}

fn decode_fields(obj: &Map<String, Value>) -> FieldUpdate {
    FieldUpdate {
        heart_rate: obj.get("heart_rate").map(field_value),
        battery: obj.get("battery").map(field_value),
        speed: obj.get("speed").map(field_value),
        incline: obj.get("incline").map(field_value),
        distance: obj.get("distance").map(field_value),
    }
}

/// JSON integers above `i64::MAX` saturate, so range checks still apply.
fn as_integer(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_u64().map(|_| i64::MAX))
}

fn field_value(v: &Value) -> FieldValue {
    match v {
        Value::Number(n) => match as_integer(v) {
            Some(i) => FieldValue::Integer(i),
            None => n.as_f64().map_or(FieldValue::Malformed, FieldValue::Real),
        },
        _ => FieldValue::Malformed,
    }
}

fn decode_disconnect(obj: &Map<String, Value>) -> Result<DisconnectRequest, CommandError> {
    let duration_ms = match obj.get("duration_ms") {
        None | Some(Value::Null) => 0,
        Some(v) => as_integer(v).ok_or(CommandError::Malformed("duration_ms"))?,
    };
    let teardown = match obj.get("teardown") {
        None | Some(Value::Null) => false,
        Some(v) => v.as_bool().ok_or(CommandError::Malformed("teardown"))?,
    };
    Ok(DisconnectRequest {
        duration_ms,
        teardown,
    })
}

// ───────────────────────────────────────────────────────────────
// Outbound encoding
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusJson<'a> {
    online: bool,
    firmware_version: &'a str,
    #[serde(rename = "type")]
    identity: &'a str,
    ble_started: bool,
    ip: &'a str,
    radio: &'a str,
    ble_client: bool,
}

#[derive(Serialize)]
struct HeartRateJson {
    heart_rate: u8,
    battery: u8,
}

#[derive(Serialize)]
struct TreadmillJson {
    speed: f64,
    incline: f64,
    distance: u32,
}

#[derive(Serialize)]
struct IdleJson {}

#[derive(Serialize)]
struct ErrorJson<'a> {
    error: &'a str,
}

pub fn encode_status(report: &StatusReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(&StatusJson {
        online: true,
        firmware_version: FIRMWARE_VERSION,
        identity: report.identity.as_wire(),
        ble_started: report.ble_started,
        ip: &report.ip,
        radio: report.radio.name(),
        ble_client: report.ble_client,
    })
}

pub fn encode_values(report: &ValuesReport) -> Result<String, serde_json::Error> {
    match *report {
        ValuesReport::Idle => serde_json::to_string(&IdleJson {}),
        ValuesReport::HeartRate {
            heart_rate,
            battery,
        } => serde_json::to_string(&HeartRateJson {
            heart_rate,
            battery,
        }),
        ValuesReport::Treadmill {
            speed,
            incline,
            distance,
        } => serde_json::to_string(&TreadmillJson {
            speed,
            incline,
            distance,
        }),
    }
}

pub fn encode_error(error: &Error) -> Result<String, serde_json::Error> {
    let message = error.to_string();
    serde_json::to_string(&ErrorJson { error: &message })
}
