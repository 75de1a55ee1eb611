//! System configuration parameters
//!
//! Tunable timing for the simulator core plus the network settings the
//! firmware entry point hands to its transport adapters.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Firmware version reported on the status topic.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SimConfig {
    // --- Timing ---
    /// Characteristic notification cadence (milliseconds)
    pub notify_interval_ms: u32,
    /// Status/values publication cadence (milliseconds)
    pub status_interval_ms: u32,
    /// Teardown length used when a teardown command carries no duration
    pub default_teardown_ms: u32,

    // --- Radio ---
    /// GAP name set at stack init, before any profile is selected
    pub stack_device_name: String<24>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut stack_device_name = String::new();
        let _ = stack_device_name.push_str("BLE Simulator");
        Self {
            notify_interval_ms: 1000,   // 1 Hz
            status_interval_ms: 10_000, // every 10 s
            default_teardown_ms: 3000,
            stack_device_name,
        }
    }
}

impl SimConfig {
    /// Reject values the core cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.notify_interval_ms == 0 {
            return Err(Error::Config("notify_interval_ms must be > 0"));
        }
        if self.status_interval_ms < self.notify_interval_ms {
            return Err(Error::Config(
                "status_interval_ms must not be shorter than notify_interval_ms",
            ));
        }
        if self.default_teardown_ms == 0 {
            return Err(Error::Config("default_teardown_ms must be > 0"));
        }
        if self.stack_device_name.is_empty() {
            return Err(Error::Config("stack_device_name must not be empty"));
        }
        Ok(())
    }
}

/// Network settings for the WiFi and MQTT adapters.
///
/// Baked in at build time from `BLESIM_*` environment variables; anything
/// unset falls back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
    pub mqtt_host: String<64>,
    pub mqtt_port: u16,
    /// Overrides the MAC-derived device id when non-empty.
    pub device_id: String<32>,
    pub mqtt_reconnect_interval_ms: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            mqtt_host: String::new(),
            mqtt_port: 1883,
            device_id: String::new(),
            mqtt_reconnect_interval_ms: 5000,
        }
    }
}

impl NetworkConfig {
    pub fn from_build_env() -> Self {
        let mut cfg = Self::default();
        copy_into(&mut cfg.wifi_ssid, option_env!("BLESIM_WIFI_SSID"));
        copy_into(&mut cfg.wifi_password, option_env!("BLESIM_WIFI_PASSWORD"));
        copy_into(&mut cfg.mqtt_host, option_env!("BLESIM_MQTT_HOST"));
        copy_into(&mut cfg.device_id, option_env!("BLESIM_DEVICE_ID"));
        if let Some(port) = option_env!("BLESIM_MQTT_PORT").and_then(|p| p.parse().ok()) {
            cfg.mqtt_port = port;
        }
        cfg
    }

    pub fn wifi_configured(&self) -> bool {
        !self.wifi_ssid.is_empty()
    }

    pub fn mqtt_configured(&self) -> bool {
        !self.mqtt_host.is_empty()
    }

    /// `mqtt://host:port` as expected by the MQTT client.
    pub fn broker_url(&self) -> std::string::String {
        format!("mqtt://{}:{}", self.mqtt_host, self.mqtt_port)
    }
}

/// Copy an optional value, truncating at a char boundary if it does not fit.
fn copy_into<const N: usize>(dst: &mut String<N>, src: Option<&str>) {
    let Some(src) = src else { return };
    dst.clear();
    for c in src.chars() {
        if dst.push(c).is_err() {
            break;
        }
    }
}
