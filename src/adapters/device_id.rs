//! Device identity derived from the ESP32 factory MAC address.
//!
//! The id scopes every MQTT topic (`ble-sim/{id}/...`) and doubles as the
//! MQTT client id. Format: `esp32-` followed by the lower three MAC bytes
//! as one lowercase hex number, e.g. `esp32-efcafe`.

use core::fmt::Write;

/// Device id string: "esp32-" + up to 6 hex digits.
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Lower three MAC bytes packed big-endian.
fn chip_id(mac: &MacAddress) -> u32 {
    u32::from_be_bytes([0, mac[3], mac[4], mac[5]])
}

/// Default device id, used when none is provisioned.
/// Leading zeros are not padded (`00:..:00:0A:0B` gives `esp32-a0b`).
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "esp32-{:x}", chip_id(mac));
    id
}
