//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                     |
//! |-------------|--------------|---------------------------------|
//! | `ble`       | BleStackPort | NimBLE GATT server              |
//! | `log_sink`  | EventSink    | Serial log output               |
//! | `mqtt`      | EventSink    | MQTT broker (commands, reports) |
//! | `wifi`      | —            | ESP-IDF WiFi STA                |
//! | `time`      | —            | ESP32 system timer              |
//! | `device_id` | —            | eFuse MAC                       |

pub mod ble;
pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub mod wifi;
