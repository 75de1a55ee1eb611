//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured simulator events to the
//! ESP-IDF logger (UART / USB-CDC in production, stderr on the host).

use log::{debug, info, warn};

use crate::app::events::{CoreEvent, ValuesReport};
use crate::app::ports::EventSink;

/// Adapter that logs every [`CoreEvent`] to the serial console.
pub struct LogEventSink;

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CoreEvent) {
        match event {
            CoreEvent::Status(s) => {
                debug!(
                    "STATUS | type={} radio={} ble_started={} client={} wifi={} mqtt={} ip={}",
                    s.identity.as_wire(),
                    s.radio.name(),
                    s.ble_started,
                    s.ble_client,
                    s.wifi,
                    s.mqtt,
                    s.ip,
                );
            }
            CoreEvent::Values(v) => match v {
                ValuesReport::Idle => {}
                ValuesReport::HeartRate { heart_rate, battery } => {
                    debug!("VALUES | hr={}bpm battery={}%", heart_rate, battery);
                }
                ValuesReport::Treadmill {
                    speed,
                    incline,
                    distance,
                } => {
                    debug!(
                        "VALUES | speed={:.2}km/h incline={:.1}% distance={}m",
                        speed, incline, distance
                    );
                }
            },
            CoreEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            CoreEvent::Fault(e) if e.is_informational() => {
                info!("FAULT | {}", e);
            }
            CoreEvent::Fault(e) => {
                warn!("FAULT | {}", e);
            }
            CoreEvent::Started(state) => {
                info!("START | initial_state={}", state.name());
            }
        }
    }
}
