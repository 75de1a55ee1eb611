//! Port traits — the hexagonal boundary between the simulator core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SimulatorCore (domain)
//! ```
//!
//! The NimBLE adapter implements [`BleStackPort`]; log and MQTT adapters
//! implement [`EventSink`]. The [`SimulatorCore`](super::service::SimulatorCore)
//! receives them per call, so the domain never touches the radio directly and
//! tests substitute recording mocks.

use crate::error::StackError;
use crate::gatt::CharProps;

// ───────────────────────────────────────────────────────────────
// Handles
// ───────────────────────────────────────────────────────────────

/// Opaque service handle issued by the stack adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(pub u16);

/// Opaque characteristic handle issued by the stack adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharHandle(pub u16);

/// Connection handle of a central.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

/// Advertising payload: GAP name plus advertised service UUIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingData {
    pub device_name: &'static str,
    pub service_uuids: &'static [u16],
}

// ───────────────────────────────────────────────────────────────
// BLE stack port (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// Primitive GATT-server operations. All calls are synchronous, bounded and
/// only ever issued from the core's loop.
pub trait BleStackPort {
    /// Bring up controller and host, set the GAP name.
    fn init(&mut self, device_name: &str) -> Result<(), StackError>;

    /// Release the whole stack. Every handle issued before becomes invalid.
    fn deinit(&mut self);

    fn create_service(&mut self, uuid: u16) -> Result<ServiceHandle, StackError>;

    fn create_characteristic(
        &mut self,
        service: ServiceHandle,
        uuid: u16,
        props: CharProps,
    ) -> Result<CharHandle, StackError>;

    fn start_service(&mut self, service: ServiceHandle) -> Result<(), StackError>;

    /// Remove a service and its characteristics. Unknown handles are ignored.
    fn remove_service(&mut self, service: ServiceHandle);

    /// Set the value served to reads.
    fn set_value(&mut self, characteristic: CharHandle, value: &[u8]);

    /// Push a value to subscribed centrals.
    fn notify(&mut self, characteristic: CharHandle, value: &[u8]) -> Result<(), StackError>;

    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), StackError>;

    /// Stop advertising. No-op if not advertising.
    fn stop_advertising(&mut self);

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), StackError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / transport)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`CoreEvent`](super::events::CoreEvent)s
/// through this port. Adapters decide where they go (serial log, MQTT).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::CoreEvent);
}

/// Fan out to two sinks, e.g. `(LogEventSink, MqttTransport)`.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::CoreEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &super::events::CoreEvent) {
        (**self).emit(event);
    }
}
