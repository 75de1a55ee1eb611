//! Recording BLE stack and event sink for integration tests.
//!
//! `MockStack` keeps a live registry like a real GATT server and logs every
//! primitive call, so tests can assert both on the resulting attribute table
//! and on the exact call history.

use blesim::app::commands::Command;
use blesim::app::events::{CoreEvent, StatusReport};
use blesim::app::ports::{
    AdvertisingData, BleStackPort, CharHandle, ConnHandle, EventSink, ServiceHandle,
};
use blesim::app::service::SimulatorCore;
use blesim::config::SimConfig;
use blesim::error::{Error, StackError};
use blesim::events::{StackEvent, StackEventQueue};
use blesim::gatt::CharProps;

// ── Stack call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StackCall {
    Init(String),
    Deinit,
    CreateService(u16),
    CreateCharacteristic(u16),
    StartService(ServiceHandle),
    RemoveService(ServiceHandle),
    SetValue { uuid: u16, value: Vec<u8> },
    Notify { uuid: u16, value: Vec<u8> },
    StartAdvertising(&'static str),
    StopAdvertising,
    Disconnect(ConnHandle),
}

// ── MockStack ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStack {
    pub calls: Vec<StackCall>,
    pub initialised: bool,
    pub advertising: bool,
    pub advertised_name: Option<&'static str>,
    pub fail_init: bool,
    pub fail_advertising: bool,
    pub fail_characteristic: bool,
    services: Vec<(ServiceHandle, u16)>,
    characteristics: Vec<(CharHandle, ServiceHandle, u16)>,
    next: u16,
}

#[allow(dead_code)]
impl MockStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack whose `init` always fails.
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    /// A stack that registers profiles but refuses to advertise.
    pub fn failing_advertising() -> Self {
        Self {
            fail_advertising: true,
            ..Self::default()
        }
    }

    /// A stack that rejects every characteristic registration.
    pub fn failing_characteristic() -> Self {
        Self {
            fail_characteristic: true,
            ..Self::default()
        }
    }

    pub fn live_services(&self) -> usize {
        self.services.len()
    }

    /// Registered characteristics with `uuid`.
    pub fn live_characteristics(&self, uuid: u16) -> usize {
        self.characteristics
            .iter()
            .filter(|(_, _, u)| *u == uuid)
            .count()
    }

    /// Every notified payload for `uuid`, oldest first.
    pub fn notifications(&self, uuid: u16) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StackCall::Notify { uuid: u, value } if *u == uuid => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last value written to `uuid` by set_value or notify.
    pub fn last_value(&self, uuid: u16) -> Option<Vec<u8>> {
        self.calls.iter().rev().find_map(|c| match c {
            StackCall::SetValue { uuid: u, value } | StackCall::Notify { uuid: u, value }
                if *u == uuid =>
            {
                Some(value.clone())
            }
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&StackCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn uuid_of(&self, handle: CharHandle) -> Option<u16> {
        self.characteristics
            .iter()
            .find(|(h, _, _)| *h == handle)
            .map(|(_, _, u)| *u)
    }

    fn issue(&mut self) -> u16 {
        self.next += 1;
        self.next
    }
}

impl BleStackPort for MockStack {
    fn init(&mut self, device_name: &str) -> Result<(), StackError> {
        self.calls.push(StackCall::Init(device_name.to_string()));
        if self.fail_init {
            return Err(StackError::InitFailed);
        }
        self.initialised = true;
        Ok(())
    }

    fn deinit(&mut self) {
        self.calls.push(StackCall::Deinit);
        self.initialised = false;
        self.advertising = false;
        self.services.clear();
        self.characteristics.clear();
    }

    fn create_service(&mut self, uuid: u16) -> Result<ServiceHandle, StackError> {
        self.calls.push(StackCall::CreateService(uuid));
        if !self.initialised {
            return Err(StackError::NotInitialised);
        }
        let handle = ServiceHandle(self.issue());
        self.services.push((handle, uuid));
        Ok(handle)
    }

    fn create_characteristic(
        &mut self,
        service: ServiceHandle,
        uuid: u16,
        _props: CharProps,
    ) -> Result<CharHandle, StackError> {
        self.calls.push(StackCall::CreateCharacteristic(uuid));
        if self.fail_characteristic {
            return Err(StackError::CharacteristicCreateFailed);
        }
        let handle = CharHandle(self.issue());
        self.characteristics.push((handle, service, uuid));
        Ok(handle)
    }

    fn start_service(&mut self, service: ServiceHandle) -> Result<(), StackError> {
        self.calls.push(StackCall::StartService(service));
        Ok(())
    }

    fn remove_service(&mut self, service: ServiceHandle) {
        self.calls.push(StackCall::RemoveService(service));
        self.services.retain(|(h, _)| *h != service);
        self.characteristics.retain(|(_, s, _)| *s != service);
    }

    fn set_value(&mut self, characteristic: CharHandle, value: &[u8]) {
        if let Some(uuid) = self.uuid_of(characteristic) {
            self.calls.push(StackCall::SetValue {
                uuid,
                value: value.to_vec(),
            });
        }
    }

    fn notify(&mut self, characteristic: CharHandle, value: &[u8]) -> Result<(), StackError> {
        let uuid = self
            .uuid_of(characteristic)
            .ok_or(StackError::UnknownHandle)?;
        self.calls.push(StackCall::Notify {
            uuid,
            value: value.to_vec(),
        });
        Ok(())
    }

    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), StackError> {
        self.calls.push(StackCall::StartAdvertising(data.device_name));
        if self.fail_advertising {
            return Err(StackError::AdvertisingFailed);
        }
        self.advertising = true;
        self.advertised_name = Some(data.device_name);
        Ok(())
    }

    fn stop_advertising(&mut self) {
        self.calls.push(StackCall::StopAdvertising);
        self.advertising = false;
    }

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), StackError> {
        self.calls.push(StackCall::Disconnect(conn));
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<CoreEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn faults(&self) -> Vec<Error> {
        self.events
            .iter()
            .filter_map(|e| match e {
                CoreEvent::Fault(err) => Some(*err),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<&StatusReport> {
        self.events.iter().rev().find_map(|e| match e {
            CoreEvent::Status(s) => Some(s),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CoreEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// Loop period used when advancing the clock, as on target.
pub const LOOP_STEP_MS: u64 = 10;

pub struct Harness {
    pub core: SimulatorCore,
    pub stack: MockStack,
    pub sink: RecordingSink,
    pub events: StackEventQueue,
    pub now: u64,
}

#[allow(dead_code)]
impl Harness {
    /// Core started at t = 0.
    pub fn new() -> Self {
        Self::with_stack(MockStack::new())
    }

    pub fn with_stack(mut stack: MockStack) -> Self {
        let mut core = SimulatorCore::new(SimConfig::default());
        let mut sink = RecordingSink::default();
        core.start(0, &mut stack, &mut sink);
        Self {
            core,
            stack,
            sink,
            events: StackEventQueue::new(),
            now: 0,
        }
    }

    pub fn command(&mut self, cmd: Command) {
        self.core
            .handle_command(cmd, self.now, &mut self.stack, &mut self.sink);
    }

    pub fn poll(&mut self) {
        self.core
            .poll(self.now, &self.events, &mut self.stack, &mut self.sink);
    }

    /// Run the loop until `t`, polling every [`LOOP_STEP_MS`].
    pub fn run_until(&mut self, t: u64) {
        while self.now + LOOP_STEP_MS <= t {
            self.now += LOOP_STEP_MS;
            self.poll();
        }
        if self.now < t {
            self.now = t;
            self.poll();
        }
    }

    pub fn connect(&mut self, conn: u16) {
        assert!(self.events.push(StackEvent::Connected {
            conn: ConnHandle(conn)
        }));
        self.poll();
    }

    pub fn peer_leaves(&mut self, conn: u16) {
        assert!(self.events.push(StackEvent::Disconnected {
            conn: ConnHandle(conn)
        }));
        self.poll();
    }
}
