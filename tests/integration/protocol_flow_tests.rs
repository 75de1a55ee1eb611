//! End-to-end flow over the simulated adapters: MQTT message in, NimBLE
//! simulation and MQTT reports out, as the firmware loop wires them.

use blesim::adapters::ble::BleAdapter;
use blesim::adapters::log_sink::LogEventSink;
use blesim::adapters::mqtt::{InboundChannel, MqttTransport};
use blesim::app::ports::ConnHandle;
use blesim::app::service::SimulatorCore;
use blesim::config::{NetworkConfig, SimConfig};
use blesim::events::StackEventQueue;
use blesim::fsm::StateId;
use blesim::gatt::{HEART_RATE_MEASUREMENT_UUID, TREADMILL_DATA_UUID};
use serde_json::Value;

const DEVICE: &str = "esp32-abc123";

struct Rig {
    core: SimulatorCore,
    ble: BleAdapter,
    mqtt: MqttTransport,
    log: LogEventSink,
    events: &'static StackEventQueue,
    now: u64,
}

impl Rig {
    fn new() -> Self {
        let events: &'static StackEventQueue = Box::leak(Box::new(StackEventQueue::new()));
        let inbound: &'static InboundChannel = Box::leak(Box::new(InboundChannel::new()));
        let mut rig = Self {
            core: SimulatorCore::new(SimConfig::default()),
            ble: BleAdapter::new(events),
            mqtt: MqttTransport::new(DEVICE, &NetworkConfig::default(), inbound),
            log: LogEventSink::new(),
            events,
            now: 0,
        };
        assert!(rig.mqtt.poll(0, true));
        rig.core
            .start(0, &mut rig.ble, &mut (&mut rig.log, &mut rig.mqtt));
        rig
    }

    /// One firmware loop iteration.
    fn step(&mut self) {
        while let Some(decoded) = self.mqtt.next_command() {
            let mut sink = (&mut self.log, &mut self.mqtt);
            match decoded {
                Ok(cmd) => self.core.handle_command(cmd, self.now, &mut self.ble, &mut sink),
                Err(e) => self.core.reject(e, &mut sink),
            }
        }
        self.core.poll(
            self.now,
            self.events,
            &mut self.ble,
            &mut (&mut self.log, &mut self.mqtt),
        );
    }

    fn run_until(&mut self, t: u64) {
        while self.now < t {
            self.now = (self.now + 10).min(t);
            self.step();
        }
    }

    fn send(&mut self, suffix: &str, payload: &str) {
        assert!(
            self.mqtt
                .sim_inject(&format!("ble-sim/{DEVICE}/{suffix}"), payload.as_bytes())
        );
        self.step();
    }

    fn last_on(&self, suffix: &str) -> Option<Value> {
        let topic = format!("ble-sim/{DEVICE}/{suffix}");
        self.mqtt
            .sim_published()
            .iter()
            .rev()
            .find(|p| p.topic.as_str() == topic)
            .map(|p| serde_json::from_str(&p.payload).unwrap())
    }
}

#[test]
fn config_message_brings_up_treadmill() {
    let mut rig = Rig::new();
    rig.send("config", r#"{"type":"treadmill"}"#);

    assert_eq!(rig.core.state(), StateId::Advertising);
    assert!(rig.ble.is_advertising());
    assert_eq!(rig.ble.characteristics_with_uuid(TREADMILL_DATA_UUID).len(), 1);

    let status = rig.last_on("status").unwrap();
    assert_eq!(status["type"], "treadmill");
    assert_eq!(status["ble_started"], Value::Bool(true));
    assert_eq!(status["online"], Value::Bool(true));
    let retained = rig
        .mqtt
        .sim_published()
        .iter()
        .filter(|p| p.topic.as_str().ends_with("/status"))
        .all(|p| p.retain);
    assert!(retained);
}

#[test]
fn set_message_updates_values_topic() {
    let mut rig = Rig::new();
    rig.send("config", r#"{"type":"treadmill"}"#);
    rig.send("set", r#"{"speed":12.34,"incline":-5,"distance":100}"#);

    let values = rig.last_on("values").unwrap();
    assert_eq!(values["speed"].as_f64(), Some(12.34));
    assert_eq!(values["incline"].as_f64(), Some(-5.0));
    assert_eq!(values["distance"].as_u64(), Some(100));
}

#[test]
fn malformed_payload_is_reported_on_error_topic() {
    let mut rig = Rig::new();
    rig.send("set", "{not json");
    let error = rig.last_on("error").unwrap();
    assert!(error["error"].as_str().unwrap().contains("JSON"));
    assert_eq!(rig.core.state(), StateId::Ready);
}

#[test]
fn central_gets_heart_rate_notifications() {
    let mut rig = Rig::new();
    rig.send("config", r#"{"type":"heart_rate"}"#);
    rig.send("set", r#"{"heart_rate":155}"#);
    rig.ble.sim_connect(ConnHandle(7));
    rig.run_until(2_000);

    assert_eq!(rig.core.state(), StateId::Connected);
    assert_eq!(rig.last_on("status").unwrap()["ble_client"], Value::Bool(true));
    let hr = rig.ble.characteristics_with_uuid(HEART_RATE_MEASUREMENT_UUID)[0].handle;
    let sent: Vec<&Vec<u8>> = rig
        .ble
        .sim_notifications()
        .iter()
        .filter(|(h, _)| *h == hr)
        .map(|(_, v)| v)
        .collect();
    assert_eq!(sent, vec![&vec![0x00, 155]; 2]);
}

#[test]
fn disconnect_message_pauses_then_readvertises() {
    let mut rig = Rig::new();
    rig.send("config", r#"{"type":"heart_rate"}"#);
    rig.ble.sim_connect(ConnHandle(1));
    rig.step();
    assert_eq!(rig.core.state(), StateId::Connected);

    rig.send("disconnect", r#"{"duration_ms":500}"#);
    assert_eq!(rig.core.state(), StateId::Paused);
    assert!(!rig.ble.is_advertising());

    let start = rig.now;
    rig.run_until(start + 490);
    assert_eq!(rig.core.state(), StateId::Paused);
    rig.run_until(start + 500);
    assert_eq!(rig.core.state(), StateId::Advertising);
    assert!(rig.ble.is_advertising());
}

#[test]
fn teardown_message_drops_stack_then_restores() {
    let mut rig = Rig::new();
    rig.send("config", r#"{"type":"treadmill"}"#);
    rig.send("disconnect", r#"{"teardown":true,"duration_ms":1000}"#);
    assert_eq!(rig.core.state(), StateId::TornDown);
    assert!(!rig.ble.is_initialised());
    assert_eq!(rig.ble.service_count(), 0);

    rig.run_until(rig.now + 1_000);
    assert_eq!(rig.core.state(), StateId::Advertising);
    assert_eq!(rig.ble.characteristics_with_uuid(TREADMILL_DATA_UUID).len(), 1);
}

#[test]
fn disconnect_without_client_reports_error() {
    let mut rig = Rig::new();
    rig.send("config", r#"{"type":"heart_rate"}"#);
    rig.send("disconnect", "{}");
    let error = rig.last_on("error").unwrap();
    assert!(error["error"].as_str().unwrap().contains("no BLE client"));
}
