//! Command routing: field validation, partial updates, rebuild semantics.

use blesim::app::commands::{Command, Connectivity, DisconnectRequest, FieldUpdate, FieldValue};
use blesim::app::events::ValuesReport;
use blesim::error::{CommandError, Error};
use blesim::fsm::StateId;
use blesim::gatt::{
    BATTERY_LEVEL_UUID, FITNESS_MACHINE_FEATURE_UUID, FITNESS_MACHINE_SERVICE_UUID,
    HEART_RATE_MEASUREMENT_UUID, TREADMILL_DATA_UUID,
};
use blesim::model::DeviceIdentity;

use crate::mock_stack::{Harness, StackCall};

fn set(update: FieldUpdate) -> Command {
    Command::SetFields(update)
}

fn battery(raw: i64) -> Command {
    set(FieldUpdate {
        battery: Some(FieldValue::Integer(raw)),
        ..FieldUpdate::default()
    })
}

#[test]
fn battery_is_clamped_on_store() {
    let mut h = Harness::new();
    h.command(battery(150));
    assert_eq!(h.core.values().battery_pct(), 100);
    h.command(battery(-5));
    assert_eq!(h.core.values().battery_pct(), 0);
    assert!(h.sink.faults().is_empty());
}

#[test]
fn invalid_field_is_reported_and_the_rest_applied() {
    let mut h = Harness::new();
    h.command(set(FieldUpdate {
        heart_rate: Some(FieldValue::Integer(300)),
        battery: Some(FieldValue::Integer(55)),
        speed: Some(FieldValue::Malformed),
        ..FieldUpdate::default()
    }));
    let values = h.core.values();
    assert_eq!(values.heart_rate_bpm(), 70);
    assert_eq!(values.battery_pct(), 55);
    assert_eq!(
        h.sink.faults(),
        vec![
            Error::InvalidCommand(CommandError::OutOfRange("heart_rate")),
            Error::InvalidCommand(CommandError::Malformed("speed")),
        ]
    );
}

#[test]
fn treadmill_fields_are_rounded_to_wire_units() {
    let mut h = Harness::new();
    h.command(set(FieldUpdate {
        speed: Some(FieldValue::Real(12.345_6)),
        incline: Some(FieldValue::Real(-2.46)),
        distance: Some(FieldValue::Integer(4_200)),
        ..FieldUpdate::default()
    }));
    let values = h.core.values();
    assert_eq!(values.speed_centi_kph(), 1235);
    assert_eq!(values.incline_deci_pct(), -25);
    assert_eq!(values.distance_m(), 4_200);
    assert!((values.distance_accumulator_m() - 4_200.0).abs() < f64::EPSILON);
}

#[test]
fn battery_notifies_only_when_connected() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.command(battery(80));
    assert!(h.stack.notifications(BATTERY_LEVEL_UUID).is_empty());
    assert_eq!(h.stack.last_value(BATTERY_LEVEL_UUID), Some(vec![80]));

    h.connect(1);
    h.command(battery(42));
    assert_eq!(h.stack.notifications(BATTERY_LEVEL_UUID), vec![vec![42]]);
}

#[test]
fn rebuilt_profile_serves_current_battery() {
    let mut h = Harness::new();
    h.command(battery(33));
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    assert_eq!(h.stack.last_value(BATTERY_LEVEL_UUID), Some(vec![33]));
}

#[test]
fn disconnect_without_client_is_rejected() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.command(Command::Disconnect(DisconnectRequest {
        duration_ms: 500,
        teardown: false,
    }));
    assert_eq!(h.core.state(), StateId::Advertising);
    assert_eq!(
        h.sink.faults(),
        vec![Error::InvalidCommand(CommandError::NoClient)]
    );
}

#[test]
fn negative_duration_is_rejected() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.connect(1);
    h.command(Command::Disconnect(DisconnectRequest {
        duration_ms: -1,
        teardown: false,
    }));
    assert_eq!(h.core.state(), StateId::Connected);
    assert_eq!(
        h.sink.faults(),
        vec![Error::InvalidCommand(CommandError::OutOfRange("duration_ms"))]
    );
}

#[test]
fn repeated_identity_never_duplicates_characteristics() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    assert_eq!(h.stack.live_characteristics(TREADMILL_DATA_UUID), 1);
    assert_eq!(h.stack.live_characteristics(FITNESS_MACHINE_FEATURE_UUID), 1);
    assert_eq!(h.stack.live_services(), 1);
    assert_eq!(h.core.state(), StateId::Advertising);
}

#[test]
fn switching_identity_replaces_profile() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.connect(3);
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));

    assert_eq!(h.core.state(), StateId::Advertising);
    assert_eq!(h.stack.live_characteristics(HEART_RATE_MEASUREMENT_UUID), 0);
    assert_eq!(h.stack.live_characteristics(TREADMILL_DATA_UUID), 1);
    assert!(h.stack.calls.contains(&StackCall::Disconnect(blesim::app::ports::ConnHandle(3))));
    assert_eq!(
        h.stack
            .count(|c| matches!(c, StackCall::CreateService(FITNESS_MACHINE_SERVICE_UUID))),
        1
    );
}

#[test]
fn connectivity_report_is_mirrored_in_status() {
    let mut h = Harness::new();
    let mut ip = heapless::String::new();
    ip.push_str("10.1.2.3").unwrap();
    h.command(Command::ReportConnectivity(Connectivity {
        wifi: true,
        mqtt: true,
        ip,
    }));
    let status = h.sink.last_status().unwrap();
    assert!(status.wifi && status.mqtt);
    assert_eq!(status.ip.as_str(), "10.1.2.3");
}

#[test]
fn every_command_publishes_a_values_snapshot() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.sink.clear();
    h.command(battery(90));
    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        blesim::app::events::CoreEvent::Values(ValuesReport::HeartRate {
            heart_rate: 70,
            battery: 90
        })
    )));
}
