//! Notification cadence and distance integration.

use blesim::app::commands::{Command, DisconnectRequest, FieldUpdate, FieldValue};
use blesim::gatt::{HEART_RATE_MEASUREMENT_UUID, TREADMILL_DATA_UUID};
use blesim::model::DeviceIdentity;

use crate::mock_stack::Harness;

fn treadmill_distance(frame: &[u8]) -> u32 {
    u32::from_le_bytes([frame[4], frame[5], frame[6], 0])
}

fn speed_kph(kph: f64) -> Command {
    Command::SetFields(FieldUpdate {
        speed: Some(FieldValue::Real(kph)),
        ..FieldUpdate::default()
    })
}

#[test]
fn heart_rate_notifies_once_per_second_while_connected() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.connect(1);
    h.run_until(3_000);
    assert_eq!(
        h.stack.notifications(HEART_RATE_MEASUREMENT_UUID),
        vec![vec![0x00, 70]; 3]
    );
}

#[test]
fn new_heart_rate_appears_in_next_notification() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.connect(1);
    h.run_until(1_000);
    h.command(Command::SetFields(FieldUpdate {
        heart_rate: Some(FieldValue::Integer(142)),
        ..FieldUpdate::default()
    }));
    h.run_until(2_000);
    let sent = h.stack.notifications(HEART_RATE_MEASUREMENT_UUID);
    assert_eq!(sent.last(), Some(&vec![0x00, 142]));
}

#[test]
fn nothing_is_notified_without_a_central() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.run_until(5_000);
    assert!(h.stack.notifications(HEART_RATE_MEASUREMENT_UUID).is_empty());
}

#[test]
fn nothing_is_notified_while_paused() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.connect(1);
    h.command(Command::Disconnect(DisconnectRequest {
        duration_ms: 10_000,
        teardown: false,
    }));
    h.run_until(5_000);
    assert!(h.stack.notifications(HEART_RATE_MEASUREMENT_UUID).is_empty());
}

#[test]
fn treadmill_distance_integrates_speed() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    // 360 km/h = 100 m/s
    h.command(speed_kph(360.0));
    h.connect(1);
    h.run_until(10_000);

    let frames = h.stack.notifications(TREADMILL_DATA_UUID);
    assert_eq!(frames.len(), 10);
    let last = treadmill_distance(&frames[9]);
    assert!((999..=1001).contains(&last), "distance {last}");
    assert_eq!(h.core.values().distance_m(), last);
}

#[test]
fn treadmill_distance_is_monotonic_and_resettable() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    h.command(speed_kph(10.0));
    h.connect(1);
    h.run_until(5_000);

    let distances: Vec<u32> = h
        .stack
        .notifications(TREADMILL_DATA_UUID)
        .iter()
        .map(|f| treadmill_distance(f))
        .collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));

    h.command(Command::SetFields(FieldUpdate {
        distance: Some(FieldValue::Integer(0)),
        ..FieldUpdate::default()
    }));
    assert_eq!(h.core.values().distance_m(), 0);
}

#[test]
fn distance_does_not_grow_while_disconnected() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    h.command(speed_kph(36.0));
    h.run_until(5_000);
    assert_eq!(h.core.values().distance_m(), 0);
}

#[test]
fn treadmill_frame_carries_incline() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    h.command(Command::SetFields(FieldUpdate {
        incline: Some(FieldValue::Real(-5.0)),
        ..FieldUpdate::default()
    }));
    h.connect(1);
    h.run_until(1_000);
    let frame = h.stack.notifications(TREADMILL_DATA_UUID).remove(0);
    assert_eq!(frame.len(), 11);
    assert_eq!(&frame[0..2], &[0x0C, 0x00]);
    assert_eq!(i16::from_le_bytes([frame[7], frame[8]]), -50);
    assert_eq!(&frame[9..11], &[0, 0]);
}
