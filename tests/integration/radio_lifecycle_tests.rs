//! Radio lifecycle: init, advertising, connect, timed pause, teardown.

use blesim::app::commands::{Command, DisconnectRequest};
use blesim::error::{CommandError, Error, PendingTimer, StackError};
use blesim::fsm::StateId;
use blesim::gatt::{HEART_RATE_SERVICE_UUID, TREADMILL_DATA_UUID};
use blesim::model::DeviceIdentity;

use crate::mock_stack::{Harness, MockStack, StackCall};

fn heart_rate_connected() -> Harness {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.connect(1);
    assert_eq!(h.core.state(), StateId::Connected);
    h
}

fn disconnect(duration_ms: i64, teardown: bool) -> Command {
    Command::Disconnect(DisconnectRequest {
        duration_ms,
        teardown,
    })
}

// ── Bring-up ──────────────────────────────────────────────────

#[test]
fn start_initialises_stack_without_profile() {
    let h = Harness::new();
    assert_eq!(h.core.state(), StateId::Ready);
    assert_eq!(h.stack.calls[0], StackCall::Init("BLE Simulator".into()));
    assert_eq!(h.stack.live_services(), 0);
    assert!(!h.stack.advertising);
    let status = h.sink.last_status().unwrap();
    assert!(!status.ble_started);
    assert_eq!(status.radio, StateId::Ready);
}

#[test]
fn heart_rate_identity_advertises_under_its_name() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    assert_eq!(h.core.state(), StateId::Advertising);
    assert_eq!(h.stack.live_services(), 2);
    assert_eq!(h.stack.advertised_name, Some("HR Simulator"));
    assert!(h.sink.last_status().unwrap().ble_started);
}

#[test]
fn identity_none_returns_to_ready() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    h.command(Command::SetIdentity(DeviceIdentity::None));
    assert_eq!(h.core.state(), StateId::Ready);
    assert_eq!(h.stack.live_services(), 0);
    assert!(!h.stack.advertising);
    assert!(h.stack.initialised);
}

#[test]
fn init_failure_leaves_radio_off_until_next_identity() {
    let mut h = Harness::with_stack(MockStack::failing_init());
    assert_eq!(h.core.state(), StateId::Off);
    assert!(h.sink.faults().contains(&Error::Stack(StackError::InitFailed)));

    h.command(disconnect(0, true));
    assert!(
        h.sink
            .faults()
            .contains(&Error::InvalidCommand(CommandError::StackOffline))
    );

    h.stack.fail_init = false;
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    assert_eq!(h.core.state(), StateId::Advertising);
}

#[test]
fn advertising_failure_falls_back_to_ready() {
    let mut h = Harness::with_stack(MockStack::failing_advertising());
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    assert_eq!(h.core.state(), StateId::Ready);
    assert!(
        h.sink
            .faults()
            .contains(&Error::Stack(StackError::AdvertisingFailed))
    );
}

#[test]
fn failed_profile_build_registers_nothing() {
    let mut h = Harness::with_stack(MockStack::failing_characteristic());
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    assert_eq!(h.core.state(), StateId::Ready);
    assert_eq!(h.stack.live_services(), 0);
    assert!(!h.core.profile().is_built());
    assert!(
        h.sink
            .faults()
            .contains(&Error::Stack(StackError::CharacteristicCreateFailed))
    );
}

// ── Connections ───────────────────────────────────────────────

#[test]
fn central_connect_and_leave() {
    let mut h = heart_rate_connected();
    assert!(h.core.connection().ble_client);
    assert!(h.sink.last_status().unwrap().ble_client);

    h.stack.clear_calls();
    h.peer_leaves(1);
    assert_eq!(h.core.state(), StateId::Advertising);
    assert!(!h.core.connection().ble_client);
    assert_eq!(
        h.stack
            .count(|c| matches!(c, StackCall::StartAdvertising("HR Simulator"))),
        1
    );
}

#[test]
fn disconnect_of_unknown_peer_is_ignored() {
    let mut h = heart_rate_connected();
    h.peer_leaves(9);
    assert_eq!(h.core.state(), StateId::Connected);
}

#[test]
fn immediate_disconnect_resumes_advertising() {
    let mut h = heart_rate_connected();
    h.command(disconnect(0, false));
    assert_eq!(h.core.state(), StateId::Advertising);
    assert!(h.stack.calls.contains(&StackCall::Disconnect(blesim::app::ports::ConnHandle(1))));
    assert!(h.stack.advertising);
}

#[test]
fn timed_disconnect_pauses_until_deadline() {
    let mut h = heart_rate_connected();
    h.run_until(100);
    h.command(disconnect(500, false));
    assert_eq!(h.core.state(), StateId::Paused);
    assert!(!h.stack.advertising);
    assert_eq!(h.core.radio().resume_at_ms, Some(600));

    h.run_until(590);
    assert_eq!(h.core.state(), StateId::Paused);
    h.run_until(600);
    assert_eq!(h.core.state(), StateId::Advertising);
    assert!(h.stack.advertising);
    assert_eq!(h.core.radio().resume_at_ms, None);
}

#[test]
fn central_connecting_while_paused_is_dropped() {
    let mut h = heart_rate_connected();
    h.command(disconnect(1_000, false));
    h.stack.clear_calls();
    h.connect(2);
    assert_eq!(h.core.state(), StateId::Paused);
    assert_eq!(
        h.stack.calls,
        vec![StackCall::Disconnect(blesim::app::ports::ConnHandle(2))]
    );
}

#[test]
fn disconnect_while_paused_replaces_the_pause() {
    let mut h = heart_rate_connected();
    h.command(disconnect(1_000, false));
    h.command(disconnect(0, false));
    assert_eq!(h.core.state(), StateId::Advertising);
    assert!(
        h.sink
            .faults()
            .contains(&Error::TimerRace(PendingTimer::Resume))
    );
}

// ── Teardown ──────────────────────────────────────────────────

#[test]
fn teardown_releases_stack_and_restores_profile() {
    let mut h = heart_rate_connected();
    h.run_until(100);
    h.command(disconnect(2_000, true));
    assert_eq!(h.core.state(), StateId::TornDown);
    assert!(!h.stack.initialised);
    assert!(!h.core.profile().is_built());
    assert_eq!(h.stack.live_services(), 0);

    h.stack.clear_calls();
    h.run_until(2_090);
    assert_eq!(h.core.state(), StateId::TornDown);
    assert_eq!(h.stack.count(|c| matches!(c, StackCall::Notify { .. })), 0);
    assert!(h.stack.calls.is_empty());

    h.run_until(2_100);
    assert_eq!(h.core.state(), StateId::Advertising);
    assert!(h.stack.initialised);
    assert_eq!(h.stack.live_services(), 2);
    assert_eq!(
        h.stack
            .count(|c| matches!(c, StackCall::CreateService(HEART_RATE_SERVICE_UUID))),
        1
    );
}

#[test]
fn teardown_without_duration_uses_default() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    h.command(disconnect(0, true));
    assert_eq!(h.core.radio().reinit_at_ms, Some(3_000));
    h.run_until(2_990);
    assert_eq!(h.core.state(), StateId::TornDown);
    h.run_until(3_000);
    assert_eq!(h.core.state(), StateId::Advertising);
    assert_eq!(h.stack.live_characteristics(TREADMILL_DATA_UUID), 1);
}

#[test]
fn teardown_during_teardown_extends_deadline() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.command(disconnect(1_000, true));
    h.run_until(500);
    h.command(disconnect(1_000, true));
    assert_eq!(h.core.radio().reinit_at_ms, Some(1_500));
    assert!(
        h.sink
            .faults()
            .contains(&Error::TimerRace(PendingTimer::Reinit))
    );
    h.run_until(1_490);
    assert_eq!(h.core.state(), StateId::TornDown);
    h.run_until(1_500);
    assert_eq!(h.core.state(), StateId::Advertising);
}

#[test]
fn identity_change_supersedes_teardown() {
    let mut h = Harness::new();
    h.command(Command::SetIdentity(DeviceIdentity::HeartRate));
    h.command(disconnect(5_000, true));
    h.run_until(100);
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    assert_eq!(h.core.state(), StateId::Advertising);
    assert_eq!(h.stack.advertised_name, Some("Treadmill Sim"));
    assert_eq!(h.core.radio().reinit_at_ms, None);

    // the stale deadline never fires
    h.stack.clear_calls();
    h.run_until(6_000);
    assert_eq!(h.stack.count(|c| matches!(c, StackCall::Init(_))), 0);
    assert_eq!(h.core.state(), StateId::Advertising);
}

#[test]
fn identity_change_supersedes_pause() {
    let mut h = heart_rate_connected();
    h.command(disconnect(1_000, false));
    h.command(Command::SetIdentity(DeviceIdentity::Treadmill));
    assert_eq!(h.core.state(), StateId::Advertising);
    assert!(
        h.sink
            .faults()
            .contains(&Error::TimerRace(PendingTimer::Resume))
    );
    h.stack.clear_calls();
    h.run_until(2_000);
    assert_eq!(
        h.stack
            .count(|c| matches!(c, StackCall::StartAdvertising(_))),
        0
    );
}
