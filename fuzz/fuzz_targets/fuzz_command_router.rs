//! Fuzz target: `SimulatorCore` command routing
//!
//! Interprets the input as a script of MQTT messages, central connects and
//! disconnects and clock advances, run against the simulated NimBLE stack.
//! After every step the radio and the GATT registry must agree:
//! no profile while the stack is released, never a duplicated
//! characteristic.
//!
//! cargo fuzz run fuzz_command_router

#![no_main]

use blesim::adapters::ble::BleAdapter;
use blesim::adapters::log_sink::LogEventSink;
use blesim::app::ports::ConnHandle;
use blesim::app::service::SimulatorCore;
use blesim::config::SimConfig;
use blesim::events::StackEventQueue;
use blesim::fsm::StateId;
use blesim::gatt::{HEART_RATE_MEASUREMENT_UUID, TREADMILL_DATA_UUID};
use blesim::protocol::{InboundTopic, decode_command};
use libfuzzer_sys::fuzz_target;

static EVENTS: StackEventQueue = StackEventQueue::new();

fuzz_target!(|data: &[u8]| {
    while EVENTS.pop().is_some() {}

    let mut ble = BleAdapter::new(&EVENTS);
    let mut sink = LogEventSink::new();
    let mut core = SimulatorCore::new(SimConfig::default());
    let mut now = 0u64;
    core.start(now, &mut ble, &mut sink);

    for step in data.split(|b| *b == 0xFF) {
        let Some((&op, rest)) = step.split_first() else {
            continue;
        };
        match op % 6 {
            0..=2 => {
                let topic = InboundTopic::ALL[usize::from(op % 3)];
                match decode_command(topic, rest) {
                    Ok(cmd) => core.handle_command(cmd, now, &mut ble, &mut sink),
                    Err(e) => core.reject(e, &mut sink),
                }
            }
            3 => ble.sim_connect(ConnHandle(u16::from(rest.first().copied().unwrap_or(1)))),
            4 => ble.sim_peer_leaves(),
            _ => now += u64::from(rest.first().copied().unwrap_or(0)) * 100,
        }
        core.poll(now, &EVENTS, &mut ble, &mut sink);

        if matches!(core.state(), StateId::Off | StateId::TornDown) {
            assert!(!core.profile().is_built());
            assert!(!ble.is_initialised());
        }
        assert!(ble.characteristics_with_uuid(TREADMILL_DATA_UUID).len() <= 1);
        assert!(ble.characteristics_with_uuid(HEART_RATE_MEASUREMENT_UUID).len() <= 1);
    }
});
