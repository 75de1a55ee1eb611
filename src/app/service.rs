//! Simulator service — the hexagonal core.
//!
//! [`SimulatorCore`] owns the value model, the radio FSM and its context,
//! the live GATT profile and the cadence scheduler. It is the only writer of
//! any of them. All I/O flows through port traits injected at call sites,
//! making the whole service testable with mock adapters.
//!
//! ```text
//!  Command ──────▶ ┌──────────────────────────┐ ──▶ EventSink
//!                  │      SimulatorCore       │
//!  StackEvent ───▶ │  Values · FSM · Profile  │ ──▶ BleStackPort
//!  (queue)         │  Scheduler               │
//!                  └──────────────────────────┘
//! ```
//!
//! One loop iteration calls [`SimulatorCore::poll`]; commands arrive through
//! [`SimulatorCore::handle_command`] between polls. Stack callbacks never
//! reach this type directly, they go through the [`StackEventQueue`].

use log::{debug, info, warn};

use crate::config::SimConfig;
use crate::error::{CommandError, Error, PendingTimer};
use crate::events::{StackEvent, StackEventQueue};
use crate::fsm::context::{RadioAction, RadioContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{RadioFsm, StateId};
use crate::gatt::CharRole;
use crate::gatt::encoder::{encode_battery_level, encode_heart_rate, encode_treadmill_data};
use crate::gatt::profile::GattProfile;
use crate::model::{ConnectionState, DeviceIdentity, SimulatedValues};
use crate::scheduler::{Cadence, Scheduler};

use super::commands::{self, Command, Connectivity, DisconnectRequest, FieldUpdate};
use super::events::{CoreEvent, StatusReport, ValuesReport};
use super::ports::{BleStackPort, EventSink};

// ───────────────────────────────────────────────────────────────
// Radio snapshot
// ───────────────────────────────────────────────────────────────

/// State-machine position plus pending deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioState {
    pub state: StateId,
    pub resume_at_ms: Option<u64>,
    pub reinit_at_ms: Option<u64>,
}

// ───────────────────────────────────────────────────────────────
// SimulatorCore
// ───────────────────────────────────────────────────────────────

pub struct SimulatorCore {
    config: SimConfig,
    fsm: RadioFsm,
    ctx: RadioContext,
    identity: DeviceIdentity,
    values: SimulatedValues,
    links: ConnectionState,
    profile: GattProfile,
    scheduler: Scheduler,
}

impl SimulatorCore {
    /// Construct the core in `Off`. Call [`start`](Self::start) next.
    pub fn new(config: SimConfig) -> Self {
        let scheduler = Scheduler::new(&config);
        Self {
            config,
            fsm: RadioFsm::new(build_state_table(), StateId::Off),
            ctx: RadioContext::new(),
            identity: DeviceIdentity::None,
            values: SimulatedValues::default(),
            links: ConnectionState::default(),
            profile: GattProfile::new(),
            scheduler,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring the stack up (Off → Ready) and anchor the cadences at `now_ms`.
    pub fn start(
        &mut self,
        now_ms: u64,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        self.fsm.start(&mut self.ctx);
        self.scheduler.start(now_ms);
        self.transition(StateId::Ready, stack, sink);
        sink.emit(&CoreEvent::Started(self.state()));
        info!("SimulatorCore started in {:?}", self.state());
        self.publish(sink);
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// One loop iteration: stack events, timer expiry, cadences.
    pub fn poll(
        &mut self,
        now_ms: u64,
        events: &StackEventQueue,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        let transitions_before = self.fsm.transition_count();

        // 1. Stack events queued by the host task
        events.drain(|event| self.on_stack_event(event, stack, sink));

        // 2. Pending timers
        let prev = self.state();
        self.fsm.tick(&mut self.ctx);
        let resumed_from_teardown = prev == StateId::TornDown;
        self.settle(prev, stack, sink);
        if resumed_from_teardown && self.state() == StateId::Ready {
            self.bring_up(stack, sink);
        }

        // 3. Cadences
        for fired in self.scheduler.due(now_ms) {
            match fired.cadence {
                Cadence::Notify => self.notify_tick(fired.elapsed_ms, stack, sink),
                Cadence::StatusReport => self.publish(sink),
            }
        }

        if self.fsm.transition_count() != transitions_before {
            self.publish(sink);
        }
    }

    /// Apply one external command. The router is the single writer of the
    /// value model and the radio state.
    pub fn handle_command(
        &mut self,
        command: Command,
        now_ms: u64,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        debug!("Command: {:?}", command);

        match command {
            Command::SetIdentity(identity) => self.set_identity(identity, stack, sink),
            Command::SetFields(update) => self.set_fields(&update, stack, sink),
            Command::Disconnect(request) => self.disconnect(request, stack, sink),
            Command::ReportConnectivity(links) => self.report_connectivity(links),
        }

        self.publish(sink);
    }

    /// Surface a command the transport could not decode.
    pub fn reject(&mut self, error: CommandError, sink: &mut impl EventSink) {
        self.fault(error.into(), sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn radio(&self) -> RadioState {
        RadioState {
            state: self.state(),
            resume_at_ms: self.ctx.timers.resume_at_ms,
            reinit_at_ms: self.ctx.timers.reinit_at_ms,
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn values(&self) -> SimulatedValues {
        self.values
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.links
    }

    pub fn profile(&self) -> &GattProfile {
        &self.profile
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            identity: self.identity,
            ble_started: self.identity.is_active(),
            radio: self.state(),
            ble_client: self.links.ble_client,
            wifi: self.links.wifi,
            mqtt: self.links.mqtt,
            ip: self.links.ip.clone(),
        }
    }

    pub fn values_report(&self) -> ValuesReport {
        ValuesReport::from_values(self.identity, &self.values)
    }

    // ── Command handlers ──────────────────────────────────────

    fn set_identity(
        &mut self,
        identity: DeviceIdentity,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        info!("Configuring as {:?}", identity);
        self.identity = identity;

        match self.state() {
            StateId::TornDown => self.supersede(PendingTimer::Reinit, sink),
            StateId::Paused => self.supersede(PendingTimer::Resume, sink),
            _ => {}
        }

        // Off and TornDown reinitialise on the way; Connected force-disconnects.
        self.transition(StateId::Ready, stack, sink);
        if self.state() != StateId::Ready {
            return;
        }
        self.bring_up(stack, sink);
    }

    fn set_fields(
        &mut self,
        update: &FieldUpdate,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        if update.is_empty() {
            debug!("Empty field update");
        }

        if let Some(v) = update.heart_rate {
            match commands::heart_rate_bpm(v) {
                Ok(bpm) => self.values.set_heart_rate(bpm),
                Err(e) => self.reject(e, sink),
            }
        }

        if let Some(v) = update.battery {
            match commands::battery_raw(v) {
                Ok(raw) => {
                    let stored = self.values.set_battery(raw);
                    self.refresh_battery(stored, stack, sink);
                }
                Err(e) => self.reject(e, sink),
            }
        }

        if let Some(v) = update.speed {
            match commands::speed_centi_kph(v) {
                Ok(centi) => self.values.set_speed(centi),
                Err(e) => self.reject(e, sink),
            }
        }

        if let Some(v) = update.incline {
            match commands::incline_deci_pct(v) {
                Ok(deci) => self.values.set_incline(deci),
                Err(e) => self.reject(e, sink),
            }
        }

        if let Some(v) = update.distance {
            match commands::distance_m(v) {
                Ok(m) => self.values.reset_distance(m),
                Err(e) => self.reject(e, sink),
            }
        }
    }

    fn disconnect(
        &mut self,
        request: DisconnectRequest,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        let duration = match commands::duration_ms(request.duration_ms) {
            Ok(d) => u64::from(d),
            Err(e) => return self.reject(e, sink),
        };
        let now = self.ctx.now_ms;

        if request.teardown {
            let duration = if duration == 0 {
                u64::from(self.config.default_teardown_ms)
            } else {
                duration
            };
            match self.state() {
                StateId::Off => self.reject(CommandError::StackOffline, sink),
                StateId::TornDown => {
                    self.supersede(PendingTimer::Reinit, sink);
                    self.ctx.timers.reinit_at_ms = Some(now + duration);
                    info!("Teardown extended, reinit in {} ms", duration);
                }
                state => {
                    if state == StateId::Paused {
                        self.supersede(PendingTimer::Resume, sink);
                    }
                    info!("Tearing down BLE stack for {} ms", duration);
                    self.ctx.timers.reinit_at_ms = Some(now + duration);
                    self.transition(StateId::TornDown, stack, sink);
                }
            }
            return;
        }

        match self.state() {
            StateId::Connected | StateId::Paused => {
                if self.state() == StateId::Paused {
                    self.supersede(PendingTimer::Resume, sink);
                }
                if duration == 0 {
                    info!("Disconnecting client, advertising resumes now");
                    self.transition(StateId::Advertising, stack, sink);
                } else {
                    info!("Disconnecting client, advertising paused for {} ms", duration);
                    self.ctx.timers.resume_at_ms = Some(now + duration);
                    self.transition(StateId::Paused, stack, sink);
                }
            }
            _ => {
                info!("No BLE client connected to disconnect");
                self.reject(CommandError::NoClient, sink);
            }
        }
    }

    fn report_connectivity(&mut self, links: Connectivity) {
        self.links.wifi = links.wifi;
        self.links.mqtt = links.mqtt;
        self.links.ip = links.ip;
    }

    // ── Stack events ──────────────────────────────────────────

    fn on_stack_event(
        &mut self,
        event: StackEvent,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        let prev = self.state();
        self.fsm.dispatch(event, &mut self.ctx);
        self.settle(prev, stack, sink);
    }

    // ── Notification cadence ──────────────────────────────────

    fn notify_tick(
        &mut self,
        elapsed_ms: u64,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        if self.state() != StateId::Connected {
            return;
        }
        match self.identity {
            DeviceIdentity::None => {}
            DeviceIdentity::HeartRate => {
                let payload = encode_heart_rate(self.values.heart_rate_bpm());
                self.notify(CharRole::HeartRateMeasurement, &payload, stack, sink);
            }
            DeviceIdentity::Treadmill => {
                self.values.advance_distance(elapsed_ms);
                let payload = encode_treadmill_data(&self.values);
                self.notify(CharRole::TreadmillData, &payload, stack, sink);
            }
        }
    }

    fn notify(
        &mut self,
        role: CharRole,
        payload: &[u8],
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        let Some(handle) = self.profile.characteristic(role) else {
            debug!("No {:?} handle registered, notify skipped", role);
            return;
        };
        stack.set_value(handle, payload);
        if let Err(e) = stack.notify(handle, payload) {
            self.fault(e.into(), sink);
        }
    }

    fn refresh_battery(
        &mut self,
        pct: u8,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        let payload = encode_battery_level(pct);
        if self.state() == StateId::Connected {
            self.notify(CharRole::BatteryLevel, &payload, stack, sink);
        } else if let Some(handle) = self.profile.characteristic(CharRole::BatteryLevel) {
            stack.set_value(handle, &payload);
        }
    }

    // ── Transitions and radio actions ─────────────────────────

    fn transition(
        &mut self,
        next: StateId,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        let prev = self.state();
        self.fsm.force_transition(next, &mut self.ctx);
        self.settle(prev, stack, sink);
    }

    /// Report a move away from `prev` and apply the queued radio actions.
    fn settle(
        &mut self,
        prev: StateId,
        stack: &mut impl BleStackPort,
        sink: &mut impl EventSink,
    ) {
        let now = self.state();
        if now != prev {
            self.links.ble_client = now == StateId::Connected;
            sink.emit(&CoreEvent::StateChanged { from: prev, to: now });
        }
        self.apply_actions(stack, sink);
    }

    fn apply_actions(&mut self, stack: &mut impl BleStackPort, sink: &mut impl EventSink) {
        while let Some(action) = self.ctx.take_action() {
            match action {
                RadioAction::InitStack => {
                    if let Err(e) = stack.init(&self.config.stack_device_name) {
                        self.ctx.discard_actions();
                        self.fault(e.into(), sink);
                        self.transition(StateId::Off, stack, sink);
                        return;
                    }
                    info!("BLE stack initialised as '{}'", self.config.stack_device_name);
                }
                RadioAction::StartAdvertising => match self.profile.advertising() {
                    Some(adv) => {
                        if let Err(e) = stack.start_advertising(&adv) {
                            self.fault(e.into(), sink);
                            self.transition(StateId::Ready, stack, sink);
                        } else {
                            info!("Advertising as '{}'", adv.device_name);
                        }
                    }
                    None => {
                        warn!("No profile to advertise");
                        self.transition(StateId::Ready, stack, sink);
                    }
                },
                RadioAction::StopAdvertising => stack.stop_advertising(),
                RadioAction::Disconnect(conn) => {
                    if let Err(e) = stack.disconnect(conn) {
                        self.fault(e.into(), sink);
                    }
                }
                RadioAction::RemoveProfile => {
                    stack.stop_advertising();
                    self.profile.remove(stack);
                }
                RadioAction::ReleaseStack => {
                    self.profile.forget();
                    stack.deinit();
                    info!("BLE stack released");
                }
            }
        }
    }

    /// Ready → Advertising for the current identity. Stays in Ready on failure.
    fn bring_up(&mut self, stack: &mut impl BleStackPort, sink: &mut impl EventSink) {
        if !self.identity.is_active() {
            debug!("No identity selected, staying in Ready");
            return;
        }
        match self.profile.build(self.identity, &self.values, stack) {
            Ok(()) => self.transition(StateId::Advertising, stack, sink),
            Err(e) => self.fault(e.into(), sink),
        }
    }

    /// Cancel a pending timer ahead of the transition that replaces it.
    fn supersede(&mut self, timer: PendingTimer, sink: &mut impl EventSink) {
        let slot = match timer {
            PendingTimer::Resume => &mut self.ctx.timers.resume_at_ms,
            PendingTimer::Reinit => &mut self.ctx.timers.reinit_at_ms,
        };
        if slot.take().is_some() {
            info!("Pending {} timer superseded", timer);
            self.fault(Error::TimerRace(timer), sink);
        }
    }

    fn fault(&mut self, error: Error, sink: &mut impl EventSink) {
        if error.is_informational() {
            debug!("{}", error);
        } else {
            warn!("{}", error);
        }
        sink.emit(&CoreEvent::Fault(error));
    }

    fn publish(&self, sink: &mut impl EventSink) {
        sink.emit(&CoreEvent::Status(self.status_report()));
        sink.emit(&CoreEvent::Values(self.values_report()));
    }
}
