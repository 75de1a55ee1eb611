//! Concrete radio state handlers and table builder.
//!
//! ```text
//!  OFF ──[init]──▶ READY ──[profile built]──▶ ADVERTISING ◀──────────┐
//!                    ▲                          │      ▲              │
//!                    │                 [peer connects] │              │
//!                    │                          ▼      │              │
//!                    │                      CONNECTED ─┘              │
//!                    │           [disconnect(0) / peer disconnects]   │
//!                    │                          │                     │
//!                    │                 [disconnect(d>0)]              │
//!                    │                          ▼                     │
//!                    │                       PAUSED ──[resume_at]─────┘
//!                    │
//!                    └──[reinit_at]── TORNDOWN ◀──[teardown(d)]── any stack-up state
//!
//!  any stack-up state ──[identity = None]──▶ READY
//! ```
//!
//! Timer deadlines are written by the command router before it forces a
//! transition; handlers only compare them with `ctx.now_ms` and clear them
//! on exit, so a superseded timer can never fire.

use log::{debug, info, warn};

use super::context::{RadioAction, RadioContext};
use super::{StateDescriptor, StateId};
use crate::events::StackEvent;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Off
        StateDescriptor {
            id: StateId::Off,
            name: "Off",
            on_enter: Some(off_enter),
            on_exit: Some(off_exit),
            on_update: stay,
            on_event: off_event,
        },
        // Index 1 — Ready
        StateDescriptor {
            id: StateId::Ready,
            name: "Ready",
            on_enter: Some(ready_enter),
            on_exit: None,
            on_update: stay,
            on_event: reject_connection,
        },
        // Index 2 — Advertising
        StateDescriptor {
            id: StateId::Advertising,
            name: "Advertising",
            on_enter: Some(advertising_enter),
            on_exit: None,
            on_update: stay,
            on_event: advertising_event,
        },
        // Index 3 — Connected
        StateDescriptor {
            id: StateId::Connected,
            name: "Connected",
            on_enter: Some(connected_enter),
            on_exit: Some(connected_exit),
            on_update: stay,
            on_event: connected_event,
        },
        // Index 4 — Paused
        StateDescriptor {
            id: StateId::Paused,
            name: "Paused",
            on_enter: Some(paused_enter),
            on_exit: Some(paused_exit),
            on_update: paused_update,
            on_event: reject_connection,
        },
        // Index 5 — TornDown
        StateDescriptor {
            id: StateId::TornDown,
            name: "TornDown",
            on_enter: Some(torndown_enter),
            on_exit: Some(torndown_exit),
            on_update: torndown_update,
            on_event: off_event,
        },
    ]
}

fn stay(_ctx: &mut RadioContext) -> Option<StateId> {
    None
}

/// Stack-up states that do not accept centrals drop any that slip through.
fn reject_connection(ctx: &mut RadioContext, event: StackEvent) -> Option<StateId> {
    match event {
        StackEvent::Connected { conn } => {
            warn!("Central {:?} connected while not advertising, dropping", conn);
            ctx.request(RadioAction::Disconnect(conn));
        }
        StackEvent::Disconnected { conn } => {
            debug!("Late disconnect for {:?} ignored", conn);
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFF state — host stack not initialised
// ═══════════════════════════════════════════════════════════════════════════

fn off_enter(ctx: &mut RadioContext) {
    ctx.peer = None;
    ctx.timers = Default::default();
    info!("OFF: BLE stack down");
}

fn off_exit(ctx: &mut RadioContext) {
    ctx.request(RadioAction::InitStack);
}

/// No stack, no connections: whatever arrives is stale.
fn off_event(_ctx: &mut RadioContext, event: StackEvent) -> Option<StateId> {
    debug!("Stack event {:?} while stack is down, ignored", event);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY state — stack up, no profile advertised
// ═══════════════════════════════════════════════════════════════════════════

fn ready_enter(ctx: &mut RadioContext) {
    // Whatever profile was live goes away; the router rebuilds if needed.
    ctx.request(RadioAction::RemoveProfile);
    info!("READY: stack initialised, no profile");
}

// ═══════════════════════════════════════════════════════════════════════════
//  ADVERTISING state
// ═══════════════════════════════════════════════════════════════════════════

fn advertising_enter(ctx: &mut RadioContext) {
    ctx.request(RadioAction::StartAdvertising);
    info!("ADVERTISING: waiting for a central");
}

fn advertising_event(ctx: &mut RadioContext, event: StackEvent) -> Option<StateId> {
    match event {
        StackEvent::Connected { conn } => {
            ctx.peer = Some(conn);
            Some(StateId::Connected)
        }
        StackEvent::Disconnected { conn } => {
            debug!("Disconnect for {:?} while advertising ignored", conn);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTED state — one central attached, notifications flowing
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut RadioContext) {
    info!("CONNECTED: central {:?}", ctx.peer);
}

fn connected_exit(ctx: &mut RadioContext) {
    // Peer still present means the router is forcing us out.
    if let Some(conn) = ctx.peer.take() {
        ctx.request(RadioAction::Disconnect(conn));
    }
}

fn connected_event(ctx: &mut RadioContext, event: StackEvent) -> Option<StateId> {
    match event {
        StackEvent::Disconnected { conn } if ctx.peer == Some(conn) => {
            info!("CONNECTED: central {:?} left, resuming advertising", conn);
            ctx.peer = None;
            Some(StateId::Advertising)
        }
        StackEvent::Disconnected { conn } => {
            debug!("Disconnect for unknown {:?} ignored", conn);
            None
        }
        StackEvent::Connected { conn } => {
            warn!("Second central {:?} refused", conn);
            ctx.request(RadioAction::Disconnect(conn));
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAUSED state — timed radio silence after a forced disconnect
// ═══════════════════════════════════════════════════════════════════════════

fn paused_enter(ctx: &mut RadioContext) {
    ctx.request(RadioAction::StopAdvertising);
    info!("PAUSED: resume at {:?} ms", ctx.timers.resume_at_ms);
}

fn paused_exit(ctx: &mut RadioContext) {
    ctx.timers.resume_at_ms = None;
}

fn paused_update(ctx: &mut RadioContext) -> Option<StateId> {
    if ctx.timers.resume_due(ctx.now_ms) {
        info!("PAUSED: {} ms elapsed, resuming", ctx.ms_in_state());
        return Some(StateId::Advertising);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TORNDOWN state — stack fully released until reinit deadline
// ═══════════════════════════════════════════════════════════════════════════

fn torndown_enter(ctx: &mut RadioContext) {
    ctx.peer = None;
    ctx.request(RadioAction::ReleaseStack);
    info!("TORNDOWN: stack released, reinit at {:?} ms", ctx.timers.reinit_at_ms);
}

fn torndown_exit(ctx: &mut RadioContext) {
    ctx.timers.reinit_at_ms = None;
    ctx.request(RadioAction::InitStack);
}

fn torndown_update(ctx: &mut RadioContext) -> Option<StateId> {
    if ctx.timers.reinit_due(ctx.now_ms) {
        info!("TORNDOWN: {} ms elapsed, reinitialising", ctx.ms_in_state());
        return Some(StateId::Ready);
    }
    None
}
