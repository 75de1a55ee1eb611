//! Function-pointer finite state machine for radio presence.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                         │
//! │  ┌─────────────┬──────────┬──────────┬──────────────┬─────────────┐ │
//! │  │ StateId     │ on_enter │ on_exit  │ on_update    │ on_event    │ │
//! │  ├─────────────┼──────────┼──────────┼──────────────┼─────────────┤ │
//! │  │ Off         │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Opt │ fn(ctx,ev)  │ │
//! │  │ Ready       │ fn(ctx)  │    –     │ fn(ctx)->Opt │ fn(ctx,ev)  │ │
//! │  │ Advertising │ fn(ctx)  │    –     │ fn(ctx)->Opt │ fn(ctx,ev)  │ │
//! │  │ Connected   │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Opt │ fn(ctx,ev)  │ │
//! │  │ Paused      │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Opt │ fn(ctx,ev)  │ │
//! │  │ TornDown    │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Opt │ fn(ctx,ev)  │ │
//! │  └─────────────┴──────────┴──────────┴──────────────┴─────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `on_update` runs once per loop iteration and checks the pending timers
//! against `ctx.now_ms`. `on_event` consumes one queued stack event. Either
//! may return `Some(next)`, upon which the engine runs `on_exit` for the
//! current state and `on_enter` for the next. Handlers never call the stack;
//! they queue [`RadioAction`](context::RadioAction)s that the core applies
//! after the transition settles.

pub mod context;
pub mod states;

use context::RadioContext;
use log::info;

use crate::events::StackEvent;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Radio lifecycle states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Off = 0,
    Ready = 1,
    Advertising = 2,
    Connected = 3,
    Paused = 4,
    TornDown = 5,
}

impl StateId {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 6;

    /// Convert an index back to `StateId`. Out-of-range returns `Off`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Off,
            1 => Self::Ready,
            2 => Self::Advertising,
            3 => Self::Connected,
            4 => Self::Paused,
            5 => Self::TornDown,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Off
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Ready => "Ready",
            Self::Advertising => "Advertising",
            Self::Connected => "Connected",
            Self::Paused => "Paused",
            Self::TornDown => "TornDown",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut RadioContext);

/// Per-iteration update. Returns `Some(next)` to transition.
pub type StateUpdateFn = fn(&mut RadioContext) -> Option<StateId>;

/// Stack event handler. Returns `Some(next)` to transition.
pub type StateEventFn = fn(&mut RadioContext, StackEvent) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single radio state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct RadioFsm {
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    transitions: u32,
}

impl RadioFsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`. Call once after construction.
    pub fn start(&mut self, ctx: &mut RadioContext) {
        info!("Radio FSM starting in state: {}", self.table[self.current].name);
        ctx.entered_at_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Evaluate timers for the current state at `ctx.now_ms`.
    pub fn tick(&mut self, ctx: &mut RadioContext) {
        if let Some(next_id) = (self.table[self.current].on_update)(ctx) {
            self.transition(next_id, ctx);
        }
    }

    /// Feed one stack event to the current state.
    pub fn dispatch(&mut self, event: StackEvent, ctx: &mut RadioContext) {
        if let Some(next_id) = (self.table[self.current].on_event)(ctx, event) {
            self.transition(next_id, ctx);
        }
    }

    /// Command-driven transition. No-op when already in `next`.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut RadioContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// Number of transitions taken since construction.
    pub fn transition_count(&self) -> u32 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut RadioContext) {
        let next_idx = next_id as usize;

        info!(
            "Radio transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);
        ctx.entered_at_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
