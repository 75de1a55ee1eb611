//! Shared context threaded through every radio state handler.
//!
//! `RadioContext` is the blackboard: handlers read the clock and the pending
//! timers, record the connected peer and queue [`RadioAction`]s. The core
//! drains the action queue against the BLE stack port after each transition.

use heapless::Deque;
use log::warn;

use crate::app::ports::ConnHandle;

/// Capacity of the action queue. One transition queues at most three.
const ACTION_QUEUE_CAP: usize = 8;

// ---------------------------------------------------------------------------
// Radio actions (written by state handlers; applied by the core)
// ---------------------------------------------------------------------------

/// Stack side effects requested by state handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioAction {
    /// Bring the BLE host up.
    InitStack,
    /// Advertise the active profile.
    StartAdvertising,
    StopAdvertising,
    /// Terminate a central's connection.
    Disconnect(ConnHandle),
    /// Stop advertising and remove every registered service.
    RemoveProfile,
    /// Release the whole stack, invalidating all handles.
    ReleaseStack,
}

// ---------------------------------------------------------------------------
// Pending timers
// ---------------------------------------------------------------------------

/// Delayed actions, as absolute monotonic deadlines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingTimers {
    /// Paused → Advertising deadline.
    pub resume_at_ms: Option<u64>,
    /// TornDown → Ready deadline.
    pub reinit_at_ms: Option<u64>,
}

impl PendingTimers {
    pub fn resume_due(&self, now_ms: u64) -> bool {
        self.resume_at_ms.is_some_and(|at| now_ms >= at)
    }

    pub fn reinit_due(&self, now_ms: u64) -> bool {
        self.reinit_at_ms.is_some_and(|at| now_ms >= at)
    }
}

// ---------------------------------------------------------------------------
// RadioContext
// ---------------------------------------------------------------------------

pub struct RadioContext {
    // -- Timing --
    /// Monotonic clock, set by the core before every FSM call.
    pub now_ms: u64,
    /// Clock value at the last transition.
    pub entered_at_ms: u64,
    pub timers: PendingTimers,

    // -- Link --
    /// Central currently connected, if any.
    pub peer: Option<ConnHandle>,

    // -- Outputs --
    actions: Deque<RadioAction, ACTION_QUEUE_CAP>,
}

impl RadioContext {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            entered_at_ms: 0,
            timers: PendingTimers::default(),
            peer: None,
            actions: Deque::new(),
        }
    }

    /// Queue a stack action for the core to apply.
    pub fn request(&mut self, action: RadioAction) {
        if self.actions.push_back(action).is_err() {
            warn!("Radio action queue full, dropping {:?}", action);
        }
    }

    /// Oldest pending action.
    pub fn take_action(&mut self) -> Option<RadioAction> {
        self.actions.pop_front()
    }

    /// Drop every queued action (used after a stack init failure).
    pub fn discard_actions(&mut self) {
        self.actions.clear();
    }

    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_at_ms)
    }
}

impl Default for RadioContext {
    fn default() -> Self {
        Self::new()
    }
}
