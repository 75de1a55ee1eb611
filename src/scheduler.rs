//! Fixed-cadence scheduler for the main loop.
//!
//! Two periodic cadences drive the core besides stack events: the
//! characteristic notification tick and the coarse status publication. Both
//! are polled against the monotonic clock once per loop iteration and report
//! the real time elapsed since they last fired, so a late iteration is
//! absorbed rather than assumed away.
//!
//! ```text
//! ┌─────────────┐   due(now)   ┌──────────────────────────────┐
//! │ Scheduler   │─────────────▶│ Fired { Notify, elapsed }    │──▶ notify tick
//! │  notify     │              │ Fired { StatusReport, .. }   │──▶ status publish
//! │  status     │              └──────────────────────────────┘
//! └─────────────┘
//! ```

use heapless::Vec;

use crate::config::SimConfig;

// ═══════════════════════════════════════════════════════════════
//  Cadence types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Characteristic notification while connected.
    Notify,
    /// Status and values publication.
    StatusReport,
}

/// One cadence that came due during [`Scheduler::due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub cadence: Cadence,
    /// Actual time since this cadence last fired.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct Periodic {
    interval_ms: u64,
    last_fired_ms: u64,
}

impl Periodic {
    fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: u64::from(interval_ms.max(1)),
            last_fired_ms: 0,
        }
    }

    fn poll(&mut self, now_ms: u64) -> Option<u64> {
        let elapsed = now_ms.saturating_sub(self.last_fired_ms);
        if elapsed < self.interval_ms {
            return None;
        }
        self.last_fired_ms = now_ms;
        Some(elapsed)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

pub struct Scheduler {
    notify: Periodic,
    status: Periodic,
}

impl Scheduler {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            notify: Periodic::new(config.notify_interval_ms),
            status: Periodic::new(config.status_interval_ms),
        }
    }

    /// Anchor both cadences at `now_ms`.
    pub fn start(&mut self, now_ms: u64) {
        self.notify.last_fired_ms = now_ms;
        self.status.last_fired_ms = now_ms;
    }

    /// Cadences due at `now_ms`, notify first.
    pub fn due(&mut self, now_ms: u64) -> Vec<Fired, 2> {
        let mut fired = Vec::new();
        if let Some(elapsed_ms) = self.notify.poll(now_ms) {
            let _ = fired.push(Fired {
                cadence: Cadence::Notify,
                elapsed_ms,
            });
        }
        if let Some(elapsed_ms) = self.status.poll(now_ms) {
            let _ = fired.push(Fired {
                cadence: Cadence::StatusReport,
                elapsed_ms,
            });
        }
        fired
    }

    pub fn notify_interval_ms(&self) -> u64 {
        self.notify.interval_ms
    }
}
