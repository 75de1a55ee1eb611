//! Stack event boundary queue.
//!
//! NimBLE reports connects and disconnects from its host task. Those
//! callbacks never touch simulator state; they push a [`StackEvent`] here and
//! the main loop drains the queue once per iteration.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ on_connect   │────▶│  StackEvent  │     │  Main Loop   │
//! │ on_disconnect│────▶│  Queue       │────▶│  (consumer)  │
//! │ (host task)  │     │  (lock-free) │     │              │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::app::ports::ConnHandle;

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const STACK_EVENT_QUEUE_CAP: usize = 16;

const KIND_CONNECTED: u32 = 1;
const KIND_DISCONNECTED: u32 = 2;

/// Connection lifecycle notifications from the BLE host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEvent {
    Connected { conn: ConnHandle },
    Disconnected { conn: ConnHandle },
}

impl StackEvent {
    fn encode(self) -> u32 {
        match self {
            Self::Connected { conn } => (KIND_CONNECTED << 16) | u32::from(conn.0),
            Self::Disconnected { conn } => (KIND_DISCONNECTED << 16) | u32::from(conn.0),
        }
    }

    fn decode(raw: u32) -> Option<Self> {
        let conn = ConnHandle((raw & 0xFFFF) as u16);
        match raw >> 16 {
            KIND_CONNECTED => Some(Self::Connected { conn }),
            KIND_DISCONNECTED => Some(Self::Disconnected { conn }),
            _ => None,
        }
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// The host task writes (produces), the main loop reads (consumes).
// Slots are atomics so the queue can live in a plain `static`.

pub struct StackEventQueue {
    head: AtomicU8,
    tail: AtomicU8,
    slots: [AtomicU32; STACK_EVENT_QUEUE_CAP],
}

impl StackEventQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            slots: [const { AtomicU32::new(0) }; STACK_EVENT_QUEUE_CAP],
        }
    }

    /// Push an event. Single producer only.
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: StackEvent) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % STACK_EVENT_QUEUE_CAP as u8;

        if next_head == tail {
            return false;
        }

        self.slots[head as usize].store(event.encode(), Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    /// Pop the oldest event. Single consumer only.
    pub fn pop(&self) -> Option<StackEvent> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            let raw = self.slots[tail as usize].load(Ordering::Relaxed);
            self.tail
                .store((tail + 1) % STACK_EVENT_QUEUE_CAP as u8, Ordering::Release);

            // Undecodable slots cannot be produced by `push`; skip them.
            if let Some(event) = StackEvent::decode(raw) {
                return Some(event);
            }
        }
    }

    /// Drain all pending events into a callback, in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(StackEvent)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        tail == head
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + STACK_EVENT_QUEUE_CAP - tail) % STACK_EVENT_QUEUE_CAP
    }
}

impl Default for StackEventQueue {
    fn default() -> Self {
        Self::new()
    }
}
