//! Unified error types for the BLE simulator firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the core can
//! surface faults on the event sink uniformly. All variants are `Copy` so they
//! travel through the state machine and event sink without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fault the core reports funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A BLE stack primitive failed.
    Stack(StackError),
    /// An inbound command was malformed, out of range or not applicable.
    InvalidCommand(CommandError),
    /// A newer command replaced a pending timer.
    TimerRace(PendingTimer),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack(e) => write!(f, "stack: {e}"),
            Self::InvalidCommand(e) => write!(f, "invalid command: {e}"),
            Self::TimerRace(t) => write!(f, "timer race: {t} timer superseded"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Timer races are resolved in place and are informational only.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::TimerRace(_))
    }
}

// ---------------------------------------------------------------------------
// Stack errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// Host stack / controller initialisation failed.
    InitFailed,
    /// A primitive was called while the stack is released.
    NotInitialised,
    /// GATT service could not be created or started.
    ServiceCreateFailed,
    /// GATT characteristic could not be created.
    CharacteristicCreateFailed,
    /// Unknown service or characteristic handle.
    UnknownHandle,
    /// Advertising could not be configured or started.
    AdvertisingFailed,
    /// Notification could not be queued to the peer.
    NotifyFailed,
    /// Peer connection could not be terminated.
    DisconnectFailed,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "BLE init failed"),
            Self::NotInitialised => write!(f, "BLE stack not initialised"),
            Self::ServiceCreateFailed => write!(f, "service creation failed"),
            Self::CharacteristicCreateFailed => write!(f, "characteristic creation failed"),
            Self::UnknownHandle => write!(f, "unknown attribute handle"),
            Self::AdvertisingFailed => write!(f, "advertising start failed"),
            Self::NotifyFailed => write!(f, "notify failed"),
            Self::DisconnectFailed => write!(f, "disconnect failed"),
        }
    }
}

impl From<StackError> for Error {
    fn from(e: StackError) -> Self {
        Self::Stack(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Payload is not valid JSON or not a JSON object.
    BadPayload,
    /// Topic does not belong to this device or names no command.
    UnknownTopic,
    /// Field has the wrong JSON type.
    Malformed(&'static str),
    /// Field value is outside its representable range.
    OutOfRange(&'static str),
    /// Disconnect requested with no client connected and no pause pending.
    NoClient,
    /// Teardown requested while the stack is already off.
    StackOffline,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPayload => write!(f, "payload is not a JSON object"),
            Self::UnknownTopic => write!(f, "unknown topic"),
            Self::Malformed(field) => write!(f, "field '{field}' has the wrong type"),
            Self::OutOfRange(field) => write!(f, "field '{field}' out of range"),
            Self::NoClient => write!(f, "no BLE client connected"),
            Self::StackOffline => write!(f, "BLE stack is off"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::InvalidCommand(e)
    }
}

// ---------------------------------------------------------------------------
// Pending timers
// ---------------------------------------------------------------------------

/// The two delayed actions the radio state machine can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTimer {
    /// Resume advertising after a timed disconnect.
    Resume,
    /// Re-initialise the stack after a teardown.
    Reinit,
}

impl fmt::Display for PendingTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "resume"),
            Self::Reinit => write!(f, "reinit"),
        }
    }
}

/// Convenience alias used throughout the firmware.
pub type Result<T> = core::result::Result<T, Error>;
