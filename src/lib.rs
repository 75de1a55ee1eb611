//! BLE fitness device simulator library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each adapter.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod gatt;
pub mod model;
pub mod protocol;
pub mod scheduler;

// Real drivers on target, recording simulations on the host.
pub mod adapters;
