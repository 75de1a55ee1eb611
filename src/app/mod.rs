//! Simulator core — pure domain logic, zero I/O.
//!
//! This module contains the rules of the simulated peripheral: command
//! routing, radio FSM orchestration, notification cadence and status
//! reporting. All interaction with the radio and the network happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
