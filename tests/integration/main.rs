//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the recording stack in `mock_stack`. All tests run on the host
//! with no radio required.

mod command_router_tests;
mod mock_stack;
mod notification_tests;
mod protocol_flow_tests;
mod radio_lifecycle_tests;
