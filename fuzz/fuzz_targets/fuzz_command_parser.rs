//! Fuzz target: `command::parse`
//!
//! Feeds arbitrary payloads to every command shape and checks that at
//! most one shape claims a payload and that parsing never panics.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use busnode::protocol::command::{
    self, parse_ping, parse_sys_get, parse_sys_set, parse_temperature_query,
};
use libfuzzer_sys::fuzz_target;

const PING: &str = "{ID}.OUT.210.gSTATUS";

fuzz_target!(|data: &[u8]| {
    let Some((&id, payload)) = data.split_first() else {
        return;
    };
    let device = u16::from(id).max(1);

    let claimed = [
        parse_sys_set(payload).is_some(),
        parse_sys_get(payload).is_some(),
        parse_ping(payload, PING, device).is_some(),
        parse_temperature_query(payload).is_some(),
    ];
    assert!(claimed.iter().filter(|c| **c).count() <= 1);
    assert_eq!(
        command::parse(payload, PING, device).is_some(),
        claimed.iter().any(|c| *c)
    );
});
