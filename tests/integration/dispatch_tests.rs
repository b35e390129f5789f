//! Command dispatch end to end: frame in, reply frame out.

use busnode::app::events::AppEvent;
use busnode::app::ports::{MappingPort, NetworkPort};
use busnode::config::NodeConfig;
use busnode::protocol::engine::{GET_HOLDOFF_MS, REJECT_HOLDOFF_MS, SET_HOLDOFF_MS};

use super::mock_hw::{Rig, quiet_config};

const PROBE_A: &str = "28FF4C3E9116045A";
const PROBE_B: &str = "28AA00000000017C";

// ── Temperature queries ──────────────────────────────────────

#[test]
fn temperature_query_answers_with_mapped_probe() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.store.map(PROBE_A, 2);
    rig.sensors.set(PROBE_A, 23.7456);

    rig.line.receive("1.TMP.2.gSTATUS");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.TMP.2.STATUS.23.75"]);
    assert!(rig.sink.events.contains(&AppEvent::ReplySent {
        kind: "STATUS",
        attempts: 1
    }));
    assert_eq!(rig.node.stats().replies_sent, 1);
}

#[test]
fn unmapped_instance_gets_no_reply() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.store.map(PROBE_A, 2);
    rig.sensors.set(PROBE_A, 23.7456);

    rig.line.receive("1.TMP.9.gSTATUS");
    rig.tick();

    assert!(rig.line.sent().is_empty());
    assert!(rig.sink.events.contains(&AppEvent::InstanceUnmapped(9)));
}

#[test]
fn first_probe_in_enumeration_order_wins_shared_instance() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.store.map(PROBE_A, 3);
    rig.store.map(PROBE_B, 3);
    rig.sensors.set(PROBE_B, -5.25);
    rig.sensors.set(PROBE_A, 40.0);

    rig.line.receive("1.TMP.3.gSTATUS");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.TMP.3.STATUS.-5.25"]);
}

#[test]
fn new_probe_is_assigned_the_default_instance() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.sensors.set(PROBE_A, 20.5);

    rig.line.receive("1.TMP.1.gSTATUS");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.TMP.1.STATUS.20.50"]);
    assert_eq!(rig.store.mappings().len(), 1);
}

#[test]
fn faulty_probe_reports_sentinel() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.sensors.set(PROBE_A, 85.0);
    rig.sensors.set(PROBE_B, f32::NAN);
    rig.store.map(PROBE_B, 4);

    rig.line.receive("1.TMP.4.gSTATUS");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.TMP.4.STATUS.-127.0"]);
}

// ── SYS configuration ────────────────────────────────────────

#[test]
fn set_config_switches_network_without_reply() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    assert_eq!(rig.network.requests, vec![true]);

    rig.line.receive("1.SYS.1.SET_CFG.1.0");
    rig.tick();

    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.network.requests, vec![true, false]);
    assert!(!rig.network.is_enabled());
    assert!(!rig.node.config().network_enabled);
    assert_eq!(rig.store.saved().map(|c| c.network_enabled), Some(false));
    assert!(rig.node.holdoff_until_us() >= rig.clock.now() + SET_HOLDOFF_MS * 1000 - 1000);
    assert!(rig.sink.events.contains(&AppEvent::NetworkRequested(false)));
}

#[test]
fn get_config_reports_actual_network_state() {
    let mut rig = Rig::new(quiet_config(), 1_000);

    rig.line.receive("1.SYS.1.SET_CFG.1.0");
    rig.tick();
    rig.run_for_ms(10);

    rig.line.receive("1.SYS.1.gCONFIG.1");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.SYS.1.rCONFIG.1.0"]);
    let after_reply = rig.clock.now();
    assert!(rig.node.holdoff_until_us() >= after_reply + GET_HOLDOFF_MS * 1000 - 1000);
}

#[test]
fn get_config_while_network_on() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.tick();

    rig.line.receive("1.SYS.1.gCONFIG.1");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.SYS.1.rCONFIG.1.1"]);
}

#[test]
fn invalid_set_value_is_rejected_with_short_holdoff() {
    let mut rig = Rig::new(quiet_config(), 1_000);

    rig.line.receive("1.SYS.1.SET_CFG.1.7");
    rig.tick();

    let now = rig.clock.now();
    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.network.requests, vec![true]);
    assert_eq!(rig.node.holdoff_until_us(), now + REJECT_HOLDOFF_MS * 1000);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::ConfigRejected(_))), 1);
}

#[test]
fn overlong_set_value_is_rejected_not_dropped() {
    let mut rig = Rig::new(quiet_config(), 1_000);

    rig.line.receive("1.SYS.1.SET_CFG.1.00000000000000000");
    rig.tick();

    let now = rig.clock.now();
    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.node.stats().unrecognized, 0);
    assert_eq!(rig.network.requests, vec![true]);
    assert_eq!(rig.node.holdoff_until_us(), now + REJECT_HOLDOFF_MS * 1000);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::ConfigRejected(_))), 1);
}

#[test]
fn unknown_get_parameter_is_rejected() {
    let mut rig = Rig::new(quiet_config(), 1_000);

    rig.line.receive("1.SYS.1.gCONFIG.2");
    rig.tick();

    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::ConfigRejected(_))), 1);
}

// ── Ping ─────────────────────────────────────────────────────

#[test]
fn ping_renders_response_template() {
    let config = NodeConfig {
        device_id: 42,
        ..quiet_config()
    };
    let mut rig = Rig::new(config, 1_000);

    rig.line.receive("42.OUT.210.gSTATUS");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["42.OUT.210.rSTATUS"]);
}

#[test]
fn ping_for_another_device_is_not_recognised() {
    let config = NodeConfig {
        device_id: 42,
        ..quiet_config()
    };
    let mut rig = Rig::new(config, 1_000);

    rig.line.receive("43.OUT.210.gSTATUS");
    rig.tick();

    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.node.stats().unrecognized, 1);
}

// ── Addressing and malformed input ───────────────────────────

#[test]
fn commands_for_other_nodes_are_ignored() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.sensors.set(PROBE_A, 21.0);

    rig.line.receive("2.TMP.1.gSTATUS");
    rig.line.receive("1.SYS.2.gCONFIG.1");
    rig.line.receive("7.SYS.1.SET_CFG.1.0");
    rig.tick();

    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.node.stats().not_for_us, 3);
    assert_eq!(rig.network.requests, vec![true]);
    assert_eq!(rig.sensors.refreshes(), 0);
}

#[test]
fn garbage_between_frames_is_skipped() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    let now = rig.clock.now();
    rig.line.receive_bytes_at(now, b"noise\xFE\xFF");
    rig.line.receive_bytes_at(now, b"\xFD\xC3\x28\xFE");
    rig.line.receive("1.SYS.1.gCONFIG.1");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.SYS.1.rCONFIG.1.1"]);
    assert_eq!(rig.node.stats().non_utf8_drops, 1);
}

#[test]
fn frames_in_one_tick_are_answered_in_arrival_order() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.tick();

    rig.line.receive("1.OUT.210.gSTATUS");
    rig.line.receive("1.SYS.1.gCONFIG.1");
    rig.tick();

    assert_eq!(
        rig.line.sent(),
        vec!["1.OUT.210.rSTATUS", "1.SYS.1.rCONFIG.1.1"]
    );
}
