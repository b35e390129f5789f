//! Service-level operations: configuration updates, instance mapping,
//! and per-tick dispatch limits.

use busnode::app::events::AppEvent;
use busnode::app::ports::{ConfigError, MappingPort};
use busnode::config::NodeConfig;
use busnode::error::Error;
use busnode::sensors::SensorId;

use super::mock_hw::{Rig, quiet_config};

const PROBE_A: &str = "28FF4C3E9116045A";

// ── update_config ────────────────────────────────────────────

#[test]
fn valid_update_is_persisted_and_applied() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    let guard = rig.node.bus().guard_us();
    let mut config = quiet_config();
    config.device_id = 7;
    config.serial.baud_rate = 115_200;

    rig.node.update_config(config.clone(), &rig.store).unwrap();

    assert_eq!(rig.store.saved(), Some(config.clone()));
    assert_eq!(rig.node.config(), &config);
    // Line settings wait for a restart.
    assert_eq!(rig.node.bus().guard_us(), guard);

    rig.line.receive("1.SYS.1.gCONFIG.1");
    rig.line.receive("7.SYS.1.gCONFIG.1");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["7.SYS.1.rCONFIG.1.1"]);
    assert_eq!(rig.node.stats().not_for_us, 1);
}

#[test]
fn invalid_update_keeps_previous_config() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    let config = NodeConfig {
        device_id: 0,
        ..quiet_config()
    };

    let result = rig.node.update_config(config, &rig.store);

    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ValidationFailed(_)))
    ));
    assert_eq!(rig.store.saved(), None);
    assert_eq!(rig.node.config().device_id, 1);

    rig.line.receive("1.SYS.1.gCONFIG.1");
    rig.tick();
    assert_eq!(rig.line.sent(), vec!["1.SYS.1.rCONFIG.1.1"]);
}

// ── set_instance ─────────────────────────────────────────────

#[test]
fn set_instance_moves_probe_to_new_instance() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.sensors.set(PROBE_A, 19.5);
    let id = SensorId::parse(PROBE_A).unwrap();

    rig.node.set_instance(&rig.store, &id, 5).unwrap();
    assert_eq!(rig.store.mappings().get(&id), Some(5));

    rig.line.receive("1.TMP.5.gSTATUS");
    rig.line.receive("1.TMP.1.gSTATUS");
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.TMP.5.STATUS.19.50"]);
    assert!(rig.sink.events.contains(&AppEvent::InstanceUnmapped(1)));
}

#[test]
fn set_instance_refuses_instance_zero() {
    let rig = Rig::new(quiet_config(), 1_000);
    let id = SensorId::parse(PROBE_A).unwrap();

    let result = rig.node.set_instance(&rig.store, &id, 0);

    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ValidationFailed(_)))
    ));
    assert!(rig.store.mappings().is_empty());
}

// ── Dispatch limits ──────────────────────────────────────────

/// Frames that complete while a reply waits for the line are left for
/// the next tick, so one tick cannot be held by steady traffic.
#[test]
fn frames_arriving_during_a_reply_wait_for_next_tick() {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.tick();

    let t0 = rig.clock.now();
    rig.line.receive("1.OUT.210.gSTATUS");
    let late = busnode::protocol::codec::encode_frame(b"1.SYS.1.gCONFIG.1").unwrap();
    rig.line.receive_bytes_at(t0 + 500, &late);
    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.OUT.210.rSTATUS"]);
    assert_eq!(rig.node.bus().pending_payloads(), 1);

    rig.tick();
    assert_eq!(rig.line.sent(), vec!["1.SYS.1.rCONFIG.1.1"]);
    assert_eq!(rig.node.bus().pending_payloads(), 0);
}
