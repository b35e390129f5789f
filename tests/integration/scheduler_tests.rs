//! Periodic telegram cycles driven through the main-loop tick.

use busnode::app::events::AppEvent;
use busnode::config::NodeConfig;
use busnode::scheduler::SchedulerState;

use super::mock_hw::Rig;

const PROBES: [(&str, u8, f32); 3] = [
    ("28000000000000A1", 1, 21.5),
    ("28000000000000B2", 2, 19.05),
    ("28000000000000C3", 3, -3.25),
];

fn periodic_config() -> NodeConfig {
    NodeConfig {
        auto_send_enabled: true,
        send_interval_ms: 5_000,
        telegram_gap_ms: 100,
        ..NodeConfig::default()
    }
}

fn rig_with_probes(start_ms: u64) -> Rig {
    let mut rig = Rig::new(periodic_config(), start_ms);
    for (id, instance, celsius) in PROBES {
        rig.store.map(id, instance);
        rig.sensors.set(id, celsius);
    }
    rig
}

#[test]
fn cycle_sends_every_probe_in_order_then_idles() {
    let mut rig = rig_with_probes(5_000);

    rig.tick();
    assert_eq!(rig.node.scheduler_state(), SchedulerState::SendOne);
    rig.run_for_ms(250);

    assert_eq!(
        rig.line.sent(),
        vec![
            "1.TMP.1.STATUS.21.50",
            "1.TMP.2.STATUS.19.5",
            "1.TMP.3.STATUS.-3.25",
        ]
    );
    assert_eq!(rig.node.scheduler_state(), SchedulerState::Idle);
    assert_eq!(rig.node.stats().telegrams_sent, 3);
    assert!(rig.sink.events.contains(&AppEvent::CycleStarted { sensors: 3 }));
    assert!(rig.sink.events.contains(&AppEvent::CycleFinished { sent: 3 }));
}

#[test]
fn telegrams_are_spaced_by_the_gap() {
    let mut rig = rig_with_probes(5_000);
    rig.tick();

    rig.run_for_ms(1);
    assert_eq!(rig.line.sent().len(), 1);
    rig.run_for_ms(99);
    assert!(rig.line.sent().is_empty());
    rig.run_for_ms(1);
    assert_eq!(rig.line.sent().len(), 1);
}

#[test]
fn next_cycle_waits_for_the_interval() {
    let mut rig = rig_with_probes(5_000);
    rig.tick();
    rig.run_for_ms(250);
    assert_eq!(rig.line.sent().len(), 3);

    rig.run_for_ms(4_700);
    assert!(rig.line.sent().is_empty());

    rig.run_for_ms(100);
    assert_eq!(rig.line.sent(), vec!["1.TMP.1.STATUS.21.50"]);
    assert_eq!(rig.sensors.refreshes(), 2);
}

#[test]
fn no_probes_means_no_cycle() {
    let mut rig = Rig::new(periodic_config(), 5_000);
    rig.run_for_ms(200);

    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.node.scheduler_state(), SchedulerState::Idle);
    assert_eq!(rig.sensors.refreshes(), 1);
}

#[test]
fn disabled_auto_send_never_captures() {
    let config = NodeConfig {
        auto_send_enabled: false,
        ..periodic_config()
    };
    let mut rig = Rig::new(config, 5_000);
    rig.sensors.set(PROBES[0].0, 20.0);
    rig.run_for_ms(6_000);

    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.sensors.refreshes(), 0);
}

#[test]
fn reply_holdoff_delays_the_cycle() {
    let mut rig = rig_with_probes(4_990);

    rig.line.receive("1.TMP.2.gSTATUS");
    rig.tick();
    assert_eq!(rig.line.sent(), vec!["1.TMP.2.STATUS.19.5"]);

    rig.run_for_ms(900);
    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.node.scheduler_state(), SchedulerState::Idle);

    rig.run_for_ms(200);
    assert_eq!(rig.line.sent().len(), 1);
}

#[test]
fn holdoff_pauses_a_running_cycle() {
    let mut rig = rig_with_probes(5_000);
    rig.tick();
    rig.run_for_ms(1);
    assert_eq!(rig.line.sent().len(), 1);

    rig.line.receive("1.SYS.1.SET_CFG.1.1");
    rig.run_for_ms(500);
    assert!(rig.line.sent().is_empty());
    assert_eq!(rig.node.scheduler_state(), SchedulerState::SendOne);

    rig.run_for_ms(700);
    assert_eq!(
        rig.line.sent(),
        vec!["1.TMP.2.STATUS.19.5", "1.TMP.3.STATUS.-3.25"]
    );
}

#[test]
fn busy_line_postpones_cycle_start() {
    let mut rig = rig_with_probes(5_000);
    let now = rig.clock.now();
    for i in 0..20u64 {
        rig.line.receive_bytes_at(now + i * 1_000, &[0x00]);
    }

    rig.run_for_ms(19);
    assert_eq!(rig.sensors.refreshes(), 0);
    assert!(rig.line.sent().is_empty());

    rig.run_for_ms(300);
    assert_eq!(rig.sensors.refreshes(), 1);
    assert_eq!(rig.line.sent().len(), 3);
}
