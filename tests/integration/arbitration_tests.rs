//! Replies competing with other traffic on the shared line.

use busnode::app::events::AppEvent;
use busnode::bus::INBOX_CAPACITY;
use busnode::error::BusError;
use busnode::protocol::codec::{FRAME_END, FRAME_START, MAX_PAYLOAD_LEN};

use super::mock_hw::{Rig, quiet_config};

const PROBE: &str = "28FF4C3E9116045A";

fn rig_with_probe() -> Rig {
    let mut rig = Rig::new(quiet_config(), 1_000);
    rig.sensors.set(PROBE, 22.0);
    rig
}

/// One noise byte per millisecond for `count` ms starting at `from_us`.
fn chatter(rig: &Rig, from_us: u64, count: u64) {
    for i in 0..count {
        rig.line.receive_bytes_at(from_us + i * 1_000, &[0x00]);
    }
}

#[test]
fn byte_during_backoff_forces_a_second_attempt() {
    let mut rig = rig_with_probe();
    let t0 = rig.clock.now();
    rig.line.receive("1.TMP.1.gSTATUS");
    rig.line.receive_bytes_at(t0 + 2_000, &[0x00]);

    rig.tick();

    assert_eq!(rig.line.sent(), vec!["1.TMP.1.STATUS.22.0"]);
    assert_eq!(rig.node.stats().contention_aborts, 1);
    assert!(rig.sink.events.contains(&AppEvent::ReplySent {
        kind: "STATUS",
        attempts: 2
    }));
}

#[test]
fn reply_waits_for_guard_and_backoff_after_traffic() {
    let mut rig = rig_with_probe();
    let t0 = rig.clock.now();
    rig.line.receive("1.TMP.1.gSTATUS");
    chatter(&rig, t0 + 1_000, 10);

    rig.tick();

    assert_eq!(rig.line.sent().len(), 1);
    let last_byte = t0 + 10_000;
    let written_at = rig.clock.now();
    let guard = rig.node.bus().guard_us();
    assert!(written_at >= last_byte + guard + 2_000, "wrote at {written_at}");
    assert!(written_at <= last_byte + guard + 21_000, "wrote at {written_at}");
}

#[test]
fn busy_line_abandons_reply_within_budget() {
    let mut rig = rig_with_probe();
    let t0 = rig.clock.now();
    rig.line.receive("1.TMP.1.gSTATUS");
    chatter(&rig, t0, 400);

    rig.tick();

    assert!(rig.line.sent().is_empty());
    assert!(rig.clock.now() - t0 <= 260_000);
    assert_eq!(rig.node.stats().replies_abandoned, 1);
    assert!(rig.sink.events.contains(&AppEvent::ReplyAbandoned {
        kind: "STATUS",
        error: BusError::IdleTimeout
    }));
}

#[test]
fn oversize_frame_is_dropped_and_line_recovers() {
    let mut rig = rig_with_probe();
    let t0 = rig.clock.now();
    let mut junk = vec![FRAME_START];
    junk.extend(std::iter::repeat_n(b'x', MAX_PAYLOAD_LEN + 10));
    junk.push(FRAME_END);
    rig.line.receive_bytes_at(t0, &junk);
    rig.line.receive("1.TMP.1.gSTATUS");

    rig.tick();

    assert_eq!(rig.node.stats().oversize_drops, 1);
    assert_eq!(rig.line.sent(), vec!["1.TMP.1.STATUS.22.0"]);
}

#[test]
fn burst_beyond_inbox_capacity_drops_newest() {
    let mut rig = rig_with_probe();
    for _ in 0..INBOX_CAPACITY + 2 {
        rig.line.receive("2.TMP.1.gSTATUS");
    }

    rig.tick();

    let stats = rig.node.stats();
    assert_eq!(stats.frames_received, INBOX_CAPACITY as u32 + 2);
    assert_eq!(stats.inbox_overflows, 2);
    assert_eq!(stats.not_for_us, INBOX_CAPACITY as u32);
}
