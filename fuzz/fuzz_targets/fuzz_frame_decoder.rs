//! Fuzz target: `FrameDecoder::ingest_detailed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder and
//! asserts that it never panics, never yields a payload over the cap or
//! containing an end marker, and re-encodes every marker-free payload.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use busnode::protocol::codec::{FRAME_END, FRAME_START, FrameDecoder, Ingest, MAX_PAYLOAD_LEN, encode_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();

    for &byte in data {
        if let Ingest::Complete(payload) = decoder.ingest_detailed(byte) {
            assert!(payload.len() <= MAX_PAYLOAD_LEN, "payload exceeds cap");
            assert!(!payload.contains(&FRAME_END), "end marker inside payload");
            if !payload.contains(&FRAME_START) {
                assert!(encode_frame(&payload).is_ok(), "delivered payload must re-encode");
            }
        }
        assert!(decoder.buffered() <= MAX_PAYLOAD_LEN);
    }

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    assert!(!decoder.in_frame());
    for &byte in data {
        let _ = decoder.ingest(byte);
    }
});
