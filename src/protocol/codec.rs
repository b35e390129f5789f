//! Marker-delimited frame codec.
//!
//! Wire format:
//! ```text
//! ┌──────┬───────────────────────────────┬──────┐
//! │ 0xFD │ ASCII payload (0..=220 bytes) │ 0xFE │
//! └──────┴───────────────────────────────┴──────┘
//! ```
//!
//! There is no escaping: payload generators must never emit the marker
//! byte values.  [`encode_frame`] rejects such payloads instead of putting
//! a corrupt frame on the wire.
//!
//! The decoder is a two-state machine fed one byte at a time from the
//! receive path.  Bytes outside a frame are ignored; an over-long frame is
//! abandoned silently and the decoder waits for the next start marker.

use core::fmt;

/// Start-of-frame marker.
pub const FRAME_START: u8 = 0xFD;

/// End-of-frame marker.
pub const FRAME_END: u8 = 0xFE;

/// Maximum payload length accepted between the markers.
pub const MAX_PAYLOAD_LEN: usize = 220;

/// Maximum encoded frame length (payload plus both markers).
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + 2;

/// A completed frame payload (bytes strictly between the markers).
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

/// An encoded frame ready for the serial line.
pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

/// Errors from [`encode_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The payload exceeds [`MAX_PAYLOAD_LEN`].
    TooLong(usize),
    /// The payload contains a marker byte at the given offset.
    ContainsMarker(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong(len) => write!(f, "payload too long ({len} > {MAX_PAYLOAD_LEN})"),
            Self::ContainsMarker(at) => write!(f, "payload contains frame marker at offset {at}"),
        }
    }
}

/// Outcome of feeding one byte to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    /// Byte consumed, nothing to report.
    Pending,
    /// End marker closed a frame.
    Complete(Payload),
    /// The open frame hit the length cap and was thrown away.
    Overflow,
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    in_frame: bool,
    buf: Payload,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            in_frame: false,
            buf: heapless::Vec::new(),
        }
    }

    /// Feed a single received byte.
    ///
    /// Returns `Some(payload)` when the byte was an end marker closing an
    /// open frame.  Over-long frames are dropped without a result; use
    /// [`ingest_detailed`](Self::ingest_detailed) to observe the drop.
    pub fn ingest(&mut self, byte: u8) -> Option<Payload> {
        match self.ingest_detailed(byte) {
            Ingest::Complete(payload) => Some(payload),
            Ingest::Pending | Ingest::Overflow => None,
        }
    }

    /// Same as [`ingest`](Self::ingest) but reports overflow drops.
    pub fn ingest_detailed(&mut self, byte: u8) -> Ingest {
        if !self.in_frame {
            if byte == FRAME_START {
                self.in_frame = true;
                self.buf.clear();
            }
            return Ingest::Pending;
        }

        if byte == FRAME_END {
            self.in_frame = false;
            return Ingest::Complete(core::mem::take(&mut self.buf));
        }

        // A start marker inside a frame is payload like any other byte;
        // only the length cap can abandon an open frame.
        if self.buf.push(byte).is_err() {
            self.reset();
            return Ingest::Overflow;
        }
        Ingest::Pending
    }

    /// `true` while a frame is open.
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Bytes accumulated in the open frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.in_frame = false;
        self.buf.clear();
    }
}

/// Wrap `payload` in frame markers.
pub fn encode_frame(payload: &[u8]) -> Result<Frame, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::TooLong(payload.len()));
    }
    if let Some(at) = payload
        .iter()
        .position(|&b| b == FRAME_START || b == FRAME_END)
    {
        return Err(FrameError::ContainsMarker(at));
    }

    let mut frame = Frame::new();
    // Capacity is MAX_PAYLOAD_LEN + 2, checked above.
    let _ = frame.push(FRAME_START);
    let _ = frame.extend_from_slice(payload);
    let _ = frame.push(FRAME_END);
    Ok(frame)
}
