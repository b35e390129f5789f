//! Outgoing telegram payloads and the wire temperature encoding.
//!
//! Every builder here emits only ASCII digits, `-`, `.` and letters, so the
//! output can never contain a frame marker byte.  Rendered templates are the
//! one exception: their text comes from configuration, which
//! [`NodeConfig::validate`](crate::config::NodeConfig::validate) checks.

use core::fmt::Write;

use super::codec::MAX_PAYLOAD_LEN;

/// Placeholder replaced by the device identifier in ping templates.
pub const ID_PLACEHOLDER: &str = "{ID}";

/// Lowest temperature (°C) reported as a real reading.
pub const PLAUSIBLE_MIN_C: f32 = -100.0;

/// Highest temperature (°C) reported as a real reading.
pub const PLAUSIBLE_MAX_C: f32 = 150.0;

/// Payload text built for transmission.
pub type Text = heapless::String<MAX_PAYLOAD_LEN>;

/// Temperature as sent on the wire: signed whole degrees plus a
/// non-negative hundredths fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTemperature {
    pub whole: i32,
    pub fraction: u8,
}

impl WireTemperature {
    /// Sentinel pair meaning "reading unavailable or implausible".
    pub const FAULT: Self = Self {
        whole: -127,
        fraction: 0,
    };

    /// Convert a reading in °C.
    ///
    /// NaN and values outside [`PLAUSIBLE_MIN_C`]..=[`PLAUSIBLE_MAX_C`]
    /// map to [`FAULT`](Self::FAULT).  The fraction keeps no sign, so
    /// -5.25 °C becomes `(-5, 25)`.
    pub fn from_celsius(celsius: f32) -> Self {
        if !(PLAUSIBLE_MIN_C..=PLAUSIBLE_MAX_C).contains(&celsius) {
            return Self::FAULT;
        }
        let scaled = (celsius * 100.0).round() as i32;
        Self {
            whole: scaled / 100,
            fraction: (scaled % 100).unsigned_abs() as u8,
        }
    }

    pub fn is_fault(&self) -> bool {
        *self == Self::FAULT
    }
}

/// `<dev>.TMP.<inst>.STATUS.<whole>.<fraction>`
///
/// The fraction is written as a plain integer (`5` hundredths is `.5`).
pub fn temperature_status(device_id: u16, instance: u8, temp: WireTemperature) -> Text {
    let mut text = Text::new();
    // Bounded numeric fields; cannot exceed the payload capacity.
    let _ = write!(
        text,
        "{device_id}.TMP.{instance}.STATUS.{}.{}",
        temp.whole, temp.fraction
    );
    text
}

/// `<dev>.SYS.<sys>.rCONFIG.<param>.<value>`
pub fn config_reply(device_id: u16, sys_instance: u32, param: u32, value: u8) -> Text {
    let mut text = Text::new();
    let _ = write!(text, "{device_id}.SYS.{sys_instance}.rCONFIG.{param}.{value}");
    text
}

/// Replace every [`ID_PLACEHOLDER`] in `template` with `device_id`.
///
/// Returns `None` if the result would not fit in one payload.
pub fn render_template(template: &str, device_id: u16) -> Option<Text> {
    let mut text = Text::new();
    let mut rest = template;
    while let Some(at) = rest.find(ID_PLACEHOLDER) {
        text.push_str(&rest[..at]).ok()?;
        write!(text, "{device_id}").ok()?;
        rest = &rest[at + ID_PLACEHOLDER.len()..];
    }
    text.push_str(rest).ok()?;
    Some(text)
}
