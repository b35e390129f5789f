//! Command parser: payload text to typed [`Command`].
//!
//! Every parser is a pure function performing exact structural matching on
//! the dot-separated field list.  A parser either recognises its complete
//! shape or returns `None`; the engine then tries the next shape in its
//! fixed priority order.
//!
//! | Shape | Fields |
//! |---|---|
//! | temperature query | `<dev>.TMP.<inst>.gSTATUS` |
//! | system set | `<dev>.SYS.<sys>.SET_CFG.<param>.<value>` |
//! | system get | `<dev>.SYS.<sys>.gCONFIG.<param>` |
//! | ping | exact match of the rendered request template |

use super::codec::MAX_PAYLOAD_LEN;
use super::telegram;

/// Field separator inside a payload.
pub const FIELD_SEPARATOR: char = '.';

/// Longest field list any shape uses.
const MAX_FIELDS: usize = 6;

/// Raw `SET_CFG` value, validated per parameter by the engine.
///
/// Sized to a whole payload so any value field fits and reaches the
/// engine's rejection path.
pub type ConfigValue = heapless::String<MAX_PAYLOAD_LEN>;

/// A parsed bus command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `<dev>.TMP.<inst>.gSTATUS`
    TemperatureQuery { device_id: u32, instance: u32 },
    /// `<dev>.SYS.<sys>.SET_CFG.<param>.<value>`
    SysSetConfig {
        device_id: u32,
        sys_instance: u32,
        param: u32,
        value: ConfigValue,
    },
    /// `<dev>.SYS.<sys>.gCONFIG.<param>`
    SysGetConfig {
        device_id: u32,
        sys_instance: u32,
        param: u32,
    },
    /// Rendered ping request template.
    PingRequest,
}

impl Command {
    /// Short label for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TemperatureQuery { .. } => "TMP.gSTATUS",
            Self::SysSetConfig { .. } => "SYS.SET_CFG",
            Self::SysGetConfig { .. } => "SYS.gCONFIG",
            Self::PingRequest => "PING",
        }
    }
}

type Fields<'a> = heapless::Vec<&'a str, MAX_FIELDS>;

/// Split a payload into its fields.
///
/// Returns `None` for non-UTF-8 input or more than [`MAX_FIELDS`] fields;
/// neither can match any shape.
fn tokenize(payload: &[u8]) -> Option<Fields<'_>> {
    let text = core::str::from_utf8(payload).ok()?;
    let mut fields = Fields::new();
    for field in text.split(FIELD_SEPARATOR) {
        fields.push(field).ok()?;
    }
    Some(fields)
}

/// Parse an unsigned decimal field: non-empty, ASCII digits only.
///
/// No sign and no surrounding whitespace are accepted.  Values that do not
/// fit in a `u32` are rejected.
pub fn parse_number(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// `<dev>.TMP.<inst>.gSTATUS`
pub fn parse_temperature_query(payload: &[u8]) -> Option<Command> {
    match tokenize(payload)?.as_slice() {
        [dev, "TMP", inst, "gSTATUS"] => Some(Command::TemperatureQuery {
            device_id: parse_number(dev)?,
            instance: parse_number(inst)?,
        }),
        _ => None,
    }
}

/// `<dev>.SYS.<sys>.SET_CFG.<param>.<value>`
///
/// The value is kept verbatim; it only has to be a single non-empty field.
pub fn parse_sys_set(payload: &[u8]) -> Option<Command> {
    match tokenize(payload)?.as_slice() {
        [dev, "SYS", sys, "SET_CFG", param, value] if !value.is_empty() => {
            Some(Command::SysSetConfig {
                device_id: parse_number(dev)?,
                sys_instance: parse_number(sys)?,
                param: parse_number(param)?,
                value: ConfigValue::try_from(*value).ok()?,
            })
        }
        _ => None,
    }
}

/// `<dev>.SYS.<sys>.gCONFIG.<param>`
pub fn parse_sys_get(payload: &[u8]) -> Option<Command> {
    match tokenize(payload)?.as_slice() {
        [dev, "SYS", sys, "gCONFIG", param] => Some(Command::SysGetConfig {
            device_id: parse_number(dev)?,
            sys_instance: parse_number(sys)?,
            param: parse_number(param)?,
        }),
        _ => None,
    }
}

/// Exact comparison against the request template rendered for `device_id`.
///
/// The placeholder is replaced textually; a device id whose decimal form
/// reproduces the placeholder text is not supported.
pub fn parse_ping(payload: &[u8], request_template: &str, device_id: u16) -> Option<Command> {
    let expected = telegram::render_template(request_template, device_id)?;
    (payload == expected.as_bytes()).then_some(Command::PingRequest)
}

/// Try every shape in dispatch priority order: set, get, ping, temperature.
pub fn parse(payload: &[u8], ping_template: &str, device_id: u16) -> Option<Command> {
    parse_sys_set(payload)
        .or_else(|| parse_sys_get(payload))
        .or_else(|| parse_ping(payload, ping_template, device_id))
        .or_else(|| parse_temperature_query(payload))
}
