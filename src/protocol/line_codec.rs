//! Line codec for the `KEY:VALUE` / `DEVICE:ACTION` serial protocol

use std::fmt;

use super::DecodeError;

/// Separator between the two halves of a protocol line
pub const SEPARATOR: char = ':';

/// Terminator the firmware waits for before acting on a command
pub const TERMINATOR: char = '\n';

/// One sensor report received from the device
///
/// The key keeps the casing the device sent; it is folded to lowercase only
/// when a topic is built from it. The value is forwarded untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub key: String,
    pub value: String,
}

impl SensorReading {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn normalized_key(&self) -> String {
        self.key.to_lowercase()
    }
}

/// One actuator command bound for the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    pub device: String,
    pub action: String,
}

impl ControlCommand {
    pub fn new(device: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.device.to_uppercase(),
            SEPARATOR,
            self.action.to_uppercase()
        )
    }
}

/// Parses one line of device output
///
/// Splits on the first `:` only, so values may themselves contain colons.
/// Returns `None` for blank lines, lines without a separator, and lines where
/// either side is empty after trimming.
pub fn decode_line(raw: &str) -> Option<SensorReading> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    let (key, value) = line.split_once(SEPARATOR)?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some(SensorReading::new(key, value))
}

/// Parses raw bytes off the wire, rejecting invalid UTF-8
pub fn decode_bytes(raw: &[u8]) -> Result<Option<SensorReading>, DecodeError> {
    let text = std::str::from_utf8(raw)?;
    Ok(decode_line(text))
}

/// Serializes a command as `"{DEVICE}:{ACTION}\n"`
pub fn encode_command(cmd: &ControlCommand) -> String {
    format!("{}{}", cmd, TERMINATOR)
}
