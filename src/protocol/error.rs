use thiserror::Error;

/// Reasons a single inbound message is dropped
///
/// None of these are fatal; the caller logs and moves on to the next message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Serial line or MQTT payload was not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Control topic has no usable device/action split
    #[error("malformed control topic: {0}")]
    MalformedTopic(String),
}
