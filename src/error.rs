//! Crate-level error type
//!
//! Startup variants (`Config`, `SerialOpen`, `BrokerConnect`, `ConnectTimeout`)
//! abort the process. Everything else is reported per message and the bridge
//! keeps running.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::DecodeError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to open serial port {port}: {source}")]
    SerialOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Serial I/O error: {0}")]
    SerialIo(#[from] std::io::Error),

    #[error("Broker connection failed: {0}")]
    BrokerConnect(#[from] rumqttc::ConnectionError),

    #[error("No ConnAck from broker within {0:?}")]
    ConnectTimeout(Duration),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Command queue full")]
    QueueFull,

    #[error("Command queue closed")]
    QueueClosed,

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
