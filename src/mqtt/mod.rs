//! # MQTT Integration
//!
//! Connection handling for the broker side of the bridge:
//!
//! ```text
//! mqtt/
//! ├── config.rs       - MqttOptions derived from BridgeConfig
//! └── mqtt_handler.rs - startup handshake, event loop, publish sink
//! ```
//!
//! The rumqttc `AsyncClient` is cheap to clone and safe to share, so the read
//! loop publishes through its own clone while the event loop task owns the
//! `EventLoop` and feeds control messages to the dispatcher.

pub mod config;
pub mod mqtt_handler;

#[cfg(test)]
pub mod test_broker;

pub use mqtt_handler::{connect, run_event_loop, ConnectionState, EventLoopStats, MqttSink};
