//! # Bridge
//!
//! The two translation directions and the supervisor that runs them.
//!
//! ```text
//! serial read half ─► SensorPublisher ─► MqttSink ─► broker
//!
//! broker ─► event loop ─► CommandDispatcher ─[mpsc]─► writer task ─► serial write half
//! ```
//!
//! The publisher runs on a blocking thread because serial reads block for up
//! to the configured timeout. The dispatcher runs inside the MQTT event loop
//! task and never touches the port directly.

pub mod command_dispatcher;
pub mod sensor_publisher;
pub mod supervisor;

pub use command_dispatcher::CommandDispatcher;
pub use sensor_publisher::{LineOutcome, PublisherStats, ReadingSink, SensorPublisher};
pub use supervisor::{Bridge, BridgeReport, BridgeState};
