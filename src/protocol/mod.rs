//! # Serial Line Protocol
//!
//! Translation rules between the newline-delimited text protocol spoken by the
//! microcontroller and the MQTT topic hierarchy.
//!
//! ```text
//! Device -> bridge   "TEMP:25.3\n"     -> garden/sensors/temp  = "25.3"
//! Bridge -> device   garden/sensors/control/pump/on  -> "PUMP:ON\n"
//! ```
//!
//! Both directions are pure functions; nothing in here touches a transport.

pub mod error;
pub mod line_codec;
pub mod topic_mapper;

pub use error::DecodeError;
pub use line_codec::{decode_bytes, decode_line, encode_command, ControlCommand, SensorReading};
pub use topic_mapper::{reading_to_topic, topic_to_command, TopicPath};
