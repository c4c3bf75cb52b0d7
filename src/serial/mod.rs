//! # Serial Channel
//!
//! One duplex port, split into two handles:
//!
//! ```text
//!               ┌── LineReader  (blocking thread, Sensor Publisher)
//! serial port ──┤
//!               └── writer task (sole owner of the write half, fed by mpsc)
//! ```
//!
//! The read half never writes and the write half is owned by exactly one task,
//! so command bytes are never interleaved with each other.

pub mod channel;
pub mod writer;

pub use channel::{LineReader, ReadOutcome, SerialChannel, MAX_LINE_LEN};
pub use writer::{run_writer, WriterStats};
