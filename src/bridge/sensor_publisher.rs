//! Sensor Publisher - serial lines in, MQTT publishes out

use std::io::Read;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;
use crate::protocol::{decode_bytes, reading_to_topic};
use crate::serial::{LineReader, ReadOutcome};

/// Destination for decoded readings
pub trait ReadingSink: Send {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BridgeError>;
}

#[derive(Clone, Debug, Default)]
pub struct PublisherStats {
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub last_activity: Option<DateTime<Local>>,
}

/// Outcome of handling a single serial line
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Published { topic: String, payload: String },
    Skipped,
    Failed,
}

pub struct SensorPublisher<S: ReadingSink> {
    base_topic: String,
    sink: S,
    stats: PublisherStats,
}

impl<S: ReadingSink> SensorPublisher<S> {
    pub fn new(base_topic: impl Into<String>, sink: S) -> Self {
        Self {
            base_topic: base_topic.into(),
            sink,
            stats: PublisherStats::default(),
        }
    }

    pub fn stats(&self) -> &PublisherStats {
        &self.stats
    }

    /// Decodes one raw line and publishes it if it carries a reading
    ///
    /// Never fails: decode and publish errors are logged and counted.
    pub fn handle_line(&mut self, raw: &[u8]) -> LineOutcome {
        let reading = match decode_bytes(raw) {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                debug!("Ignoring serial line {:?}", String::from_utf8_lossy(raw));
                self.stats.skipped += 1;
                return LineOutcome::Skipped;
            }
            Err(e) => {
                warn!("Skipping undecodable serial line: {}", e);
                self.stats.skipped += 1;
                return LineOutcome::Skipped;
            }
        };

        let topic = reading_to_topic(&self.base_topic, &reading);
        match self.sink.publish(&topic, &reading.value) {
            Ok(()) => {
                debug!("{} = {}", topic, reading.value);
                self.stats.published += 1;
                self.stats.last_activity = Some(Local::now());
                LineOutcome::Published {
                    topic,
                    payload: reading.value,
                }
            }
            Err(e) => {
                error!("Failed to publish {}: {}", topic, e);
                self.stats.failed += 1;
                LineOutcome::Failed
            }
        }
    }

    /// Reads lines until `shutdown` is cancelled or the port closes
    ///
    /// Blocking; each read is bounded by the port timeout so cancellation is
    /// observed between reads.
    pub fn run<R: Read>(
        &mut self,
        mut reader: LineReader<R>,
        shutdown: &CancellationToken,
    ) -> PublisherStats {
        info!("Sensor publisher started for {}", self.base_topic);

        while !shutdown.is_cancelled() {
            match reader.read_line() {
                Ok(ReadOutcome::Line(raw)) => {
                    self.handle_line(&raw);
                }
                Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::Closed) => {
                    warn!("Serial port closed, sensor publisher exiting");
                    break;
                }
                Err(e) => {
                    error!("Serial read failed: {}", e);
                    self.stats.failed += 1;
                    // Back off on persistent read errors
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
        }

        info!(
            "Sensor publisher stopped: {} published, {} skipped, {} failed",
            self.stats.published, self.stats.skipped, self.stats.failed
        );
        self.stats.clone()
    }
}
