//! Single writer for the serial write half
//!
//! Commands arrive over an mpsc queue and are written one at a time. The task
//! ends when every sender has been dropped; the port handle is dropped with it.

use std::io::Write;
use std::time::Instant;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::protocol::{encode_command, ControlCommand};

#[derive(Clone, Debug, Default)]
pub struct WriterStats {
    pub written: usize,
    pub failed: usize,
    pub last_activity: Option<DateTime<Local>>,
    /// Taken once the queue has closed, just before the port handle is dropped
    pub closed_at: Option<Instant>,
}

/// Drains `commands` into `port` until the queue closes
///
/// Blocks the calling thread; run it on `spawn_blocking`. A failed write is
/// logged and the next command is still attempted on the same handle.
pub fn run_writer<W: Write>(
    mut port: W,
    mut commands: mpsc::Receiver<ControlCommand>,
) -> WriterStats {
    info!("Serial writer started");
    let mut stats = WriterStats::default();

    while let Some(cmd) = commands.blocking_recv() {
        let line = encode_command(&cmd);
        match port.write_all(line.as_bytes()).and_then(|_| port.flush()) {
            Ok(()) => {
                debug!("Wrote {:?} to serial", line);
                stats.written += 1;
                stats.last_activity = Some(Local::now());
            }
            Err(e) => {
                error!("Failed to write {} to serial: {}", cmd, e);
                stats.failed += 1;
            }
        }
    }

    info!(
        "Serial writer stopped: {} written, {} failed",
        stats.written, stats.failed
    );
    stats.closed_at = Some(Instant::now());
    stats
}
