use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::BridgeError;

/// Longest line accepted before the partial buffer is thrown away
pub const MAX_LINE_LEN: usize = 1024;

pub type SerialRead = Box<dyn Read + Send>;
pub type SerialWrite = Box<dyn Write + Send>;

/// An open serial port, not yet split into its read and write halves
pub struct SerialChannel {
    name: String,
    reader: SerialRead,
    writer: SerialWrite,
}

impl SerialChannel {
    /// Opens `port` with a bounded read timeout
    pub fn open(port: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, BridgeError> {
        info!("Opening serial port {} at {} baud", port, baud_rate);
        let serial = serialport::new(port, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|source| BridgeError::SerialOpen {
                port: port.to_string(),
                source,
            })?;
        let write_half = serial.try_clone().map_err(|source| BridgeError::SerialOpen {
            port: port.to_string(),
            source,
        })?;

        debug!("Serial port {} opened", port);
        Ok(Self::from_parts(port, Box::new(serial), Box::new(write_half)))
    }

    /// Wraps already-open halves, e.g. a pty or an in-memory stream
    pub fn from_parts(name: impl Into<String>, reader: SerialRead, writer: SerialWrite) -> Self {
        Self {
            name: name.into(),
            reader,
            writer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn split(self) -> (LineReader<SerialRead>, SerialWrite) {
        (LineReader::new(self.reader), self.writer)
    }
}

/// Result of one bounded read attempt
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, terminator included if one was received
    Line(Vec<u8>),
    /// Timeout elapsed without a complete line
    Idle,
    /// The stream reached end-of-file
    Closed,
}

/// Newline framing on top of a port with a read timeout
///
/// Bytes received before a timeout are kept, so a line delivered in pieces is
/// reassembled on a later call. At most `MAX_LINE_LEN + 1` bytes are buffered;
/// a line over the limit is dropped up to and including its newline.
pub struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
    discarding: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
            discarding: false,
        }
    }

    pub fn read_line(&mut self) -> io::Result<ReadOutcome> {
        let limit = (MAX_LINE_LEN + 1).saturating_sub(self.pending.len()) as u64;
        let result = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.pending);

        match result {
            Ok(0) => {
                self.discarding = false;
                if self.pending.is_empty() {
                    Ok(ReadOutcome::Closed)
                } else {
                    Ok(ReadOutcome::Line(self.take()))
                }
            }
            Ok(_) => {
                let complete = self.pending.ends_with(b"\n");
                if self.discarding {
                    self.pending.clear();
                    self.discarding = !complete;
                    return Ok(ReadOutcome::Idle);
                }
                if self.pending.len() > MAX_LINE_LEN {
                    warn!("Discarding serial line longer than {} bytes", MAX_LINE_LEN);
                    self.pending.clear();
                    self.discarding = !complete;
                    return Ok(ReadOutcome::Idle);
                }
                // Without a newline this is end of stream in the middle of a line
                Ok(ReadOutcome::Line(self.take()))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                if self.discarding {
                    self.pending.clear();
                }
                Ok(ReadOutcome::Idle)
            }
            Err(e) => Err(e),
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }
}
