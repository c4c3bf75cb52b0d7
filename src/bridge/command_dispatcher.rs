//! Command Dispatcher - control messages in, serial commands queued

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

use crate::error::BridgeError;
use crate::protocol::{topic_to_command, ControlCommand, DecodeError};

/// Turns control-topic publishes into commands for the serial writer
///
/// Holds only the sending side of the command queue; the serial handle itself
/// belongs to the writer task.
#[derive(Clone, Debug)]
pub struct CommandDispatcher {
    control_prefix: String,
    commands: mpsc::Sender<ControlCommand>,
}

impl CommandDispatcher {
    pub fn new(control_prefix: impl Into<String>, commands: mpsc::Sender<ControlCommand>) -> Self {
        Self {
            control_prefix: control_prefix.into(),
            commands,
        }
    }

    /// Decodes one control message and queues the resulting command
    ///
    /// The payload must be UTF-8 but is otherwise unused; device and action
    /// come from the topic. Never waits: a full queue drops the command.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<ControlCommand, BridgeError> {
        let payload = std::str::from_utf8(payload).map_err(DecodeError::from)?;
        debug!("Control message on {} (payload {:?})", topic, payload);

        let cmd = topic_to_command(&self.control_prefix, topic)
            .ok_or_else(|| DecodeError::MalformedTopic(topic.to_string()))?;

        self.commands.try_send(cmd.clone()).map_err(|e| match e {
            TrySendError::Full(_) => BridgeError::QueueFull,
            TrySendError::Closed(_) => BridgeError::QueueClosed,
        })?;

        info!("{} -> {}", topic, cmd);
        Ok(cmd)
    }
}
