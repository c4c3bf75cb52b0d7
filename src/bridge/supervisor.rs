//! Bridge Supervisor with statum state machine for the process lifecycle
//!
//! ```text
//! Disconnected ──► Connecting ──► Running ──► ShuttingDown ──► Stopped
//!   (open serial)   (MQTT handshake)  (stop signal)  (MQTT first, then serial)
//! ```
//!
//! Any failure before `Running` is returned to the caller and ends the process.
//! Once running, per-message failures are handled inside the tasks.

use std::future::Future;
use std::sync::Arc;

use rumqttc::{AsyncClient, EventLoop};
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CommandDispatcher, PublisherStats, SensorPublisher};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::mqtt::{self, EventLoopStats, MqttSink};
use crate::serial::{run_writer, SerialChannel, WriterStats};

#[state]
#[derive(Debug, Clone)]
pub enum BridgeState {
    Disconnected, // Nothing opened yet
    Connecting,   // Serial open, waiting for the broker
    Running,      // Both directions active
    ShuttingDown, // Stop signal received
    Stopped,      // All handles released
}

/// Final counters of a bridge run
#[derive(Clone, Debug, Default)]
pub struct BridgeReport {
    pub mqtt: EventLoopStats,
    pub publisher: PublisherStats,
    pub writer: WriterStats,
}

/// Handles of the three activities spawned by `start`
pub struct BridgeTasks {
    event_loop: JoinHandle<EventLoopStats>,
    writer: JoinHandle<WriterStats>,
    reader: JoinHandle<PublisherStats>,
}

#[machine]
pub struct Bridge<S: BridgeState> {
    config: Arc<BridgeConfig>,
    shutdown: CancellationToken,
    serial: Option<SerialChannel>,
    tasks: Option<BridgeTasks>,
    report: Option<BridgeReport>,
}

impl Bridge<Disconnected> {
    pub fn create(config: BridgeConfig) -> Self {
        debug!("Creating bridge with config: {:?}", config);
        Self::new(
            Arc::new(config),
            CancellationToken::new(),
            None, // serial
            None, // tasks
            None, // report
        )
    }

    /// Opens the configured serial port and waits out the board reset
    pub async fn connect(self) -> Result<Bridge<Connecting>, BridgeError> {
        let port = self.config.serial_port.clone();
        let baud_rate = self.config.baud_rate;
        let timeout = self.config.read_timeout();

        let serial =
            tokio::task::spawn_blocking(move || SerialChannel::open(&port, baud_rate, timeout))
                .await??;

        let delay = self.config.reset_delay();
        if !delay.is_zero() {
            debug!("Waiting {:?} for the device to reset", delay);
            tokio::time::sleep(delay).await;
        }

        Ok(self.attach(serial))
    }

    /// Uses an already-open channel instead of the configured port
    pub fn attach(mut self, serial: SerialChannel) -> Bridge<Connecting> {
        info!("Serial channel {} attached", serial.name());
        self.serial = Some(serial);
        self.transition()
    }
}

impl Bridge<Connecting> {
    /// Completes the MQTT handshake and starts both directions
    pub async fn start(self) -> Result<Bridge<Running>, BridgeError> {
        let (client, eventloop) = mqtt::connect(&self.config).await?;
        self.launch(client, eventloop)
    }

    fn launch(
        mut self,
        client: AsyncClient,
        eventloop: EventLoop,
    ) -> Result<Bridge<Running>, BridgeError> {
        let serial = self.serial.take().ok_or_else(|| {
            BridgeError::Config("Bridge started without a serial channel".to_string())
        })?;
        info!(
            "Bridging {}@{} -> MQTT {}:{}",
            serial.name(),
            self.config.baud_rate,
            self.config.broker_host,
            self.config.broker_port
        );
        let (reader, write_half) = serial.split();

        let (command_tx, command_rx) = mpsc::channel(self.config.command_queue_capacity);
        let writer = tokio::task::spawn_blocking(move || run_writer(write_half, command_rx));

        let dispatcher = CommandDispatcher::new(self.config.control_prefix(), command_tx);
        let event_loop = tokio::spawn(mqtt::run_event_loop(
            client.clone(),
            eventloop,
            dispatcher,
            self.config.control_filter(),
            self.shutdown.clone(),
        ));

        let sink = MqttSink::new(client);
        let mut publisher = SensorPublisher::new(self.config.base_topic.clone(), sink);
        let token = self.shutdown.clone();
        let reader = tokio::task::spawn_blocking(move || publisher.run(reader, &token));

        self.tasks = Some(BridgeTasks {
            event_loop,
            writer,
            reader,
        });
        info!("Bridge running");
        Ok(self.transition())
    }
}

impl Bridge<Running> {
    /// Waits for `signal`, then hands over to shutdown
    pub async fn run_until_shutdown<F>(self, signal: F) -> Bridge<ShuttingDown>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = signal => info!("Stop signal received"),
            _ = self.shutdown.cancelled() => info!("Bridge cancelled"),
        }
        self.transition()
    }
}

impl Bridge<ShuttingDown> {
    /// Stops MQTT processing, then releases the serial handles
    ///
    /// The writer only finishes once the event loop (and with it the last
    /// command sender) is gone, so no write is attempted on a closed port.
    pub async fn shutdown(mut self) -> Result<Bridge<Stopped>, BridgeError> {
        info!("Shutting down bridge");
        self.shutdown.cancel();

        let mut report = BridgeReport::default();
        if let Some(tasks) = self.tasks.take() {
            match tasks.event_loop.await {
                Ok(stats) => report.mqtt = stats,
                Err(e) => error!("MQTT event loop task failed: {}", e),
            }
            debug!("MQTT event processing stopped");

            report.writer = tasks.writer.await?;
            debug!("Serial write half closed");

            report.publisher = tasks.reader.await?;
            debug!("Serial read half closed");
        } else {
            warn!("Bridge shut down without running tasks");
        }

        info!(
            "Bridge stopped: {} readings published, {} commands written",
            report.publisher.published, report.writer.written
        );
        self.report = Some(report);
        Ok(self.transition())
    }
}

impl Bridge<Stopped> {
    pub fn report(&self) -> BridgeReport {
        self.report.clone().unwrap_or_default()
    }
}
