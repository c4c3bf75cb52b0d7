use std::time::{Duration, Instant};

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{mqtt_options, REQUEST_CAPACITY};
use crate::bridge::{CommandDispatcher, ReadingSink};
use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Pause after a failed poll before rumqttc is asked to reconnect
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for flushing the DISCONNECT packet on shutdown
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting,
}

#[derive(Clone, Debug, Default)]
pub struct EventLoopStats {
    pub dispatched: usize,
    pub dropped: usize,
    pub reconnects: usize,
    /// Taken after the last poll, before the dispatcher is released
    pub stopped_at: Option<Instant>,
}

/// Creates the client, queues the control subscription and waits for ConnAck
///
/// Any connection error before the broker acknowledges is returned to the
/// caller; there is no retry at startup.
pub async fn connect(config: &BridgeConfig) -> Result<(AsyncClient, EventLoop), BridgeError> {
    info!(
        "Connecting to MQTT broker {}:{}",
        config.broker_host, config.broker_port
    );
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);

    let filter = config.control_filter();
    client.subscribe(filter.as_str(), QoS::AtMostOnce).await?;
    debug!("Queued subscription to {}", filter);

    let timeout = config.connect_timeout();
    tokio::time::timeout(timeout, wait_for_connack(&mut eventloop))
        .await
        .map_err(|_| BridgeError::ConnectTimeout(timeout))??;

    info!("Connected to MQTT broker, subscribed to {}", filter);
    Ok((client, eventloop))
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), BridgeError> {
    loop {
        match eventloop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                debug!("ConnAck received: {:?}", ack.code);
                return Ok(());
            }
            event => debug!("Event before ConnAck: {:?}", event),
        }
    }
}

/// Drives the MQTT event loop until `shutdown` is cancelled
///
/// Publishes on the control filter are handed to `dispatcher`. Poll errors
/// are logged and polling resumes after a short delay; a ConnAck after a
/// reconnect re-issues the control subscription. Nothing in here awaits the
/// request queue, since only `poll` drains it.
pub async fn run_event_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    dispatcher: CommandDispatcher,
    control_filter: String,
    shutdown: CancellationToken,
) -> EventLoopStats {
    info!("MQTT event loop started");
    let mut state = ConnectionState::Connected;
    let mut stats = EventLoopStats::default();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received, stopping MQTT event loop");
                break;
            }

            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match dispatcher.dispatch(&publish.topic, &publish.payload) {
                        Ok(_) => stats.dispatched += 1,
                        Err(e) => {
                            warn!("Dropping control message on {}: {}", publish.topic, e);
                            stats.dropped += 1;
                        }
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker, subscribing to {}", control_filter);
                    if state == ConnectionState::Reconnecting {
                        stats.reconnects += 1;
                    }
                    state = ConnectionState::Connected;
                    let filter = control_filter.as_str();
                    if let Err(e) = client.try_subscribe(filter, QoS::AtMostOnce) {
                        error!("Failed to subscribe to {}: {}", filter, e);
                    }
                }
                Ok(event) => debug!("MQTT event: {:?}", event),
                Err(e) => {
                    if state == ConnectionState::Connected {
                        error!("MQTT connection error: {}", e);
                    } else {
                        debug!("MQTT reconnect attempt failed: {}", e);
                    }
                    state = ConnectionState::Reconnecting;
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    if state == ConnectionState::Connected {
        disconnect(&client, &mut eventloop).await;
    }

    info!(
        "MQTT event loop stopped: {} commands dispatched, {} dropped, {} reconnects",
        stats.dispatched, stats.dropped, stats.reconnects
    );
    stats.stopped_at = Some(Instant::now());
    stats
}

/// Queues a DISCONNECT and polls until rumqttc has written it
async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    let request = async {
        if let Err(e) = client.disconnect().await {
            debug!("Disconnect request not queued: {}", e);
        }
    };
    let flush = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                Ok(event) => debug!("MQTT event during disconnect: {:?}", event),
                Err(e) => {
                    debug!("Connection closed during disconnect: {}", e);
                    return false;
                }
            }
        }
    };

    let sent = async { tokio::join!(request, flush).1 };
    match tokio::time::timeout(DISCONNECT_TIMEOUT, sent).await {
        Ok(true) => debug!("Disconnect sent to broker"),
        Ok(false) => {}
        Err(_) => warn!("Timed out sending disconnect to broker"),
    }
}

/// Publishes sensor readings from the blocking read thread
///
/// Blocks on the async publish so that a full request queue applies
/// backpressure to the read loop instead of dropping readings.
#[derive(Clone)]
pub struct MqttSink {
    client: AsyncClient,
    runtime: Handle,
}

impl MqttSink {
    /// Must be called from within the tokio runtime
    pub fn new(client: AsyncClient) -> Self {
        Self {
            client,
            runtime: Handle::current(),
        }
    }
}

impl ReadingSink for MqttSink {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BridgeError> {
        self.runtime.block_on(self.client.publish(
            topic,
            QoS::AtMostOnce,
            false,
            payload.as_bytes().to_vec(),
        ))?;
        Ok(())
    }
}
