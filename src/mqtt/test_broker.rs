//! Single-client MQTT 3.1.1 peer for driving the event loop over real TCP

use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
pub const DISCONNECT: [u8; 2] = [0xe0, 0x00];

/// QoS 0 PUBLISH with a single-byte remaining length
pub fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let remaining = 2 + topic.len() + payload.len();
    assert!(remaining < 128, "packet too long for this encoder");

    let mut packet = vec![0x30, remaining as u8, 0x00, topic.len() as u8];
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// Everything the client sent, and when it hung up
pub struct BrokerSession {
    pub received: Vec<u8>,
    pub closed_at: Instant,
}

impl BrokerSession {
    pub fn saw(&self, needle: &[u8]) -> bool {
        self.received.windows(needle.len()).any(|w| w == needle)
    }
}

pub struct TestBroker {
    pub port: u16,
    session: JoinHandle<BrokerSession>,
}

impl TestBroker {
    pub async fn start(outgoing: Vec<Vec<u8>>) -> Self {
        Self::start_on(0, outgoing).await
    }

    /// Accepts one client, acknowledges its CONNECT, sends `outgoing`, then
    /// records traffic until the client closes the connection
    pub async fn start_on(port: u16, outgoing: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let session = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];

            let n = socket.read(&mut buf).await.unwrap();
            received.extend_from_slice(&buf[..n]);
            socket.write_all(&CONNACK).await.unwrap();
            for packet in outgoing {
                socket.write_all(&packet).await.unwrap();
            }

            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                }
            }
            BrokerSession {
                received,
                closed_at: Instant::now(),
            }
        });

        Self { port, session }
    }

    pub async fn session(self) -> BrokerSession {
        self.session.await.unwrap()
    }
}

/// A local port with nothing listening on it
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
