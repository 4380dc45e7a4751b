use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;

use dns_codec::{Message, Question};

use crate::error::TransportError;

use super::Liveness;

/// A single datagram request and reply. A reply whose transaction ID
/// does not match the outstanding request is discarded.
///
/// The socket is held exclusively for the duration of one `ask` (via
/// an internal mutex) so two concurrent callers - e.g. `resolve`'s
/// parallel A/AAAA queries landing on the same nameserver - cannot
/// have one query's `recv` consume the other's reply.
pub struct UdpServer {
    socket: Mutex<UdpSocket>,
    timeout: Duration,
    liveness: Liveness,
}

impl UdpServer {
    pub async fn connect(address: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|error| TransportError::Io {
                message: error.to_string(),
            })?;
        socket
            .connect(address)
            .await
            .map_err(|error| TransportError::Io {
                message: error.to_string(),
            })?;

        Ok(Self {
            socket: Mutex::new(socket),
            timeout,
            liveness: Liveness::new(),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.get()
    }

    pub async fn ask(&self, question: &Question) -> Result<Message, TransportError> {
        match timeout(self.timeout, self.ask_notimeout(question)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(?question, "udp query timed out");
                Err(TransportError::Timeout)
            }
        }
    }

    async fn ask_notimeout(&self, question: &Question) -> Result<Message, TransportError> {
        let id = rand::thread_rng().gen();
        let mut request = Message::from_question(id, question.clone());
        request.header.recursion_desired = true;

        let mut bytes = request.into_octets().map_err(|error| {
            tracing::warn!(?request, %error, "could not serialise message");
            TransportError::Io {
                message: error.to_string(),
            }
        })?;

        // messages over the UDP payload limit come back with TC set by
        // the server; clear the bit on our own request regardless.
        if bytes.len() >= 3 {
            bytes[2] &= 0b1111_1101;
        }

        let socket = self.socket.lock().await;

        socket.send(&bytes).await.map_err(|error| {
            self.liveness.mark_dead();
            TransportError::Io {
                message: error.to_string(),
            }
        })?;

        let mut buf = vec![0u8; 4096];
        let len = socket.recv(&mut buf).await.map_err(|error| {
            self.liveness.mark_dead();
            TransportError::Io {
                message: error.to_string(),
            }
        })?;

        let response = Message::from_octets(&buf[..len]).map_err(|error| {
            tracing::warn!(%error, "could not deserialise udp response");
            TransportError::Io {
                message: error.to_string(),
            }
        })?;

        if response.header.id != id {
            tracing::debug!(expected = id, got = response.header.id, "udp response id mismatch");
            return Err(TransportError::NoMatchingResponse);
        }

        tracing::trace!(message = ?response, "received udp response");
        Ok(response)
    }
}
