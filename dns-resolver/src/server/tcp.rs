use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use dns_codec::{Message, Question};

use crate::error::TransportError;

use super::Liveness;

/// One connection per server. In-flight requests share the connection,
/// serialised by an internal mutex (the reference implementation notes
/// replies would otherwise need demultiplexing by transaction ID; this
/// crate instead takes the simpler route of one request in flight at a
/// time per connection).
pub struct TcpServer {
    stream: Mutex<TcpStream>,
    timeout: Duration,
    liveness: Liveness,
}

impl TcpServer {
    pub async fn connect(address: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|error| TransportError::Io {
                message: error.to_string(),
            })?;

        Ok(Self {
            stream: Mutex::new(stream),
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
                tracing::debug!(?question, "tcp query timed out");
                Err(TransportError::Timeout)
            }
        }
    }

    async fn ask_notimeout(&self, question: &Question) -> Result<Message, TransportError> {
        let id = rand::thread_rng().gen();
        let mut request = Message::from_question(id, question.clone());
        request.header.recursion_desired = true;

        let bytes = request.into_octets().map_err(|error| {
            tracing::warn!(?request, %error, "could not serialise message");
            TransportError::Io {
                message: error.to_string(),
            }
        })?;
        let len: u16 = bytes.len().try_into().map_err(|_| TransportError::Io {
            message: "message too large for tcp length prefix".to_string(),
        })?;

        let mut stream = self.stream.lock().await;

        let write_result: std::io::Result<()> = async {
            stream.write_all(&len.to_be_bytes()).await?;
            stream.write_all(&bytes).await?;
            Ok(())
        }
        .await;
        if let Err(error) = write_result {
            self.liveness.mark_dead();
            return Err(TransportError::Io {
                message: error.to_string(),
            });
        }

        let response_len = stream.read_u16().await.map_err(|error| {
            self.liveness.mark_dead();
            TransportError::Io {
                message: error.to_string(),
            }
        })?;
        let mut buf = vec![0u8; response_len.into()];
        stream.read_exact(&mut buf).await.map_err(|error| {
            self.liveness.mark_dead();
            TransportError::Io {
                message: error.to_string(),
            }
        })?;

        let response = Message::from_octets(&buf).map_err(|error| {
            tracing::warn!(%error, "could not deserialise tcp response");
            TransportError::Io {
                message: error.to_string(),
            }
        })?;

        if response.header.id != id {
            tracing::debug!(expected = id, got = response.header.id, "tcp response id mismatch");
            return Err(TransportError::NoMatchingResponse);
        }

        tracing::trace!(message = ?response, "received tcp response");
        Ok(response)
    }
}
