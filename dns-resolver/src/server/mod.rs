//! The `Server` abstraction: one socket to one nameserver, satisfying
//! `ask(Question) -> Message` with liveness tracking.
//!
//! `Udp` and `Tcp` are two variants of a closed sum type rather than
//! trait objects, matching the reference implementation's preference
//! for enums where the variant set is fixed.

mod registry;
mod tcp;
#[cfg(test)]
pub mod test_util;
mod udp;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dns_codec::Question;

use crate::error::TransportError;

pub use registry::ServerRegistry;
pub use tcp::TcpServer;
pub use udp::UdpServer;

/// Which transport a `Server` speaks.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }
}

pub enum Server {
    Udp(UdpServer),
    Tcp(TcpServer),
}

impl Server {
    /// Construct and open the socket for `protocol://host:port`. The
    /// returned handle is not-alive if the connect itself failed; the
    /// registry observes this and evicts.
    pub async fn connect(
        protocol: Protocol,
        address: SocketAddr,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        match protocol {
            Protocol::Udp => Ok(Server::Udp(UdpServer::connect(address, timeout).await?)),
            Protocol::Tcp => Ok(Server::Tcp(TcpServer::connect(address, timeout).await?)),
        }
    }

    /// Serialize the question, transmit, and await the matching reply.
    pub async fn ask(&self, question: &Question) -> Result<dns_codec::Message, TransportError> {
        match self {
            Server::Udp(udp) => udp.ask(question).await,
            Server::Tcp(tcp) => tcp.ask(question).await,
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Server::Udp(udp) => udp.is_alive(),
            Server::Tcp(tcp) => tcp.is_alive(),
        }
    }
}

/// Shared liveness flag: `false` once the underlying socket has failed
/// or been closed. Definitive only after the first `ask` resolves.
#[derive(Debug, Default)]
struct Liveness(AtomicBool);

impl Liveness {
    fn new() -> Self {
        Self(AtomicBool::new(true))
    }

    fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn mark_dead(&self) {
        self.0.store(false, Ordering::Release);
    }
}
