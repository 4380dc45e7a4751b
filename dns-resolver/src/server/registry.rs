//! A mapping `uri -> Server`, at most one entry per URI, evicting on
//! construction failure or once a handle reports not-alive.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::server::{Protocol, Server};

#[derive(Default)]
pub struct ServerRegistry {
    servers: Mutex<HashMap<String, Arc<Server>>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing `Server` for `protocol://address` if
    /// present and alive, else constructs one, stores it, and returns
    /// it. A not-alive entry is evicted before a fresh one is built.
    pub async fn get_server(
        &self,
        protocol: Protocol,
        address: SocketAddr,
        timeout: Duration,
    ) -> Result<Arc<Server>, TransportError> {
        let key = format!("{}://{address}", protocol.as_str());

        let mut servers = self.servers.lock().await;
        if let Some(server) = servers.get(&key) {
            if server.is_alive() {
                return Ok(Arc::clone(server));
            }
            servers.remove(&key);
        }

        let server = Arc::new(Server::connect(protocol, address, timeout).await?);
        servers.insert(key, Arc::clone(&server));
        Ok(server)
    }

    /// Remove `protocol://address` from the registry, e.g. after a
    /// caller observes the handle it was given has gone not-alive.
    pub async fn evict(&self, protocol: Protocol, address: SocketAddr) {
        let key = format!("{}://{address}", protocol.as_str());
        self.servers.lock().await.remove(&key);
    }
}
