//! `MiniNode`: a minimal peer that speaks the node's wire protocol.
//!
//! It holds at most one [`Connection`]. Connecting retries a fixed number of times with a
//! fixed delay; once connected, transport failures close the connection and are never
//! retried here. Reconnecting means calling [`MiniNode::connect`] again, which builds a
//! fresh connection.

use crate::config::PeerConfig;
use crate::network::connection::{Connection, ConnectionState, EventHandler, Handlers};
use crate::network::handshake::{create_announce, NodeMetadata};
use crate::network::message::Event;
use crate::network::stats::MessageStats;
use crate::network::transport;
use crate::node::NodeControl;
use crate::utils::{HarnessError, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub struct MiniNode {
    runtime: Handle,
    config: PeerConfig,
    metadata: NodeMetadata,
    identity: AtomicU64,
    handlers: Handlers,
    connection: Mutex<Option<Connection>>,
    connecting: AtomicBool,
}

/// Clears the `connecting` flag even if the connect future is dropped midway.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MiniNode {
    /// Create a client whose connection tasks run on `runtime`.
    pub fn new(runtime: Handle, config: PeerConfig) -> Self {
        Self::with_handlers(runtime, config, Vec::new())
    }

    pub fn with_handlers(
        runtime: Handle,
        config: PeerConfig,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> Self {
        let metadata = config.identity.clone();
        Self {
            runtime,
            config,
            metadata,
            identity: AtomicU64::new(0),
            handlers: Arc::new(RwLock::new(handlers)),
            connection: Mutex::new(None),
            connecting: AtomicBool::new(false),
        }
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    pub fn next_message_id(&self) -> String {
        (self.identity.fetch_add(1, Ordering::AcqRel) + 1).to_string()
    }

    /// Register another handler. It also applies to the current connection.
    pub fn on_message(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().push(handler);
    }

    pub fn connection(&self) -> Option<Connection> {
        self.connection.lock().clone()
    }

    pub fn peer_name(&self) -> Option<String> {
        self.connection().map(|c| c.peer_name().to_string())
    }

    pub fn is_connected(&self) -> bool {
        self.connection().map(|c| c.is_running()).unwrap_or(false)
    }

    pub fn state(&self) -> ConnectionState {
        if self.connecting.load(Ordering::Acquire) {
            return ConnectionState::Connecting;
        }
        match self.connection() {
            Some(conn) => conn.state(),
            None => ConnectionState::Disconnected,
        }
    }

    /// Counters of the current connection, or of the last one if it died on its own.
    pub fn stats(&self) -> Option<Arc<MessageStats>> {
        self.connection().map(|c| c.stats())
    }

    /// Connect to the peer port of `node`.
    pub async fn connect_to<N: NodeControl + ?Sized>(
        &self,
        node: &N,
        announce: bool,
    ) -> Result<Connection> {
        self.open(node.name().to_string(), node.host(), node.peer_port(), announce).await
    }

    /// Connect to `host:port`, announcing ourselves first when `announce` is set.
    pub async fn connect(&self, host: &str, port: u16, announce: bool) -> Result<Connection> {
        self.open(format!("{}:{}", host, port), host, port, announce).await
    }

    async fn open(
        &self,
        peer_name: String,
        host: &str,
        port: u16,
        announce: bool,
    ) -> Result<Connection> {
        if let Some(conn) = self.connection() {
            if conn.is_running() {
                warn!("Already connected to {}, disconnect first", conn.peer_name());
                return Ok(conn);
            }
        }
        if self
            .connecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HarnessError::Connection(format!(
                "{}: another connect is already in progress",
                peer_name
            )));
        }
        let _guard = ConnectingGuard(&self.connecting);
        self.config.validate()?;

        let attempts = self.config.connect_attempts;
        let mut last_err = String::new();
        for attempt in 1..=attempts {
            debug!("Connecting to {} (attempt {}/{})", peer_name, attempt, attempts);
            match self.dial(host, port).await {
                Ok(stream) => {
                    let conn = Connection::spawn(
                        &self.runtime,
                        stream,
                        peer_name.clone(),
                        &self.config,
                        self.handlers.clone(),
                    )?;
                    if announce {
                        conn.send(create_announce(self.next_message_id(), &self.metadata))?;
                    }
                    if let Some(old) = self.connection.lock().replace(conn.clone()) {
                        old.close();
                    }
                    info!("Connected to {} as {}", peer_name, self.metadata.id);
                    return Ok(conn);
                }
                Err(e) => {
                    warn!("[{}] connect attempt {}/{} failed: {}", peer_name, attempt, attempts, e);
                    last_err = e.to_string();
                    if attempt < attempts {
                        sleep(self.config.connect_retry_delay()).await;
                    }
                }
            }
        }
        error!("Unable to connect to {}", peer_name);
        Err(HarnessError::Connection(format!(
            "{} unreachable after {} attempts: {}",
            peer_name, attempts, last_err
        )))
    }

    /// Open the socket on the peer runtime so it is registered with that runtime's reactor.
    async fn dial(&self, host: &str, port: u16) -> Result<tokio::net::TcpStream> {
        let host = host.to_string();
        let limit = self.config.connect_timeout();
        self.runtime
            .spawn(async move { transport::connect(&host, port, limit).await })
            .await
            .map_err(|e| HarnessError::Connection(format!("connect task failed: {}", e)))?
    }

    /// Close the connection if there is one. Returns true if this call closed it.
    pub fn disconnect(&self) -> bool {
        let conn = self.connection.lock().take();
        match conn {
            Some(conn) => {
                debug!("Disconnecting from {}", conn.peer_name());
                conn.close()
            }
            None => false,
        }
    }

    /// Queue `event` on the live connection.
    pub fn send(&self, event: Event) -> Result<()> {
        match self.connection() {
            Some(conn) if conn.is_running() => conn.send(event),
            _ => Err(HarnessError::NotConnected("MiniNode is not connected".into())),
        }
    }
}

impl Drop for MiniNode {
    fn drop(&mut self) {
        self.disconnect();
    }
}
