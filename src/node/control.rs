use crate::network::transport;
use crate::poll::{wait_until, PollOptions};
use crate::rpc::NodeHttpApi;
use crate::utils::{HarnessError, Result};
use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use std::time::Duration;
use tracing::{error, info};

/// A node under test that the harness can address and start or stop.
#[async_trait]
pub trait NodeControl: Send + Sync {
    fn name(&self) -> &str;
    fn host(&self) -> &str;
    fn peer_port(&self) -> u16;
    fn http_port(&self) -> u16;

    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;

    /// JSON-RPC client for this node's HTTP API.
    fn http_api(&self, request_timeout: Duration) -> Result<NodeHttpApi> {
        NodeHttpApi::new(self.name(), self.host(), self.http_port(), request_timeout)
    }
}

/// A node somebody else already runs.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    name: String,
    host: String,
    peer_port: u16,
    http_port: u16,
    start_timeout: Duration,
}

impl RemoteNode {
    pub fn new(name: impl Into<String>, host: impl Into<String>, peer_port: u16, http_port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            peer_port,
            http_port,
            start_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }
}

#[async_trait]
impl NodeControl for RemoteNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn peer_port(&self) -> u16 {
        self.peer_port
    }

    fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Wait until the peer port accepts connections.
    async fn start(&self) -> Result<()> {
        let opts = PollOptions::default()
            .timeout(self.start_timeout)
            .interval(Duration::from_millis(250));
        wait_until(opts, || transport::is_listening(&self.host, self.peer_port, Duration::from_millis(200)))
            .await
            .map_err(|e| HarnessError::Node(format!("{} did not come up: {}", self.name, e)))?;
        info!("{} is listening on {}:{}", self.name, self.host, self.peer_port);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Start every node concurrently. Fails with the first error.
pub async fn start_all<N: NodeControl>(nodes: &[N]) -> Result<()> {
    try_join_all(nodes.iter().map(|n| n.start())).await?;
    Ok(())
}

/// Stop every node concurrently. All nodes are asked to stop even if some fail.
pub async fn stop_all<N: NodeControl>(nodes: &[N]) -> Result<()> {
    let results = join_all(nodes.iter().map(|n| n.stop())).await;
    let mut first = None;
    for (node, res) in nodes.iter().zip(results) {
        if let Err(e) = res {
            error!("stopping {} failed: {}", node.name(), e);
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}
