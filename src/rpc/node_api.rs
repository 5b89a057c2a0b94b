//! JSON-RPC client for the node's HTTP API (`http://host:port/api`).

use crate::poll::{NodeQuery, Participant};
use crate::rpc::params::{empty_params, ObjectParams};
use crate::rpc::types::{
    Endpoint, GenerateBlocksReply, GetLastBlockReply, GetPeerInfoReply,
    GetPendingTransactionsReply, NodeRequest, ProtocolReply, SendCoinsReply, SendCoinsRequest,
    VbkInfo,
};
use crate::utils::{HarnessError, Result};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::traits::ToRpcParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

#[derive(Serialize)]
struct GenerateBlocksParams<'a> {
    blocks: u32,
    address: &'a str,
}

pub struct NodeHttpApi {
    name: String,
    url: String,
    client: HttpClient,
}

impl NodeHttpApi {
    pub fn new(name: impl Into<String>, host: &str, port: u16, request_timeout: Duration) -> Result<Self> {
        let name = name.into();
        let url = format!("http://{}:{}/api", host, port);
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(&url)
            .map_err(|e| HarnessError::api(&name, e))?;
        Ok(Self { name, url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<R, P>(&self, method: &str, params: P) -> Result<R>
    where
        R: DeserializeOwned,
        P: ToRpcParams + Send,
    {
        trace!("[{}] -> {}", self.name, method);
        self.client
            .request(method, params)
            .await
            .map_err(|e| HarnessError::api(format!("{} ({})", self.name, method), e))
    }

    /// Fail unless the node reported success.
    fn check(&self, method: &str, reply: ProtocolReply) -> Result<ProtocolReply> {
        if reply.success {
            return Ok(reply);
        }
        let reason = reply
            .results
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(HarnessError::api(format!("{} ({})", self.name, method), reason))
    }

    pub async fn get_info(&self) -> Result<VbkInfo> {
        self.call("getinfo", empty_params()).await
    }

    pub async fn get_peer_info(&self) -> Result<GetPeerInfoReply> {
        self.call("getpeerinfo", empty_params()).await
    }

    pub async fn get_pending_transactions(&self) -> Result<GetPendingTransactionsReply> {
        self.call("getpendingtransactions", empty_params()).await
    }

    pub async fn get_last_block(&self) -> Result<GetLastBlockReply> {
        self.call("getlastblock", empty_params()).await
    }

    pub async fn generate_blocks(&self, blocks: u32, address: &str) -> Result<GenerateBlocksReply> {
        self.call("generateblocks", ObjectParams(GenerateBlocksParams { blocks, address }))
            .await
    }

    pub async fn add_node(&self, endpoints: Vec<Endpoint>) -> Result<ProtocolReply> {
        let reply = self.call("addnode", ObjectParams(NodeRequest { endpoint: endpoints })).await?;
        self.check("addnode", reply)
    }

    pub async fn remove_node(&self, endpoints: Vec<Endpoint>) -> Result<ProtocolReply> {
        let reply = self
            .call("removenode", ObjectParams(NodeRequest { endpoint: endpoints }))
            .await?;
        self.check("removenode", reply)
    }

    pub async fn send_coins(&self, req: SendCoinsRequest) -> Result<SendCoinsReply> {
        self.call("sendcoins", ObjectParams(req)).await
    }
}

impl Participant for NodeHttpApi {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl NodeQuery for NodeHttpApi {
    async fn get_info(&self) -> Result<VbkInfo> {
        NodeHttpApi::get_info(self).await
    }

    async fn get_pending_transactions(&self) -> Result<GetPendingTransactionsReply> {
        NodeHttpApi::get_pending_transactions(self).await
    }
}
