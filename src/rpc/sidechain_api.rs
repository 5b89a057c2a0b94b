//! JSON-RPC client for a PoP-enabled sidechain daemon (`http://host:port/`).
//!
//! The daemon speaks bitcoind-style JSON-RPC behind HTTP basic auth.

use crate::rpc::params::empty_params;
use crate::rpc::types::{BlockchainInfoReply, GetRawPopMempoolReply};
use crate::utils::{HarnessError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::core::traits::ToRpcParams;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::trace;

/// Upper bound on nonce attempts handed to `generatetoaddress`.
pub const GENERATE_MAX_TRIES: u64 = 2_147_000_000;

/// `Authorization` value for basic auth.
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

pub struct SidechainRpcApi {
    name: String,
    url: String,
    client: HttpClient,
}

impl SidechainRpcApi {
    /// An empty `username` sends no credentials.
    pub fn new(
        name: impl Into<String>,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let url = format!("http://{}:{}/", host, port);
        let mut headers = HeaderMap::new();
        if !username.is_empty() {
            let value = HeaderValue::from_str(&basic_auth(username, password))
                .map_err(|e| HarnessError::Config(format!("{}: bad rpc credentials: {}", name, e)))?;
            headers.insert("Authorization", value);
        }
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .set_headers(headers)
            .build(&url)
            .map_err(|e| HarnessError::api(&name, e))?;
        Ok(Self { name, url, client })
    }

    pub fn name(&self) -> &str {
        &self.name
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

    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfoReply> {
        self.call("getblockchaininfo", empty_params()).await
    }

    /// Mine `blocks` blocks paying to `address`; returns their hashes.
    pub async fn generate_to_address(&self, blocks: u32, address: &str) -> Result<Vec<String>> {
        let mut params = ArrayParams::new();
        let bad_param = |e: serde_json::Error| HarnessError::api(&self.name, e);
        params.insert(blocks).map_err(bad_param)?;
        params.insert(address).map_err(bad_param)?;
        params.insert(GENERATE_MAX_TRIES).map_err(bad_param)?;
        self.call("generatetoaddress", params).await
    }

    pub async fn get_new_address(&self) -> Result<String> {
        self.call("getnewaddress", empty_params()).await
    }

    pub async fn get_raw_pop_mempool(&self) -> Result<GetRawPopMempoolReply> {
        self.call("getrawpopmempool", empty_params()).await
    }
}
