//! REST client for the PoP miner's HTTP API.

use crate::poll::{MinerQuery, Participant};
use crate::rpc::types::{MineRequest, MinerInfoResponse, OperationDetailResponse, OperationSummaryResponse};
use crate::utils::{HarnessError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub struct MinerHttpApi {
    name: String,
    base_url: String,
    client: Client,
}

impl MinerHttpApi {
    pub fn new(name: impl Into<String>, host: &str, port: u16, request_timeout: Duration) -> Result<Self> {
        let name = name.into();
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| HarnessError::api(&name, e))?;
        Ok(Self {
            name,
            base_url: format!("http://{}:{}", host, port),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("{} <--http-- GET {}", self.name, path);
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HarnessError::api(format!("{} GET {}", self.name, path), e))?;
        resp.json()
            .await
            .map_err(|e| HarnessError::api(format!("{} GET {}", self.name, path), e))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        debug!("{} <--http-- POST {}", self.name, path);
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HarnessError::api(format!("{} POST {}", self.name, path), e))?;
        resp.json()
            .await
            .map_err(|e| HarnessError::api(format!("{} POST {}", self.name, path), e))
    }

    pub async fn get_miner_info(&self) -> Result<MinerInfoResponse> {
        self.get("/api/miner").await
    }

    pub async fn mine(&self, req: &MineRequest) -> Result<OperationSummaryResponse> {
        self.post("/api/miner/mine", req).await
    }

    pub async fn get_operation(&self, id: &str) -> Result<OperationDetailResponse> {
        self.get(&format!("/api/miner/operations/{}", id)).await
    }
}

impl Participant for MinerHttpApi {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl MinerQuery for MinerHttpApi {
    async fn get_miner_info(&self) -> Result<MinerInfoResponse> {
        MinerHttpApi::get_miner_info(self).await
    }
}
