//! Entities of the node JSON-RPC API and the miner REST API.
//!
//! Only the fields the harness reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: String,
}

impl fmt::Display for ResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.message, self.details)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolReply {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub hash: String,
    #[serde(default)]
    pub number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: String,
}

/// Reply of `getinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VbkInfo {
    pub last_block: BlockSummary,
    pub default_address: AddressInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRequest {
    pub endpoint: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateBlocksReply {
    #[serde(default)]
    pub result: Option<ResultEntry>,
    #[serde(default)]
    pub hash: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeaderEntry {
    pub header: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLastBlockReply {
    pub header: BlockHeaderEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub tx_id: String,
}

/// Reply of `getpendingtransactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetPendingTransactionsReply {
    #[serde(default)]
    pub transactions: Vec<PendingTransaction>,
}

impl GetPendingTransactionsReply {
    /// Pending transaction ids in sorted order.
    pub fn sorted_tx_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.transactions.iter().map(|t| t.tx_id.clone()).collect();
        ids.sort();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNode {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub application: String,
}

/// Reply of `getpeerinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPeerInfoReply {
    #[serde(default)]
    pub connected_nodes: Vec<ConnectedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCoinsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,
    pub amounts: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCoinsReply {
    #[serde(default)]
    pub tx_ids: Vec<String>,
}

// ---- miner REST API ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinerStatusResponse {
    pub is_ready: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Reply of `GET /api/miner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinerInfoResponse {
    pub vbk_address: String,
    pub vbk_balance: i64,
    pub status: MinerStatusResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineRequest {
    pub chain_symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummaryResponse {
    pub operation_id: String,
    pub chain: String,
    #[serde(default)]
    pub endorsed_block_height: Option<i32>,
    pub state: String,
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDetailResponse {
    pub operation_id: String,
    pub chain: String,
    #[serde(default)]
    pub endorsed_block_height: Option<i32>,
    pub state: String,
    pub task: String,
    #[serde(default)]
    pub state_detail: HashMap<String, String>,
}

// ---- sidechain JSON-RPC API ----

/// Reply of `getblockchaininfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainInfoReply {
    pub chain: String,
    pub blocks: i32,
    pub headers: i32,
    pub bestblockhash: String,
    #[serde(default)]
    pub initialblockdownload: bool,
}

/// Reply of `getrawpopmempool`: ids of the PoP payloads waiting to be mined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRawPopMempoolReply {
    #[serde(default)]
    pub vbkblocks: Vec<String>,
    #[serde(default)]
    pub vtbs: Vec<String>,
    #[serde(default)]
    pub atvs: Vec<String>,
}

impl GetRawPopMempoolReply {
    pub fn is_empty(&self) -> bool {
        self.vbkblocks.is_empty() && self.vtbs.is_empty() && self.atvs.is_empty()
    }
}
