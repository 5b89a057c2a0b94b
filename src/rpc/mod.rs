//! RPC module - HTTP clients for the services a scenario drives.
//!
//! - `NodeHttpApi`: JSON-RPC 2.0 over HTTP at `http://host:port/api`
//! - `MinerHttpApi`: REST at `http://host:port/api/miner/...`
//! - `SidechainRpcApi`: bitcoind-style JSON-RPC with basic auth at `http://host:port/`
//!
//! The node and miner clients implement the query traits the convergence checks in `poll` use.

pub mod miner_api;
pub mod node_api;
mod params;
pub mod sidechain_api;
pub mod types;

pub use miner_api::MinerHttpApi;
pub use node_api::NodeHttpApi;
pub use sidechain_api::SidechainRpcApi;
