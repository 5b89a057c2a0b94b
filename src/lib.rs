//! Integration-test harness for a node / PoP miner network.
//!
//! - `network`: `MiniNode`, a minimal client of the node's binary peer protocol
//! - `poll`: `wait_until` and the multi-node convergence checks
//! - `rpc`: node JSON-RPC and miner REST clients
//! - `node`: node control and topology helpers

pub mod cli;
pub mod config;
pub mod network;
pub mod node;
pub mod poll;
pub mod rpc;
pub mod utils;

pub use config::{HarnessConfig, OverflowPolicy, PeerConfig, PollConfig};
pub use utils::{HarnessError, Result};
