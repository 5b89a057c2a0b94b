//! Helpers that arrange nodes and miners before a scenario runs.

use crate::node::control::NodeControl;
use crate::poll::{poll, Observation, PollOptions};
use crate::rpc::types::{Endpoint, GetRawPopMempoolReply, OperationDetailResponse};
use crate::rpc::{MinerHttpApi, NodeHttpApi, SidechainRpcApi};
use crate::utils::{HarnessError, Result};
use parking_lot::Mutex;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{debug, info};

/// Ask `a` to peer with `b`.
pub async fn connect_nodes<A, B>(a: &A, b: &B, request_timeout: Duration) -> Result<()>
where
    A: NodeControl + ?Sized,
    B: NodeControl + ?Sized,
{
    let endpoint = Endpoint { address: b.host().to_string(), port: b.peer_port() };
    a.http_api(request_timeout)?.add_node(vec![endpoint]).await?;
    debug!("{} -> {} peered", a.name(), b.name());
    Ok(())
}

/// Peer each node with the next one: n0 -> n1 -> ... -> nk.
pub async fn connect_chain<N: NodeControl>(nodes: &[N], request_timeout: Duration) -> Result<()> {
    for pair in nodes.windows(2) {
        connect_nodes(&pair[0], &pair[1], request_timeout).await?;
    }
    Ok(())
}

/// Mine `blocks` blocks to the miner's address and wait until its balance grows.
/// Query failures while waiting count as "not yet".
pub async fn top_up_miner_wallet(
    miner: &MinerHttpApi,
    node: &NodeHttpApi,
    blocks: u32,
    opts: PollOptions,
) -> Result<()> {
    let before = miner.get_miner_info().await?;
    node.generate_blocks(blocks, &before.vbk_address).await?;
    info!("generated {} blocks to {}", blocks, before.vbk_address);

    let balance = before.vbk_balance;
    poll("topUpMinerWallet", &opts, || async move {
        Ok(match miner.get_miner_info().await {
            Ok(info) if info.vbk_balance > balance => Observation::Satisfied,
            Ok(info) => Observation::Pending(format!("balance {}", info.vbk_balance)),
            Err(e) => Observation::Pending(e.to_string()),
        })
    })
    .await
}

/// Wait until operation `id` reaches `state` and return its last detail.
/// Query failures while waiting count as "not yet".
pub async fn wait_for_operation_state(
    miner: &MinerHttpApi,
    id: &str,
    state: &str,
    opts: PollOptions,
) -> Result<OperationDetailResponse> {
    let last = Mutex::new(None);
    let last_ref = &last;
    poll("waitForOperationState", &opts, || async move {
        let op = match miner.get_operation(id).await {
            Ok(op) => op,
            Err(e) => return Ok(Observation::Pending(e.to_string())),
        };
        let observed = if op.state == state {
            Observation::Satisfied
        } else {
            Observation::Pending(format!("operation {} is in state '{}'", id, op.state))
        };
        *last_ref.lock() = Some(op);
        Ok(observed)
    })
    .await?;
    last.into_inner()
        .ok_or_else(|| HarnessError::api(miner.base_url(), "operation was never observed"))
}

/// Wait until the sidechain's PoP mempool holds at least one ATV and `min_vtbs` VTBs.
/// Query failures while waiting count as "not yet".
pub async fn wait_for_pop_mempool(
    sidechain: &SidechainRpcApi,
    min_vtbs: usize,
    opts: PollOptions,
) -> Result<GetRawPopMempoolReply> {
    let last = Mutex::new(None);
    let last_ref = &last;
    poll("waitForPopMempool", &opts, || async move {
        let pool = match sidechain.get_raw_pop_mempool().await {
            Ok(pool) => pool,
            Err(e) => return Ok(Observation::Pending(e.to_string())),
        };
        let observed = if !pool.atvs.is_empty() && pool.vtbs.len() >= min_vtbs {
            Observation::Satisfied
        } else {
            Observation::Pending(format!(
                "{} vbk blocks, {} vtbs, {} atvs",
                pool.vbkblocks.len(),
                pool.vtbs.len(),
                pool.atvs.len()
            ))
        };
        *last_ref.lock() = Some(pool);
        Ok(observed)
    })
    .await?;
    last.into_inner()
        .ok_or_else(|| HarnessError::api(sidechain.url(), "pop mempool was never observed"))
}

/// First port at or above `base` that can be bound on localhost.
pub fn next_available_port(base: u16) -> Result<u16> {
    (base..=u16::MAX)
        .find(|port| TcpListener::bind(("127.0.0.1", *port)).is_ok())
        .ok_or_else(|| HarnessError::Config(format!("no free port at or above {}", base)))
}
