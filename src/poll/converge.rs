//! "All participants agree" checks built on [`poll`].
//!
//! Each iteration observes every participant concurrently, each query bounded by the
//! query timeout. The participants agree when the set of observed values has exactly one
//! element (for miners: when every one reports ready). A failed query only marks the
//! iteration as not converged; a participant that fails `max_consecutive_failures`
//! iterations in a row aborts the wait.

use crate::config::PollConfig;
use crate::poll::wait::{poll, Observation, PollOptions};
use crate::rpc::types::{GetPendingTransactionsReply, MinerInfoResponse, VbkInfo};
use crate::utils::{HarnessError, Result};
use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything a convergence check observes.
pub trait Participant: Send + Sync {
    fn name(&self) -> &str;
}

/// Node queries the block and mempool checks need.
#[async_trait]
pub trait NodeQuery: Participant {
    async fn get_info(&self) -> Result<VbkInfo>;
    async fn get_pending_transactions(&self) -> Result<GetPendingTransactionsReply>;
}

/// Miner query the readiness check needs.
#[async_trait]
pub trait MinerQuery: Participant {
    async fn get_miner_info(&self) -> Result<MinerInfoResponse>;
}

impl<T: Participant + ?Sized> Participant for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: NodeQuery + ?Sized> NodeQuery for Arc<T> {
    async fn get_info(&self) -> Result<VbkInfo> {
        (**self).get_info().await
    }

    async fn get_pending_transactions(&self) -> Result<GetPendingTransactionsReply> {
        (**self).get_pending_transactions().await
    }
}

#[async_trait]
impl<T: MinerQuery + ?Sized> MinerQuery for Arc<T> {
    async fn get_miner_info(&self) -> Result<MinerInfoResponse> {
        (**self).get_miner_info().await
    }
}

fn best_block_hash<N: NodeQuery>(node: &N) -> BoxFuture<'_, Result<String>> {
    Box::pin(async move { Ok(node.get_info().await?.last_block.hash) })
}

fn mempool_ids<N: NodeQuery>(node: &N) -> BoxFuture<'_, Result<Vec<String>>> {
    Box::pin(async move { Ok(node.get_pending_transactions().await?.sorted_tx_ids()) })
}

fn miner_ready<M: MinerQuery>(miner: &M) -> BoxFuture<'_, Result<bool>> {
    Box::pin(async move { Ok(miner.get_miner_info().await?.status.is_ready) })
}

fn unanimous<V: Ord>(values: &[V]) -> bool {
    values.iter().collect::<BTreeSet<_>>().len() == 1
}

fn all_ready(values: &[bool]) -> bool {
    values.iter().all(|ready| *ready)
}

#[derive(Debug, Clone)]
pub struct Convergence {
    interval: Duration,
    query_timeout: Duration,
    max_consecutive_failures: u32,
}

impl Default for Convergence {
    fn default() -> Self {
        Self::new(&PollConfig::default())
    }
}

impl Convergence {
    pub fn new(cfg: &PollConfig) -> Self {
        let mut interval = cfg.interval();
        if interval.is_zero() {
            interval = PollConfig::default().interval();
            warn!("poll interval must be positive; using {:?}", interval);
        }
        let mut query_timeout = cfg.query_timeout();
        if query_timeout >= interval {
            query_timeout = interval / 2;
            warn!(
                "query timeout {:?} is not below poll interval {:?}; using {:?}",
                cfg.query_timeout(),
                interval,
                query_timeout
            );
        }
        Self {
            interval,
            query_timeout,
            max_consecutive_failures: cfg.max_consecutive_failures.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Wait until every node reports the same best block.
    pub async fn sync_blocks<N: NodeQuery>(&self, nodes: &[N], timeout: Duration) -> Result<()> {
        self.converge("syncBlocks", nodes, timeout, best_block_hash::<N>, unanimous)
            .await
    }

    /// Wait until every node reports the same set of pending transactions.
    pub async fn sync_mempools<N: NodeQuery>(&self, nodes: &[N], timeout: Duration) -> Result<()> {
        self.converge("syncMempools", nodes, timeout, mempool_ids::<N>, unanimous)
            .await
    }

    /// Blocks first: mempools are only comparable between nodes on the same tip.
    pub async fn sync_all<N: NodeQuery>(&self, nodes: &[N], timeout: Duration) -> Result<()> {
        self.sync_blocks(nodes, timeout).await?;
        self.sync_mempools(nodes, timeout).await
    }

    /// Wait until every miner reports ready.
    pub async fn sync_miners<M: MinerQuery>(&self, miners: &[M], timeout: Duration) -> Result<()> {
        self.converge("syncMiners", miners, timeout, miner_ready::<M>, all_ready)
            .await
    }

    async fn converge<P, V, F>(
        &self,
        check: &str,
        participants: &[P],
        timeout: Duration,
        observe: F,
        agree: fn(&[V]) -> bool,
    ) -> Result<()>
    where
        P: Participant,
        V: Debug + Send,
        F: for<'a> Fn(&'a P) -> BoxFuture<'a, Result<V>>,
    {
        if participants.is_empty() {
            debug!("{}: no participants", check);
            return Ok(());
        }

        let opts = PollOptions { timeout, interval: self.interval, max_attempts: None };
        let failures = Mutex::new(vec![0u32; participants.len()]);
        let (failures, observe) = (&failures, &observe);

        poll(check, &opts, || async move {
            let observed = join_all(participants.iter().map(|p| async move {
                match tokio::time::timeout(self.query_timeout, observe(p)).await {
                    Ok(res) => res,
                    Err(_) => Err(HarnessError::api(
                        p.name(),
                        format!("no answer within {:?}", self.query_timeout),
                    )),
                }
            }))
            .await;

            let mut snapshot = Vec::with_capacity(participants.len());
            let mut values = Vec::with_capacity(participants.len());
            {
                let mut failures = failures.lock();
                for (i, (p, res)) in participants.iter().zip(observed).enumerate() {
                    match res {
                        Ok(v) => {
                            failures[i] = 0;
                            snapshot.push(format!("{}={:?}", p.name(), v));
                            values.push(v);
                        }
                        Err(e) => {
                            failures[i] += 1;
                            if failures[i] >= self.max_consecutive_failures {
                                return Err(HarnessError::ObservationFailed {
                                    check: check.to_string(),
                                    participant: p.name().to_string(),
                                    failures: failures[i],
                                    reason: e.to_string(),
                                });
                            }
                            debug!("{}: {} not observed this round: {}", check, p.name(), e);
                            snapshot.push(format!("{}=<failed: {}>", p.name(), e));
                        }
                    }
                }
            }

            if values.len() == participants.len() && agree(&values) {
                Ok(Observation::Satisfied)
            } else {
                Ok(Observation::Pending(snapshot.join(", ")))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::{AddressInfo, BlockSummary, MinerStatusResponse, PendingTransaction};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct MockNode {
        name: String,
        hash: Mutex<String>,
        pending: Mutex<Vec<String>>,
        failing: AtomicBool,
        calls: AtomicU32,
    }

    impl MockNode {
        fn new(name: &str, hash: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                hash: Mutex::new(hash.into()),
                pending: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
                calls: AtomicU32::new(0),
            })
        }
    }

    impl Participant for MockNode {
        fn name(&self) -> &str {
            &self.name
        }
    }

    #[async_trait]
    impl NodeQuery for MockNode {
        async fn get_info(&self) -> Result<VbkInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(HarnessError::api(&self.name, "connection refused"));
            }
            Ok(VbkInfo {
                last_block: BlockSummary { hash: self.hash.lock().clone(), number: 1 },
                default_address: AddressInfo { address: "V1".into() },
            })
        }

        async fn get_pending_transactions(&self) -> Result<GetPendingTransactionsReply> {
            Ok(GetPendingTransactionsReply {
                transactions: self
                    .pending
                    .lock()
                    .iter()
                    .map(|id| PendingTransaction { tx_id: id.clone() })
                    .collect(),
            })
        }
    }

    struct MockMiner {
        name: String,
        ready: AtomicBool,
    }

    impl Participant for MockMiner {
        fn name(&self) -> &str {
            &self.name
        }
    }

    #[async_trait]
    impl MinerQuery for MockMiner {
        async fn get_miner_info(&self) -> Result<MinerInfoResponse> {
            Ok(MinerInfoResponse {
                vbk_address: "V1".into(),
                vbk_balance: 0,
                status: MinerStatusResponse { is_ready: self.ready.load(Ordering::SeqCst), reason: None },
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn agreeing_nodes_converge_on_first_attempt() {
        let nodes = vec![MockNode::new("node0", "A"), MockNode::new("node1", "A")];
        Convergence::default().sync_blocks(&nodes, Duration::from_secs(5)).await.unwrap();
        assert_eq!(nodes[0].calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_divergent_values() {
        let nodes = vec![MockNode::new("node0", "A"), MockNode::new("node1", "B")];
        let err = Convergence::default()
            .sync_blocks(&nodes, Duration::from_secs(3))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("syncBlocks"), "{msg}");
        assert!(msg.contains("node0=\"A\"") && msg.contains("node1=\"B\""), "{msg}");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_tolerated() {
        let nodes = vec![MockNode::new("node0", "A"), MockNode::new("node1", "A")];
        nodes[1].failing.store(true, Ordering::SeqCst);
        let flaky = nodes[1].clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            flaky.failing.store(false, Ordering::SeqCst);
        });
        Convergence::default().sync_blocks(&nodes, Duration::from_secs(10)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_escalates() {
        let nodes = vec![MockNode::new("node0", "A"), MockNode::new("node1", "A")];
        nodes[1].failing.store(true, Ordering::SeqCst);
        let err = Convergence::default()
            .sync_blocks(&nodes, Duration::from_secs(60))
            .await
            .unwrap_err();
        match err {
            HarnessError::ObservationFailed { participant, failures, .. } => {
                assert_eq!(participant, "node1");
                assert_eq!(failures, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mempools_compare_sorted_ids() {
        let nodes = vec![MockNode::new("node0", "A"), MockNode::new("node1", "A")];
        *nodes[0].pending.lock() = vec!["b".into(), "a".into()];
        *nodes[1].pending.lock() = vec!["a".into(), "b".into()];
        Convergence::default().sync_all(&nodes, Duration::from_secs(5)).await.unwrap();

        nodes[1].pending.lock().push("c".into());
        let err = Convergence::default()
            .sync_mempools(&nodes, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn miners_must_all_be_ready() {
        let miners = vec![
            Arc::new(MockMiner { name: "apm0".into(), ready: AtomicBool::new(false) }),
            Arc::new(MockMiner { name: "apm1".into(), ready: AtomicBool::new(false) }),
        ];
        // all-false is unanimous but not ready
        assert!(Convergence::default()
            .sync_miners(&miners, Duration::from_secs(2))
            .await
            .unwrap_err()
            .is_timeout());

        miners[0].ready.store(true, Ordering::SeqCst);
        miners[1].ready.store(true, Ordering::SeqCst);
        Convergence::default().sync_miners(&miners, Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn no_participants_is_trivially_converged() {
        let nodes: Vec<Arc<MockNode>> = Vec::new();
        Convergence::default().sync_all(&nodes, Duration::from_millis(10)).await.unwrap();
    }

    #[test]
    fn query_timeout_is_clamped_below_interval() {
        let cfg = PollConfig { interval_ms: 100, query_timeout_ms: 500, ..PollConfig::default() };
        let c = Convergence::new(&cfg);
        assert_eq!(c.query_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn zero_interval_falls_back_to_default_cadence() {
        let cfg = PollConfig { interval_ms: 0, query_timeout_ms: 0, ..PollConfig::default() };
        let c = Convergence::new(&cfg);
        assert_eq!(c.interval(), PollConfig::default().interval());
        assert!(!c.query_timeout().is_zero());
        assert!(c.query_timeout() < c.interval());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_paces_queries() {
        let nodes = vec![MockNode::new("node0", "A"), MockNode::new("node1", "B")];
        let cfg = PollConfig { interval_ms: 0, ..PollConfig::default() };
        let err = Convergence::new(&cfg)
            .sync_blocks(&nodes, Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        // one query per second, not a spin
        assert!(nodes[0].calls.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_agreement_waits_for_the_last_node() {
        let nodes = vec![
            MockNode::new("node0", "A"),
            MockNode::new("node1", "A"),
            MockNode::new("node2", "B"),
        ];
        let convergence = Convergence::default();

        // two of three agreeing is still pending
        let err = convergence.sync_blocks(&nodes, Duration::from_secs(2)).await.unwrap_err();
        match err {
            HarnessError::PollTimeout(e) => {
                let last = e.last_observed.unwrap_or_default();
                assert_eq!(last, "node0=\"A\", node1=\"A\", node2=\"B\"");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let start = tokio::time::Instant::now();
        let switch = Duration::from_millis(2_500);
        let movers = nodes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(switch).await;
            for node in &movers {
                *node.hash.lock() = "C".into();
            }
        });
        convergence.sync_blocks(&nodes, Duration::from_secs(30)).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= switch);
        assert!(elapsed <= switch + convergence.interval(), "{elapsed:?}");
    }
}
