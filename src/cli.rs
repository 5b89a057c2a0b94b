use crate::config::HarnessConfig;
use crate::network::{handler_fn, MiniNode};
use crate::poll::Convergence;
use crate::rpc::{MinerHttpApi, NodeHttpApi};
use crate::utils::init_logging;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

/// Diagnostics against a running node / miner network.
#[derive(Parser)]
#[clap(name = "popnet-harness", version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    pub log: String,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Connect to a node's peer port, announce, and print message counters
    Announce {
        #[clap(long, default_value = "127.0.0.1")]
        host: String,

        #[clap(long)]
        port: u16,

        /// how long to listen after announcing
        #[clap(long, default_value_t = 2_000)]
        listen_ms: u64,
    },
    /// Wait until nodes agree on the best block (and optionally the mempool)
    Sync {
        /// node HTTP API as name=host:port or host:port, repeatable
        #[clap(long = "node", required = true)]
        nodes: Vec<String>,

        #[clap(long)]
        mempools: bool,

        #[clap(long)]
        timeout_secs: Option<u64>,
    },
    /// Wait until every miner reports ready
    Miners {
        /// miner HTTP API as name=host:port or host:port, repeatable
        #[clap(long = "miner", required = true)]
        miners: Vec<String>,

        #[clap(long)]
        timeout_secs: Option<u64>,
    },
}

/// Split `name=host:port` (or `host:port`, named after itself).
fn parse_target(s: &str) -> Result<(String, String, u16)> {
    let (name, addr) = match s.split_once('=') {
        Some((name, addr)) => (name.to_string(), addr),
        None => (s.to_string(), s),
    };
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected host:port, got '{}'", addr))?;
    let port = port.parse().with_context(|| format!("bad port in '{}'", addr))?;
    Ok((name, host.to_string(), port))
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let cfg = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let convergence = Convergence::new(&cfg.poll);
    let query_timeout = convergence.query_timeout();

    match cli.cmd {
        Cmd::Announce { host, port, listen_ms } => {
            let node = MiniNode::new(Handle::current(), cfg.peer.clone());
            node.on_message(handler_fn(|conn, ev| {
                println!("{} <- {} (id {})", conn.peer_name(), ev.results_case(), ev.id);
            }));
            let conn = node.connect(&host, port, true).await?;
            tokio::time::sleep(Duration::from_millis(listen_ms)).await;

            let stats = conn.stats();
            println!("sent:     {:?}", stats.sent_snapshot());
            println!("received: {:?}", stats.received_snapshot());
            node.disconnect();
            Ok(())
        }
        Cmd::Sync { nodes, mempools, timeout_secs } => {
            let apis = nodes
                .iter()
                .map(|s| {
                    let (name, host, port) = parse_target(s)?;
                    Ok(NodeHttpApi::new(name, &host, port, query_timeout)?)
                })
                .collect::<Result<Vec<_>>>()?;
            let timeout = timeout_secs.map(Duration::from_secs).unwrap_or_else(|| cfg.poll.timeout());
            if mempools {
                convergence.sync_all(&apis, timeout).await?;
            } else {
                convergence.sync_blocks(&apis, timeout).await?;
            }
            info!("{} nodes in sync", apis.len());
            Ok(())
        }
        Cmd::Miners { miners, timeout_secs } => {
            let apis = miners
                .iter()
                .map(|s| {
                    let (name, host, port) = parse_target(s)?;
                    Ok(MinerHttpApi::new(name, &host, port, query_timeout)?)
                })
                .collect::<Result<Vec<_>>>()?;
            let timeout = timeout_secs.map(Duration::from_secs).unwrap_or_else(|| cfg.poll.timeout());
            convergence.sync_miners(&apis, timeout).await?;
            info!("{} miners ready", apis.len());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_bare_targets() {
        let (name, host, port) = parse_target("node0=127.0.0.1:10500").unwrap();
        assert_eq!((name.as_str(), host.as_str(), port), ("node0", "127.0.0.1", 10500));

        let (name, host, port) = parse_target("localhost:8080").unwrap();
        assert_eq!((name.as_str(), host.as_str(), port), ("localhost:8080", "localhost", 8080));

        assert!(parse_target("node0=localhost").is_err());
        assert!(parse_target("localhost:notaport").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
