use crate::config::PeerConfig;
use crate::utils::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::info;

/// Dedicated multi-threaded runtime for peer I/O.
///
/// Pass [`PeerRuntime::handle`] to every `MiniNode` that should run its connection tasks
/// here instead of on the caller's runtime. Tests that already run inside tokio usually
/// pass `Handle::current()` instead.
pub struct PeerRuntime {
    runtime: Runtime,
}

impl PeerRuntime {
    pub fn new(cfg: &PeerConfig) -> Result<Self> {
        cfg.validate()?;
        let next_id = AtomicUsize::new(0);
        let runtime = Builder::new_multi_thread()
            .worker_threads(cfg.worker_threads)
            .thread_name_fn(move || format!("peer-io-{}", next_id.fetch_add(1, Ordering::Relaxed)))
            .enable_all()
            .build()?;
        info!("peer runtime started with {} worker threads", cfg.worker_threads);
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Stop every task still running on this runtime, waiting at most `limit`.
    /// Must be called from outside any async context.
    pub fn shutdown(self, limit: Duration) {
        self.runtime.shutdown_timeout(limit);
        info!("peer runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::HarnessError;

    #[test]
    fn zero_worker_threads_is_a_config_error() {
        let cfg = PeerConfig { worker_threads: 0, ..PeerConfig::default() };
        match PeerRuntime::new(&cfg) {
            Err(HarnessError::Config(msg)) => assert!(msg.contains("worker_threads"), "{msg}"),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("runtime built with zero workers"),
        }
    }

    #[test]
    fn worker_threads_are_named() {
        let cfg = PeerConfig { worker_threads: 1, ..PeerConfig::default() };
        let rt = PeerRuntime::new(&cfg).unwrap();
        let name = rt
            .handle()
            .block_on(async { tokio::spawn(async { std::thread::current().name().map(String::from) }).await })
            .unwrap();
        assert!(name.unwrap_or_default().starts_with("peer-io-"));
        rt.shutdown(Duration::from_secs(1));
    }
}
