//! Harness configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid configuration:
//!
//! ```toml
//! [peer]
//! worker_threads = 4
//! queue_capacity = 1100
//! overflow = "fail"          # or "drop"
//! connect_attempts = 3
//!
//! [peer.identity]
//! application = "popnet-harness"
//! protocol_version = 3
//!
//! [poll]
//! timeout_ms = 60000
//! interval_ms = 1000
//! query_timeout_ms = 800
//! ```

use crate::network::handshake::NodeMetadata;
use crate::utils::{HarnessError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// What `send` does when the outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Return `HarnessError::QueueOverflow` to the caller.
    #[default]
    Fail,
    /// Log a warning and discard the message.
    Drop,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Worker threads of a dedicated `PeerRuntime`.
    pub worker_threads: usize,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
    pub connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// A partially received frame that makes no progress for this long is malformed.
    pub frame_read_timeout_ms: u64,
    pub max_frame_length: usize,
    pub identity: NodeMetadata,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            queue_capacity: 1100,
            overflow: OverflowPolicy::Fail,
            connect_attempts: 3,
            connect_retry_delay_ms: 500,
            connect_timeout_ms: 2_000,
            frame_read_timeout_ms: 5_000,
            max_frame_length: 16 * 1024 * 1024,
            identity: NodeMetadata::default(),
        }
    }
}

impl PeerConfig {
    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn frame_read_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_read_timeout_ms)
    }

    /// Reject values that would stall or panic the connection machinery.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(HarnessError::Config("peer.queue_capacity must be > 0".into()));
        }
        if self.worker_threads == 0 {
            return Err(HarnessError::Config("peer.worker_threads must be > 0".into()));
        }
        if self.connect_attempts == 0 {
            return Err(HarnessError::Config("peer.connect_attempts must be > 0".into()));
        }
        if self.max_frame_length == 0 {
            return Err(HarnessError::Config("peer.max_frame_length must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub timeout_ms: u64,
    pub interval_ms: u64,
    /// Bound on every node query a convergence check makes. Must be below `interval_ms`.
    pub query_timeout_ms: u64,
    pub max_consecutive_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            interval_ms: 1_000,
            query_timeout_ms: 800,
            max_consecutive_failures: 5,
        }
    }
}

impl PollConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    pub peer: PeerConfig,
    pub poll: PollConfig,
}

impl HarnessConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let cfg: HarnessConfig =
            toml::from_str(data).map_err(|e| HarnessError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.peer.validate()?;
        self.poll.validate()
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(HarnessError::Config("poll.interval_ms must be > 0".into()));
        }
        if self.query_timeout_ms >= self.interval_ms {
            return Err(HarnessError::Config(format!(
                "poll.query_timeout_ms ({}) must be shorter than poll.interval_ms ({})",
                self.query_timeout_ms, self.interval_ms
            )));
        }
        if self.max_consecutive_failures == 0 {
            return Err(HarnessError::Config(
                "poll.max_consecutive_failures must be > 0".into(),
            ));
        }
        Ok(())
    }
}
