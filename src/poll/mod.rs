//! Polling module - generic wait-until plus multi-node convergence checks.

pub mod converge;
pub mod wait;

pub use converge::{Convergence, MinerQuery, NodeQuery, Participant};
pub use wait::{poll, wait_until, Observation, PollLimit, PollOptions, PollTimeoutError};
