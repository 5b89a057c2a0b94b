use crate::poll::PollTimeoutError;
use thiserror::Error;

/// Unified error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Could not establish or keep a peer connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation attempted on a client with no live connection.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// Inbound bytes were not a valid peer message. Always fatal to the connection.
    #[error("protocol decode error from {peer}: {reason}")]
    ProtocolDecode { peer: String, reason: String },

    #[error("outbound queue to {peer} is full ({capacity} messages pending)")]
    QueueOverflow { peer: String, capacity: usize },

    #[error(transparent)]
    PollTimeout(#[from] Box<PollTimeoutError>),

    /// A convergence participant kept failing to answer.
    #[error("{check}: observing {participant} failed {failures} times in a row: {reason}")]
    ObservationFailed {
        check: String,
        participant: String,
        failures: u32,
        reason: String,
    },

    #[error("api error from {endpoint}: {reason}")]
    Api { endpoint: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("node control error: {0}")]
    Node(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn api(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        HarnessError::Api {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that end a wait because its budget ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::PollTimeout(_))
    }
}

impl From<PollTimeoutError> for HarnessError {
    fn from(e: PollTimeoutError) -> Self {
        HarnessError::PollTimeout(Box::new(e))
    }
}

/// Convenience alias
pub type Result<T> = std::result::Result<T, HarnessError>;
