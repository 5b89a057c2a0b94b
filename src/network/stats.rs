use crate::network::message::ResultsCase;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Per-connection message counters keyed by message kind.
///
/// Received counts are written only by the inbound loop and sent counts only by the
/// outbound loop; the lock makes them readable from test code at any time.
#[derive(Debug, Default)]
pub struct MessageStats {
    received: Mutex<HashMap<ResultsCase, u64>>,
    sent: Mutex<HashMap<ResultsCase, u64>>,
}

impl MessageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, case: ResultsCase) {
        *self.received.lock().entry(case).or_insert(0) += 1;
    }

    pub fn record_sent(&self, case: ResultsCase) {
        *self.sent.lock().entry(case).or_insert(0) += 1;
    }

    pub fn received(&self, case: ResultsCase) -> u64 {
        self.received.lock().get(&case).copied().unwrap_or(0)
    }

    pub fn sent(&self, case: ResultsCase) -> u64 {
        self.sent.lock().get(&case).copied().unwrap_or(0)
    }

    pub fn total_received(&self) -> u64 {
        self.received.lock().values().sum()
    }

    pub fn total_sent(&self) -> u64 {
        self.sent.lock().values().sum()
    }

    /// Received counts by message-type name, e.g. `"ANNOUNCE" -> 1`.
    pub fn received_snapshot(&self) -> HashMap<String, u64> {
        Self::named(&self.received.lock())
    }

    pub fn sent_snapshot(&self) -> HashMap<String, u64> {
        Self::named(&self.sent.lock())
    }

    fn named(map: &HashMap<ResultsCase, u64>) -> HashMap<String, u64> {
        map.iter().map(|(k, v)| (k.as_str_name().to_string(), *v)).collect()
    }
}
