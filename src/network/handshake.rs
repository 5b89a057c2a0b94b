use crate::network::message::{build_message, event, Announce, Event, NodeInfo};
use serde::Deserialize;

/// Identity metadata this client presents to a node on connect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeMetadata {
    pub application: String,
    pub platform: String,
    pub start_timestamp: i32,
    pub id: String,
    /// Advertised listening port. The harness does not listen; nodes only record it.
    pub port: u16,
    pub share: bool,
    /// mainnet, regtest, alphanet use 3; testnet and testnet_progpow use 2
    pub protocol_version: i32,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            application: "popnet-harness".to_string(),
            platform: std::env::consts::OS.to_string(),
            start_timestamp: 1_552_064_237,
            id: format!("harness-{:08x}", rand::random::<u32>()),
            port: 12345,
            share: false,
            protocol_version: 3,
        }
    }
}

impl NodeMetadata {
    pub fn to_proto(&self) -> NodeInfo {
        NodeInfo {
            application: self.application.clone(),
            protocol_version: self.protocol_version,
            platform: self.platform.clone(),
            start_timestamp: self.start_timestamp,
            share: self.share,
            id: self.id.clone(),
            port: i32::from(self.port),
        }
    }
}

/// Create the announce a client sends as its first message.
pub fn create_announce(message_id: String, metadata: &NodeMetadata) -> Event {
    build_message(
        message_id,
        false,
        event::Results::Announce(Announce {
            reply: false,
            node_info: Some(metadata.to_proto()),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::message::ResultsCase;

    #[test]
    fn announce_carries_metadata() {
        let meta = NodeMetadata { id: "Test".into(), port: 7500, ..NodeMetadata::default() };
        let ev = create_announce("1".into(), &meta);
        assert_eq!(ev.id, "1");
        assert_eq!(ev.results_case(), ResultsCase::Announce);
        match ev.results {
            Some(event::Results::Announce(a)) => {
                assert!(!a.reply);
                let info = a.node_info.unwrap();
                assert_eq!(info.id, "Test");
                assert_eq!(info.port, 7500);
                assert_eq!(info.protocol_version, 3);
                assert!(!info.share);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn default_ids_differ_between_instances() {
        // 1 in 2^32 chance of a false failure
        assert_ne!(NodeMetadata::default().id, NodeMetadata::default().id);
    }
}
