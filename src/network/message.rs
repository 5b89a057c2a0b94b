//! Peer wire messages.
//!
//! Every frame carries one protobuf-encoded [`Event`]. The populated variant of
//! `Event::results` is the message kind; [`ResultsCase`] names it for dispatch and stats.

use crate::utils::{HarnessError, Result};
use bytes::Bytes;
use prost::Message;
use std::fmt;

#[derive(Clone, PartialEq, Message)]
pub struct Event {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(bool, tag = "2")]
    pub acknowledge: bool,
    #[prost(oneof = "event::Results", tags = "10, 11, 12, 13, 14, 15")]
    pub results: Option<event::Results>,
}

pub mod event {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Results {
        #[prost(message, tag = "10")]
        Announce(super::Announce),
        #[prost(message, tag = "11")]
        Heartbeat(super::Heartbeat),
        #[prost(message, tag = "12")]
        AdvertiseBlocks(super::AdvertiseBlocks),
        #[prost(message, tag = "13")]
        AdvertiseTransaction(super::AdvertiseTransaction),
        #[prost(message, tag = "14")]
        LedgerProofRequest(super::LedgerProofRequest),
        #[prost(message, tag = "15")]
        LedgerProofReply(super::LedgerProofReply),
    }
}

/// Identity a peer presents in its announce.
#[derive(Clone, PartialEq, Message)]
pub struct NodeInfo {
    #[prost(string, tag = "1")]
    pub application: String,
    #[prost(int32, tag = "2")]
    pub protocol_version: i32,
    #[prost(string, tag = "3")]
    pub platform: String,
    #[prost(int32, tag = "4")]
    pub start_timestamp: i32,
    #[prost(bool, tag = "5")]
    pub share: bool,
    #[prost(string, tag = "6")]
    pub id: String,
    #[prost(int32, tag = "7")]
    pub port: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Announce {
    #[prost(bool, tag = "1")]
    pub reply: bool,
    #[prost(message, optional, tag = "2")]
    pub node_info: Option<NodeInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BlockHeader {
    #[prost(bytes = "vec", tag = "1")]
    pub header: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Heartbeat {
    #[prost(message, optional, tag = "1")]
    pub block: Option<BlockHeader>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AdvertiseBlocks {
    #[prost(message, repeated, tag = "1")]
    pub headers: Vec<BlockHeader>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TransactionAnnounce {
    #[prost(bytes = "vec", tag = "1")]
    pub tx_id: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AdvertiseTransaction {
    #[prost(message, repeated, tag = "1")]
    pub transactions: Vec<TransactionAnnounce>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LedgerProofRequest {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub addresses: Vec<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum LedgerProofStatus {
    AddressDoesNotExist = 0,
    AddressExists = 1,
    AddressIsInvalid = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct LedgerProofResult {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    #[prost(enumeration = "LedgerProofStatus", tag = "2")]
    pub result: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub ledger_proof_with_context: Vec<u8>,
}

impl LedgerProofResult {
    /// Decoded status; unknown values read as invalid.
    pub fn status(&self) -> LedgerProofStatus {
        LedgerProofStatus::try_from(self.result).unwrap_or(LedgerProofStatus::AddressIsInvalid)
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct LedgerProofReply {
    #[prost(message, repeated, tag = "1")]
    pub proofs: Vec<LedgerProofResult>,
}

/// Which `results` variant an [`Event`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultsCase {
    Announce,
    Heartbeat,
    AdvertiseBlocks,
    AdvertiseTransaction,
    LedgerProofRequest,
    LedgerProofReply,
    ResultsNotSet,
}

impl ResultsCase {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ResultsCase::Announce => "ANNOUNCE",
            ResultsCase::Heartbeat => "HEARTBEAT",
            ResultsCase::AdvertiseBlocks => "ADVERTISE_BLOCKS",
            ResultsCase::AdvertiseTransaction => "ADVERTISE_TRANSACTION",
            ResultsCase::LedgerProofRequest => "LEDGER_PROOF_REQUEST",
            ResultsCase::LedgerProofReply => "LEDGER_PROOF_REPLY",
            ResultsCase::ResultsNotSet => "RESULTS_NOT_SET",
        }
    }
}

impl fmt::Display for ResultsCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

impl Event {
    pub fn results_case(&self) -> ResultsCase {
        use event::Results;
        match &self.results {
            Some(Results::Announce(_)) => ResultsCase::Announce,
            Some(Results::Heartbeat(_)) => ResultsCase::Heartbeat,
            Some(Results::AdvertiseBlocks(_)) => ResultsCase::AdvertiseBlocks,
            Some(Results::AdvertiseTransaction(_)) => ResultsCase::AdvertiseTransaction,
            Some(Results::LedgerProofRequest(_)) => ResultsCase::LedgerProofRequest,
            Some(Results::LedgerProofReply(_)) => ResultsCase::LedgerProofReply,
            None => ResultsCase::ResultsNotSet,
        }
    }

    /// Serialize into a frame payload (no length prefix).
    pub fn to_frame(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }

    /// Parse a frame payload received from `peer`.
    pub fn from_frame(peer: &str, payload: &[u8]) -> Result<Event> {
        Event::decode(payload).map_err(|e| HarnessError::ProtocolDecode {
            peer: peer.to_string(),
            reason: format!("{} ({} bytes)", e, payload.len()),
        })
    }
}

/// Build an event with the given id and payload.
pub fn build_message(id: impl Into<String>, acknowledge: bool, results: event::Results) -> Event {
    Event {
        id: id.into(),
        acknowledge,
        results: Some(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_case_follows_populated_variant() {
        let ev = build_message(
            "7",
            false,
            event::Results::LedgerProofRequest(LedgerProofRequest {
                addresses: vec![b"V1".to_vec()],
            }),
        );
        assert_eq!(ev.results_case(), ResultsCase::LedgerProofRequest);
        assert_eq!(Event::default().results_case(), ResultsCase::ResultsNotSet);
        assert_eq!(ResultsCase::Announce.to_string(), "ANNOUNCE");
    }

    #[test]
    fn frame_payload_decodes_back_to_event() {
        let ev = build_message(
            "1",
            true,
            event::Results::AdvertiseBlocks(AdvertiseBlocks {
                headers: vec![BlockHeader { header: vec![1, 2], hash: vec![3] }],
            }),
        );
        let decoded = Event::from_frame("peer", &ev.to_frame()).unwrap();
        assert_eq!(decoded, ev);
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        // field 10, wire type 2, length 200 with nothing behind it
        let err = Event::from_frame("node0", &[0x52, 0xc8, 0x01]).unwrap_err();
        match err {
            HarnessError::ProtocolDecode { peer, .. } => assert_eq!(peer, "node0"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_ledger_status_reads_as_invalid() {
        let r = LedgerProofResult { address: vec![], result: 42, ledger_proof_with_context: vec![] };
        assert_eq!(r.status(), LedgerProofStatus::AddressIsInvalid);
    }
}
