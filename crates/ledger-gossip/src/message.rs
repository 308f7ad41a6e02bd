use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Blocks,
    RequestPeers,
    NewPeer,
    /// Any type this node does not understand; ignored on receipt.
    #[serde(other)]
    Unknown,
}

/// Envelope published on the gossip topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub peer_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub data: String,
}

/// Content hash -> locator. Carried JSON-encoded in `WireMessage::data`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndexRecord {
    #[serde(default)]
    pub items: HashMap<String, String>,
}

impl WireMessage {
    pub fn blocks(peer_id: &str, record: &BlockIndexRecord) -> Result<Self> {
        Ok(Self {
            peer_id: peer_id.to_string(),
            kind: MessageKind::Blocks,
            data: serde_json::to_string(record)?,
        })
    }

    pub fn request_peers(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            kind: MessageKind::RequestPeers,
            data: String::new(),
        }
    }

    pub fn new_peer(peer_id: &str, announced: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            kind: MessageKind::NewPeer,
            data: announced.to_string(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn block_index(&self) -> Result<BlockIndexRecord> {
        Ok(serde_json::from_str(&self.data)?)
    }
}
