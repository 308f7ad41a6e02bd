//! Publish/subscribe abstraction the gossip channel runs on.
//!
//! Identity, discovery and delivery belong to the implementor; the channel
//! only needs a stable local id and topic fan-out.

use crate::error::Result;
use tokio::sync::mpsc::Receiver;

/// A message received on a topic, tagged with the sender's identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicMessage {
    pub sender_id: String,
    pub data: Vec<u8>,
}

pub type Subscription = Receiver<TopicMessage>;

#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Identity of this process on the network.
    fn self_id(&self) -> String;

    /// Publishes `data` to every subscriber of `topic`.
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<()>;

    /// Starts receiving messages published to `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;
}
