//! In-memory transport for single-process networks and tests.
//!
//! Routes topic messages through channels without any I/O. Like most
//! pub/sub layers it also hands a publisher its own messages.

use crate::error::{GossipError, Result};
use crate::transport::{Subscription, TopicMessage, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Sender};
use tokio::sync::Mutex;
use tracing::debug;

const SUBSCRIPTION_CAPACITY: usize = 1024;

/// Shared topic registry. Every [`LocalTransport`] joined to the same
/// network sees the others' publications.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    topics: Arc<Mutex<HashMap<String, Vec<Sender<TopicMessage>>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, peer_id: &str) -> LocalTransport {
        LocalTransport {
            peer_id: peer_id.to_string(),
            network: self.clone(),
        }
    }
}

pub struct LocalTransport {
    peer_id: String,
    network: LocalNetwork,
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    fn self_id(&self) -> String {
        self.peer_id.clone()
    }

    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<()> {
        let subscribers = {
            let mut topics = self.network.topics.lock().await;
            let Some(subscribers) = topics.get_mut(topic) else {
                return Ok(());
            };
            subscribers.retain(|tx| !tx.is_closed());
            subscribers.clone()
        };

        let message = TopicMessage {
            sender_id: self.peer_id.clone(),
            data,
        };
        let mut delivered = 0usize;
        for tx in subscribers {
            // a receiver dropped since the snapshot just misses this one
            if tx.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        debug!("{} published to {} ({} subscribers)", self.peer_id, topic, delivered);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        if topic.is_empty() {
            return Err(GossipError::Transport("empty topic name".into()));
        }
        let (tx, rx) = channel(SUBSCRIPTION_CAPACITY);
        self.network
            .topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
