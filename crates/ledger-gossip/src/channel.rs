use crate::content::BlockFetcher;
use crate::error::{GossipError, Result};
use crate::index::LocalIndex;
use crate::message::{BlockIndexRecord, MessageKind, WireMessage};
use crate::transport::{Subscription, TopicMessage, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_TOPIC: &str = "blocks";
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct GossipConfig {
    pub topic: String,
    pub broadcast_interval: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
        }
    }
}

impl GossipConfig {
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(GossipError::Config("topic must not be empty".into()));
        }
        if self.broadcast_interval.is_zero() {
            return Err(GossipError::Config("broadcast interval must be positive".into()));
        }
        Ok(())
    }
}

/// Advertises the local block index on a topic and pulls whatever peers
/// advertise that is missing locally.
///
/// After [`BlockChannel::join`] two tasks run until shutdown: a timer-driven
/// broadcaster and a message-driven receiver.
pub struct BlockChannel<T: Transport, F: BlockFetcher> {
    transport: Arc<T>,
    fetcher: Arc<F>,
    index: LocalIndex,
    config: GossipConfig,
    self_id: String,
}

impl<T: Transport, F: BlockFetcher> BlockChannel<T, F> {
    pub fn new(
        transport: Arc<T>,
        fetcher: Arc<F>,
        index: LocalIndex,
        config: GossipConfig,
    ) -> Result<Self> {
        config.validate()?;
        let self_id = transport.self_id();
        Ok(Self {
            transport,
            fetcher,
            index,
            config,
            self_id,
        })
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn index(&self) -> &LocalIndex {
        &self.index
    }

    /// Subscribes to the topic, asks for peers and spawns both duties.
    pub async fn join(self: Arc<Self>) -> Result<GossipHandle> {
        let subscription = self.transport.subscribe(&self.config.topic).await?;
        info!("{} joined topic {}", self.self_id, self.config.topic);

        if let Err(e) = self.request_peers().await {
            warn!("peer request failed: {}", e);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let broadcaster = tokio::spawn(Arc::clone(&self).run_broadcaster(shutdown_rx.clone()));
        let receiver = tokio::spawn(Arc::clone(&self).run_receiver(subscription, shutdown_rx));
        Ok(GossipHandle {
            shutdown,
            tasks: vec![broadcaster, receiver],
        })
    }

    /// Publishes the full local index once. Returns the number of entries sent.
    pub async fn broadcast_once(&self) -> Result<usize> {
        let record = BlockIndexRecord {
            items: self.index.snapshot().await,
        };
        let count = record.items.len();
        let message = WireMessage::blocks(&self.self_id, &record)?;
        self.transport
            .publish(&self.config.topic, message.to_bytes()?)
            .await?;
        debug!("{} broadcast {} blocks", self.self_id, count);
        Ok(count)
    }

    pub async fn request_peers(&self) -> Result<()> {
        let message = WireMessage::request_peers(&self.self_id);
        self.transport
            .publish(&self.config.topic, message.to_bytes()?)
            .await
    }

    /// Processes one topic message. Returns how many new blocks were fetched.
    ///
    /// A failed fetch is logged and skipped; the remaining entries are still
    /// processed and the failed one is retried on a later broadcast. Hashes
    /// are claimed under the index lock, so concurrent calls never fetch the
    /// same hash twice.
    pub async fn handle_message(&self, message: TopicMessage) -> Result<usize> {
        if message.sender_id == self.self_id {
            debug!("ignoring self message");
            return Ok(0);
        }
        let wire = WireMessage::from_bytes(&message.data)?;
        if wire.peer_id == self.self_id {
            debug!("ignoring message carrying our own id");
            return Ok(0);
        }
        if self.index.add_peer(&wire.peer_id).await {
            info!("{} discovered peer {}", self.self_id, wire.peer_id);
        }

        match wire.kind {
            MessageKind::Blocks => self.handle_blocks(&wire).await,
            MessageKind::RequestPeers => {
                self.send_peers(&wire.peer_id).await?;
                Ok(0)
            }
            MessageKind::NewPeer => {
                if !wire.data.is_empty()
                    && wire.data != self.self_id
                    && self.index.add_peer(&wire.data).await
                {
                    info!("{} learned about peer {}", self.self_id, wire.data);
                }
                Ok(0)
            }
            MessageKind::Unknown => {
                debug!("ignoring message of unknown type from {}", wire.peer_id);
                Ok(0)
            }
        }
    }

    async fn handle_blocks(&self, wire: &WireMessage) -> Result<usize> {
        let record = wire.block_index()?;
        debug!("{} received {} blocks from {}", self.self_id, record.items.len(), wire.peer_id);

        let mut fetched = 0;
        for (content_hash, locator) in self.index.claim_missing(record.items).await {
            match self.fetcher.fetch(&content_hash, &locator).await {
                Ok(()) => {
                    self.index.insert(content_hash, locator).await;
                    fetched += 1;
                }
                Err(e) => {
                    self.index.release(&content_hash).await;
                    warn!("skipping block {}: {}", content_hash, e);
                }
            }
        }
        Ok(fetched)
    }

    async fn send_peers(&self, requester: &str) -> Result<()> {
        for peer in self.index.peers().await {
            if peer == requester {
                continue;
            }
            let message = WireMessage::new_peer(&self.self_id, &peer);
            self.transport
                .publish(&self.config.topic, message.to_bytes()?)
                .await?;
        }
        Ok(())
    }

    async fn run_broadcaster(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.broadcast_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.broadcast_once().await {
                        warn!("broadcast failed: {}", e);
                    }
                }
            }
        }
        debug!("{} broadcaster stopped", self.self_id);
    }

    async fn run_receiver(
        self: Arc<Self>,
        mut subscription: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                next = subscription.recv() => match next {
                    Some(message) => {
                        if let Err(e) = self.handle_message(message).await {
                            warn!("dropping gossip message: {}", e);
                        }
                    }
                    None => {
                        warn!("{} subscription closed", self.self_id);
                        break;
                    }
                },
            }
        }
        debug!("{} receiver stopped", self.self_id);
    }
}

/// Running gossip duties. Dropping the handle without calling
/// [`GossipHandle::shutdown`] also stops them.
pub struct GossipHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl GossipHandle {
    pub async fn shutdown(self) -> Result<()> {
        // receivers may already be gone if a task ended on its own
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            task.await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_example() {
        let config = GossipConfig::default();
        assert_eq!(config.topic, "blocks");
        assert_eq!(config.broadcast_interval, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let empty_topic = GossipConfig {
            topic: " ".into(),
            ..GossipConfig::default()
        };
        assert!(matches!(empty_topic.validate(), Err(GossipError::Config(_))));
        let zero = GossipConfig {
            broadcast_interval: Duration::ZERO,
            ..GossipConfig::default()
        };
        assert!(matches!(zero.validate(), Err(GossipError::Config(_))));
    }
}
