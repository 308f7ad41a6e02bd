#![allow(dead_code)]

use ledger_core::{Block, ProofOfWork, Transaction};
use ledger_gossip::{
    BlockChannel, BlockFetcher, BlockIndexRecord, FsContentStore, GossipConfig, GossipError,
    LocalIndex, LocalNetwork, LocalTransport, MaterializingFetcher, TopicMessage, Uploader,
    WireMessage,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_DIFFICULTY: u32 = 8;

pub fn pow() -> ProofOfWork {
    ProofOfWork::new(TEST_DIFFICULTY).expect("valid difficulty")
}

pub fn sample_block(memo: &str) -> Block {
    let tx = Transaction::coinbase("alice", memo).expect("coinbase");
    Block::mine(vec![tx], None, &pow(), &AtomicBool::new(false)).expect("not cancelled")
}

/// Records every fetch; fails for the hashes it was told to.
#[derive(Default)]
pub struct CountingFetcher {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    delay: Duration,
}

impl CountingFetcher {
    pub fn failing_on(hashes: &[&str]) -> Self {
        Self {
            failing: hashes.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Every fetch takes `delay` before it completes.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls_for(&self, content_hash: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.as_str() == content_hash)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl BlockFetcher for CountingFetcher {
    async fn fetch(&self, content_hash: &str, locator: &str) -> Result<(), GossipError> {
        self.calls.lock().unwrap().push(content_hash.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(content_hash) {
            return Err(GossipError::fetch(content_hash, locator, "object unavailable"));
        }
        Ok(())
    }
}

pub fn counting_channel(
    network: &LocalNetwork,
    id: &str,
    fetcher: Arc<CountingFetcher>,
) -> Arc<BlockChannel<LocalTransport, CountingFetcher>> {
    Arc::new(
        BlockChannel::new(
            Arc::new(network.join(id)),
            fetcher,
            LocalIndex::new(),
            GossipConfig::default(),
        )
        .expect("valid config"),
    )
}

pub fn blocks_message(sender: &str, items: &[(&str, &str)]) -> TopicMessage {
    let record = BlockIndexRecord {
        items: items
            .iter()
            .map(|(h, l)| (h.to_string(), l.to_string()))
            .collect::<HashMap<_, _>>(),
    };
    TopicMessage {
        sender_id: sender.to_string(),
        data: WireMessage::blocks(sender, &record)
            .and_then(|m| m.to_bytes())
            .expect("encode"),
    }
}

pub struct Peer {
    pub channel: Arc<BlockChannel<LocalTransport, MaterializingFetcher<FsContentStore>>>,
    pub uploader: Uploader<FsContentStore>,
    pub index: LocalIndex,
}

/// A peer with its own blocks directory, sharing `store` with the others.
pub fn materializing_peer(
    network: &LocalNetwork,
    store: &Arc<FsContentStore>,
    root: &Path,
    id: &str,
    interval: Duration,
) -> Peer {
    let index = LocalIndex::new();
    let blocks_dir = root.join(id).join("blocks");
    let fetcher = Arc::new(MaterializingFetcher::new(
        Arc::clone(store),
        &blocks_dir,
        pow(),
    ));
    let config = GossipConfig {
        broadcast_interval: interval,
        ..GossipConfig::default()
    };
    let channel = Arc::new(
        BlockChannel::new(Arc::new(network.join(id)), fetcher, index.clone(), config)
            .expect("valid config"),
    );
    let uploader = Uploader::new(Arc::clone(store), index.clone(), &blocks_dir);
    Peer {
        channel,
        uploader,
        index,
    }
}

/// Polls until `index` holds `expected` entries or the deadline passes.
pub async fn wait_for_len(index: &LocalIndex, expected: usize, deadline: Duration) -> bool {
    tokio::time::timeout(deadline, async {
        while index.len().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
