use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    // content hash -> locator
    blocks: HashMap<String, String>,
    // hashes claimed by a fetch that has not finished yet
    in_flight: HashSet<String>,
    peers: BTreeSet<String>,
}

/// Locators known locally plus the peers heard from, behind one lock.
///
/// Cloning shares the same state, so the uploader and the gossip channel
/// mutate one mirror.
#[derive(Clone, Debug, Default)]
pub struct LocalIndex {
    inner: Arc<Mutex<State>>,
}

impl LocalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous locator, if the hash was already known.
    pub async fn insert(&self, content_hash: String, locator: String) -> Option<String> {
        let mut state = self.inner.lock().await;
        state.in_flight.remove(&content_hash);
        state.blocks.insert(content_hash, locator)
    }

    pub async fn contains(&self, content_hash: &str) -> bool {
        self.inner.lock().await.blocks.contains_key(content_hash)
    }

    pub async fn locator(&self, content_hash: &str) -> Option<String> {
        self.inner.lock().await.blocks.get(content_hash).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.lock().await.blocks.clone()
    }

    /// Entries of `items` that are neither known nor being fetched, marked
    /// as in flight. Each returned hash must end in [`LocalIndex::insert`] or
    /// [`LocalIndex::release`].
    pub async fn claim_missing(&self, items: HashMap<String, String>) -> Vec<(String, String)> {
        let mut state = self.inner.lock().await;
        let mut claimed = Vec::new();
        for (hash, locator) in items {
            if state.blocks.contains_key(&hash) || !state.in_flight.insert(hash.clone()) {
                continue;
            }
            claimed.push((hash, locator));
        }
        claimed
    }

    /// Drops the in-flight mark of a fetch that failed.
    pub async fn release(&self, content_hash: &str) {
        self.inner.lock().await.in_flight.remove(content_hash);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.blocks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.blocks.is_empty()
    }

    /// Returns true if the peer was not known yet.
    pub async fn add_peer(&self, peer_id: &str) -> bool {
        self.inner.lock().await.peers.insert(peer_id.to_string())
    }

    pub async fn peers(&self) -> Vec<String> {
        self.inner.lock().await.peers.iter().cloned().collect()
    }
}
