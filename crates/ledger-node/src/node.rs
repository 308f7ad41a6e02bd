use crate::config::NodeConfig;
use crate::constants::{BLOCKS_DIR, CHAIN_DIR, OBJECTS_DIR, SHUTDOWN_GRACE};
use anyhow::{Context, Result};
use ledger_core::{Block, Chain, LedgerError, Transaction};
use ledger_gossip::{
    BlockChannel, FsContentStore, GossipHandle, LocalIndex, LocalNetwork, LocalTransport,
    MaterializingFetcher, Uploader,
};
use ledger_storage::open_chain;
use ledger_storage::sled_store::SledStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

type PeerChannel = BlockChannel<LocalTransport, MaterializingFetcher<FsContentStore>>;

struct Peer {
    id: String,
    chain: Arc<Chain<SledStore>>,
    index: LocalIndex,
    gossip: GossipHandle,
    miner: JoinHandle<Result<u32>>,
}

/// A set of in-process peers sharing one network and one object store.
pub struct Node {
    peers: Vec<Peer>,
    cancel: Arc<AtomicBool>,
}

impl Node {
    pub async fn start(config: &NodeConfig) -> Result<Self> {
        let store = Arc::new(
            FsContentStore::open(config.data_dir.join(OBJECTS_DIR))
                .await
                .context("opening object store")?,
        );
        let network = LocalNetwork::new();
        let cancel = Arc::new(AtomicBool::new(false));

        let mut peers = Vec::with_capacity(config.peers);
        for n in 0..config.peers {
            let id = format!("peer-{n}");
            let peer = start_peer(config, &id, &network, &store, &cancel)
                .await
                .with_context(|| format!("starting {id}"))?;
            peers.push(peer);
        }
        info!("started {} peers in {}", peers.len(), config.data_dir.display());
        Ok(Self { peers, cancel })
    }

    /// Size of each peer's block index, in start order.
    pub async fn index_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.peers.len());
        for peer in &self.peers {
            sizes.push(peer.index.len().await);
        }
        sizes
    }

    /// Cancels mining, stops gossip, then closes every chain.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.store(true, Ordering::Release);

        for peer in &self.peers {
            info!("{} has {} blocks indexed", peer.id, peer.index.len().await);
        }
        for peer in self.peers {
            match tokio::time::timeout(SHUTDOWN_GRACE, peer.miner).await {
                Ok(Ok(Ok(mined))) => info!("{} mined {} blocks", peer.id, mined),
                Ok(Ok(Err(e))) => error!("{} miner failed: {:#}", peer.id, e),
                Ok(Err(e)) => error!("{} miner panicked: {}", peer.id, e),
                Err(_) => warn!("{} miner did not stop in time", peer.id),
            }
            if let Err(e) = peer.gossip.shutdown().await {
                warn!("{} gossip shutdown: {}", peer.id, e);
            }
            let chain = peer.chain;
            tokio::task::spawn_blocking(move || chain.close())
                .await?
                .with_context(|| format!("closing chain of {}", peer.id))?;
        }
        Ok(())
    }
}

async fn start_peer(
    config: &NodeConfig,
    id: &str,
    network: &LocalNetwork,
    store: &Arc<FsContentStore>,
    cancel: &Arc<AtomicBool>,
) -> Result<Peer> {
    let root = config.data_dir.join(id);
    let chain_path = root.join(CHAIN_DIR);
    let options = config.chain.clone();
    let chain = tokio::task::spawn_blocking(move || open_chain(chain_path, options)).await??;
    let chain = Arc::new(chain);

    let blocks_dir = root.join(BLOCKS_DIR);
    let index = LocalIndex::new();
    let uploader = Arc::new(Uploader::new(Arc::clone(store), index.clone(), &blocks_dir));
    publish_existing(&chain, &uploader).await?;

    let fetcher = MaterializingFetcher::new(Arc::clone(store), &blocks_dir, *chain.pow());
    let channel: Arc<PeerChannel> = Arc::new(BlockChannel::new(
        Arc::new(network.join(id)),
        Arc::new(fetcher),
        index.clone(),
        config.gossip.clone(),
    )?);
    let gossip = channel.join().await?;

    let miner = tokio::spawn(mine_blocks(
        id.to_string(),
        Arc::clone(&chain),
        uploader,
        config.beneficiary.clone(),
        config.blocks_per_peer,
        Arc::clone(cancel),
    ));

    Ok(Peer {
        id: id.to_string(),
        chain,
        index,
        gossip,
        miner,
    })
}

/// Uploads every block already on the chain so peers can fetch it.
async fn publish_existing(
    chain: &Arc<Chain<SledStore>>,
    uploader: &Uploader<FsContentStore>,
) -> Result<()> {
    let walker = Arc::clone(chain);
    let blocks = tokio::task::spawn_blocking(move || {
        walker.walk_back()?.collect::<std::result::Result<Vec<Block>, LedgerError>>()
    })
    .await??;
    for block in blocks.iter().rev() {
        uploader.upload_block(block).await?;
    }
    Ok(())
}

async fn mine_blocks(
    id: String,
    chain: Arc<Chain<SledStore>>,
    uploader: Arc<Uploader<FsContentStore>>,
    beneficiary: String,
    count: u32,
    cancel: Arc<AtomicBool>,
) -> Result<u32> {
    let mut mined = 0;
    while mined < count {
        let memo = format!("{id} block {mined}");
        let to = beneficiary.clone();
        let (chain, cancel) = (Arc::clone(&chain), Arc::clone(&cancel));
        let appended = tokio::task::spawn_blocking(move || {
            let coinbase = Transaction::coinbase(&to, &memo)?;
            chain.append_until(vec![coinbase], &cancel)
        })
        .await?;

        match appended {
            Ok(block) => {
                uploader.upload_block(&block).await?;
                mined += 1;
            }
            Err(LedgerError::Cancelled) | Err(LedgerError::UseAfterClose) => {
                info!("{} stopped mining", id);
                break;
            }
            Err(e) => return Err(e).context("appending block"),
        }
    }
    Ok(mined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use clap::Parser;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config(dir: &Path, peers: &str, blocks: &str) -> NodeConfig {
        let args = Args::try_parse_from([
            "ledger-node",
            "--data-dir",
            dir.to_str().unwrap(),
            "--difficulty",
            "8",
            "--peers",
            peers,
            "--blocks",
            blocks,
            "--interval-secs",
            "1",
        ])
        .unwrap();
        NodeConfig::from_args(args).unwrap()
    }

    async fn wait_for(node: &Node, expected: usize) -> bool {
        tokio::time::timeout(Duration::from_secs(20), async {
            while node.index_sizes().await.iter().any(|&n| n != expected) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn peers_mine_and_converge() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), "2", "2");
        let node = Node::start(&config).await.unwrap();

        // shared genesis plus two blocks from each peer
        assert!(wait_for(&node, 5).await);
        node.shutdown().await.unwrap();

        for id in ["peer-0", "peer-1"] {
            let path = dir.path().join(id).join(CHAIN_DIR);
            let chain = open_chain(path, config.chain.clone()).unwrap();
            assert_eq!(chain.len().unwrap(), 3);
            chain.close().unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restart_republishes_persisted_blocks() {
        let dir = tempdir().unwrap();
        let first = test_config(dir.path(), "1", "2");
        let node = Node::start(&first).await.unwrap();
        assert!(wait_for(&node, 3).await);
        node.shutdown().await.unwrap();

        let second = test_config(dir.path(), "1", "0");
        let node = Node::start(&second).await.unwrap();
        assert_eq!(node.index_sizes().await, vec![3]);
        node.shutdown().await.unwrap();
    }
}
