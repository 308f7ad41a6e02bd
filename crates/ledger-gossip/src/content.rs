use crate::error::{GossipError, Result};
use crate::index::LocalIndex;
use ledger_core::constants::HASH_HEX_SIZE;
use ledger_core::{sha256, Block, ProofOfWork};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Content-addressable object store holding block payloads.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Stores the file at `local_path` and returns its locator.
    async fn put(&self, local_path: &Path) -> Result<String>;

    /// Writes the object named by `locator` to `local_path`.
    async fn get(&self, locator: &str, local_path: &Path) -> Result<()>;
}

/// Invoked by the gossip channel for every advertised entry it lacks.
#[async_trait::async_trait]
pub trait BlockFetcher: Send + Sync + 'static {
    async fn fetch(&self, content_hash: &str, locator: &str) -> Result<()>;
}

/// Directory-backed store: the locator is the hex SHA-256 of the content.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, local_path: &Path) -> Result<String> {
        let bytes = fs::read(local_path).await?;
        let locator = hex::encode(sha256(&bytes));
        let target = self.root.join(&locator);
        if fs::try_exists(&target).await? {
            debug!("object {} already stored", locator);
        } else {
            fs::write(&target, &bytes).await?;
        }
        Ok(locator)
    }

    async fn get(&self, locator: &str, local_path: &Path) -> Result<()> {
        // locators arrive from the network and become file names
        if !is_hex_hash(locator) {
            return Err(GossipError::fetch("", locator, "locator is not a sha-256 hex digest"));
        }
        let bytes = fs::read(self.root.join(locator)).await?;
        if hex::encode(sha256(&bytes)) != locator {
            return Err(GossipError::fetch("", locator, "stored object does not match its locator"));
        }
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(local_path, &bytes).await?;
        Ok(())
    }
}

/// Fetch-and-materialize: pulls the object into `<blocks_dir>/<content_hash>`
/// and keeps it only if it decodes to a valid block with that hash.
pub struct MaterializingFetcher<C: ContentStore> {
    store: Arc<C>,
    blocks_dir: PathBuf,
    pow: ProofOfWork,
}

impl<C: ContentStore> MaterializingFetcher<C> {
    pub fn new(store: Arc<C>, blocks_dir: impl Into<PathBuf>, pow: ProofOfWork) -> Self {
        Self {
            store,
            blocks_dir: blocks_dir.into(),
            pow,
        }
    }

    async fn verify(&self, content_hash: &str, path: &Path) -> std::result::Result<(), String> {
        let bytes = fs::read(path).await.map_err(|e| e.to_string())?;
        let block = Block::deserialize(&bytes).map_err(|e| e.to_string())?;
        if hex::encode(block.hash()) != content_hash {
            return Err(format!("payload is block {}", hex::encode(block.hash())));
        }
        if !block.has_valid_transaction_ids() {
            return Err("transaction id does not match its inputs and outputs".to_string());
        }
        if !block.validate(&self.pow) {
            return Err("proof of work does not hold".to_string());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: ContentStore> BlockFetcher for MaterializingFetcher<C> {
    async fn fetch(&self, content_hash: &str, locator: &str) -> Result<()> {
        if !is_hex_hash(content_hash) {
            let reason = "content hash is not a sha-256 hex digest";
            return Err(GossipError::fetch(content_hash, locator, reason));
        }
        let path = self.blocks_dir.join(content_hash);
        self.store
            .get(locator, &path)
            .await
            .map_err(|e| GossipError::fetch(content_hash, locator, e))?;

        if let Err(reason) = self.verify(content_hash, &path).await {
            if let Err(e) = fs::remove_file(&path).await {
                warn!("could not remove rejected block {}: {}", path.display(), e);
            }
            return Err(GossipError::fetch(content_hash, locator, reason));
        }
        info!("downloaded block {} from {}", content_hash, locator);
        Ok(())
    }
}

/// Publishes local blocks into the content store and the shared index.
pub struct Uploader<C: ContentStore> {
    store: Arc<C>,
    index: LocalIndex,
    blocks_dir: PathBuf,
}

impl<C: ContentStore> Uploader<C> {
    pub fn new(store: Arc<C>, index: LocalIndex, blocks_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            index,
            blocks_dir: blocks_dir.into(),
        }
    }

    /// Writes the block to `<blocks_dir>/<hex hash>`, stores it and registers
    /// the locator. Returns the locator.
    pub async fn upload_block(&self, block: &Block) -> Result<String> {
        let content_hash = hex::encode(block.hash());
        fs::create_dir_all(&self.blocks_dir).await?;
        let path = self.blocks_dir.join(&content_hash);
        fs::write(&path, block.serialize()?).await?;

        let locator = self.store.put(&path).await?;
        self.index.insert(content_hash.clone(), locator.clone()).await;
        info!("added block {} with locator {}", content_hash, locator);
        Ok(locator)
    }
}

fn is_hex_hash(s: &str) -> bool {
    s.len() == HASH_HEX_SIZE && s.bytes().all(|b| b.is_ascii_hexdigit())
}
