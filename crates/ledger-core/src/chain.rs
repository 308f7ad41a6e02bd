use crate::block::Block;
use crate::constants::{DIFFICULTY, GENESIS_BENEFICIARY, GENESIS_MEMO};
use crate::error::{LedgerError, Result};
use crate::pow::ProofOfWork;
use crate::transaction::Transaction;
use crate::Hash;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Key holding the raw hash of the current tip.
pub const LAST_HASH_KEY: &[u8] = b"lh";
/// Prefix of every block key, followed by the raw block hash.
pub const BLOCK_KEY_PREFIX: &[u8] = b"block-";

pub fn block_key(hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(BLOCK_KEY_PREFIX.len() + hash.len());
    key.extend_from_slice(BLOCK_KEY_PREFIX);
    key.extend_from_slice(hash);
    key
}

/// Trait the storage backends should implement for the chain to operate.
/// This lives in `ledger-core` to avoid a circular dependency.
///
/// Implementations are the only writers of block and tip keys. Both write
/// operations must be all-or-nothing.
pub trait ChainStore: Send + Sync {
    fn last_hash(&self) -> Result<Option<Hash>>;

    /// Raw serialized block stored under [`block_key`].
    fn get_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>>;

    /// Stores the genesis block and the tip, unless a tip already exists.
    /// Returns `false` when the store was already initialised.
    fn init_genesis(&self, hash: &Hash, bytes: &[u8]) -> Result<bool>;

    /// Stores a block and moves the tip from `expected_tip` to `hash` as one
    /// unit. Fails with [`LedgerError::TipMoved`] if the tip is not
    /// `expected_tip` any more.
    fn commit_block(&self, expected_tip: &Hash, hash: &Hash, bytes: &[u8]) -> Result<()>;

    /// Flushes pending writes to durable storage.
    fn flush(&self) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct ChainOptions {
    pub difficulty: u32,
    pub parallel_mining: bool,
    pub genesis_beneficiary: String,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            difficulty: DIFFICULTY,
            parallel_mining: false,
            genesis_beneficiary: GENESIS_BENEFICIARY.to_string(),
        }
    }
}

/// Append-only, hash-linked chain that delegates persistence to a `ChainStore`.
pub struct Chain<S: ChainStore> {
    store: Arc<S>,
    pow: ProofOfWork,
    options: ChainOptions,
    closed: Arc<AtomicBool>,
    // serializes commits so close() waits for an in-flight write
    writer: Mutex<()>,
}

impl<S: ChainStore> Chain<S> {
    pub fn new(store: Arc<S>, options: ChainOptions) -> Result<Self> {
        let pow = ProofOfWork::new(options.difficulty)?;
        Ok(Self {
            store,
            pow,
            options,
            closed: Arc::new(AtomicBool::new(false)),
            writer: Mutex::new(()),
        })
    }

    /// Builds the chain and makes sure a genesis block exists.
    pub fn open(store: Arc<S>, options: ChainOptions) -> Result<Self> {
        let chain = Self::new(store, options)?;
        chain.ensure_genesis()?;
        Ok(chain)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Ensure a genesis block exists. Idempotent.
    pub fn ensure_genesis(&self) -> Result<Hash> {
        self.check_open()?;
        if let Some(tip) = self.store.last_hash()? {
            debug!("existing tip {}", hex::encode(tip));
            return Ok(tip);
        }

        let coinbase = Transaction::coinbase(&self.options.genesis_beneficiary, GENESIS_MEMO)?;
        let genesis = Block::with_pow(vec![coinbase], None, &self.pow);
        let bytes = genesis.serialize()?;

        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.store.init_genesis(genesis.hash(), &bytes)? {
            info!("created genesis block {}", hex::encode(genesis.hash()));
            return Ok(*genesis.hash());
        }
        // someone else initialised the store in the meantime
        self.store
            .last_hash()?
            .ok_or_else(|| LedgerError::integrity(b"", "store initialised without a tip"))
    }

    pub fn tip_hash(&self) -> Result<Hash> {
        self.check_open()?;
        self.store
            .last_hash()?
            .ok_or_else(|| LedgerError::integrity(b"", "chain has no tip"))
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<Block>> {
        self.check_open()?;
        self.store
            .get_block(hash)?
            .map(|bytes| Block::deserialize(&bytes))
            .transpose()
    }

    pub fn append(&self, transactions: Vec<Transaction>) -> Result<Block> {
        self.append_until(transactions, &AtomicBool::new(false))
    }

    /// Mines the next block on top of the current tip and commits it.
    ///
    /// Mining happens outside the writer lock; a raised `cancel` abandons it
    /// with [`LedgerError::Cancelled`] and nothing is written.
    pub fn append_until(
        &self,
        transactions: Vec<Transaction>,
        cancel: &AtomicBool,
    ) -> Result<Block> {
        let tip = self.tip_hash()?;

        let mined = if self.options.parallel_mining {
            Block::mine_parallel(transactions, Some(tip), &self.pow, cancel)
        } else {
            Block::mine(transactions, Some(tip), &self.pow, cancel)
        };
        let block = mined.ok_or(LedgerError::Cancelled)?;
        let bytes = block.serialize()?;

        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.check_open()?;
        self.store.commit_block(&tip, block.hash(), &bytes)?;
        info!(
            "appended block {} on top of {} (nonce {})",
            hex::encode(block.hash()),
            hex::encode(tip),
            block.nonce()
        );
        Ok(block)
    }

    /// Lazily walks from the tip back to genesis.
    pub fn walk_back(&self) -> Result<ChainIter<S>> {
        let tip = self.tip_hash()?;
        Ok(ChainIter {
            store: Arc::clone(&self.store),
            pow: self.pow,
            closed: Arc::clone(&self.closed),
            next: Some(tip),
        })
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for block in self.walk_back()? {
            block?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Waits for an in-flight commit, flushes and marks the chain closed.
    pub fn close(&self) -> Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(LedgerError::UseAfterClose);
        }
        self.store.flush()?;
        info!("chain closed");
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LedgerError::UseAfterClose);
        }
        Ok(())
    }
}

/// Finite, non-restartable walk from the tip to genesis. Stops after the
/// first error.
pub struct ChainIter<S: ChainStore> {
    store: Arc<S>,
    pow: ProofOfWork,
    closed: Arc<AtomicBool>,
    next: Option<Hash>,
}

impl<S: ChainStore> ChainIter<S> {
    fn load(&self, hash: &Hash) -> Result<Block> {
        let bytes = self
            .store
            .get_block(hash)?
            .ok_or_else(|| LedgerError::integrity(hash, "referenced block is missing"))?;
        let block = Block::deserialize(&bytes)
            .map_err(|e| LedgerError::integrity(hash, format!("stored bytes are corrupt: {e}")))?;
        if block.hash() != hash {
            return Err(LedgerError::integrity(
                hash,
                format!("stored block has hash {}", hex::encode(block.hash())),
            ));
        }
        if !block.has_valid_transaction_ids() {
            return Err(LedgerError::integrity(
                hash,
                "transaction id does not match its inputs and outputs",
            ));
        }
        if !block.validate(&self.pow) {
            return Err(LedgerError::integrity(hash, "proof of work does not hold"));
        }
        Ok(block)
    }
}

impl<S: ChainStore> Iterator for ChainIter<S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        if self.closed.load(Ordering::Acquire) {
            return Some(Err(LedgerError::UseAfterClose));
        }
        match self.load(&hash) {
            Ok(block) => {
                self.next = block.prev_hash().copied();
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl<S: ChainStore> FusedIterator for ChainIter<S> {}
