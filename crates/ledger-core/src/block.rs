use crate::constants::MAX_BLOCK_BYTES;
use crate::error::{LedgerError, Result};
use crate::mine::mine_parallel;
use crate::pow::ProofOfWork;
use crate::transaction::Transaction;
use crate::{sha256, Hash};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicBool;

/// A mined, immutable block. `hash` and `nonce` are fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    prev_hash: Option<Hash>,
    transactions: Vec<Transaction>,
    nonce: u64,
    hash: Hash,
}

impl Block {
    /// Mines a block at the default difficulty.
    pub fn new(transactions: Vec<Transaction>, prev_hash: Option<Hash>) -> Self {
        Self::with_pow(transactions, prev_hash, &ProofOfWork::default())
    }

    pub fn with_pow(
        transactions: Vec<Transaction>,
        prev_hash: Option<Hash>,
        pow: &ProofOfWork,
    ) -> Self {
        let payload = Self::payload(prev_hash.as_ref(), &transactions);
        let (nonce, hash) = pow.mine(&payload);
        Self {
            prev_hash,
            transactions,
            nonce,
            hash,
        }
    }

    /// Mines against `pow`, returning `None` if `cancel` is raised first.
    pub fn mine(
        transactions: Vec<Transaction>,
        prev_hash: Option<Hash>,
        pow: &ProofOfWork,
        cancel: &AtomicBool,
    ) -> Option<Self> {
        let payload = Self::payload(prev_hash.as_ref(), &transactions);
        let (nonce, hash) = pow.mine_until(&payload, cancel)?;
        Some(Self {
            prev_hash,
            transactions,
            nonce,
            hash,
        })
    }

    /// Same result as [`Block::mine`], searched on the rayon pool.
    pub fn mine_parallel(
        transactions: Vec<Transaction>,
        prev_hash: Option<Hash>,
        pow: &ProofOfWork,
        cancel: &AtomicBool,
    ) -> Option<Self> {
        let payload = Self::payload(prev_hash.as_ref(), &transactions);
        let (nonce, hash) = mine_parallel(pow, &payload, cancel)?;
        Some(Self {
            prev_hash,
            transactions,
            nonce,
            hash,
        })
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn prev_hash(&self) -> Option<&Hash> {
        self.prev_hash.as_ref()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Digest of the concatenated transaction ids.
    pub fn hash_transactions(&self) -> Hash {
        transactions_digest(&self.transactions)
    }

    /// Recomputes every transaction id and the proof of work for the stored
    /// nonce. The proof of work only commits to the ids.
    pub fn validate(&self, pow: &ProofOfWork) -> bool {
        if !self.has_valid_transaction_ids() {
            return false;
        }
        let payload = Self::payload(self.prev_hash.as_ref(), &self.transactions);
        pow.validate(&payload, self.nonce, &self.hash)
    }

    pub fn has_valid_transaction_ids(&self) -> bool {
        self.transactions.iter().all(Transaction::has_valid_id)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        codec().serialize(self).map_err(|e| LedgerError::Encode {
            what: "block",
            reason: e.to_string(),
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        codec().deserialize(bytes).map_err(|e| LedgerError::Decode {
            what: "block",
            reason: e.to_string(),
        })
    }

    /// `prev_hash || transactions_digest`; the genesis parent is empty.
    fn payload(prev_hash: Option<&Hash>, transactions: &[Transaction]) -> Vec<u8> {
        let digest = transactions_digest(transactions);
        let prev: &[u8] = prev_hash.map(|h| &h[..]).unwrap_or(&[]);
        let mut bytes = Vec::with_capacity(prev.len() + digest.len());
        bytes.extend_from_slice(prev);
        bytes.extend_from_slice(&digest);
        bytes
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hash:      {}", hex::encode(self.hash))?;
        match &self.prev_hash {
            Some(prev) => writeln!(f, "Prev hash: {}", hex::encode(prev))?,
            None => writeln!(f, "Prev hash: (genesis)")?,
        }
        writeln!(f, "Nonce:     {}", self.nonce)?;
        for tx in &self.transactions {
            write!(f, "{tx}")?;
        }
        Ok(())
    }
}

pub fn transactions_digest(transactions: &[Transaction]) -> Hash {
    let mut ids = Vec::with_capacity(transactions.len() * 32);
    for tx in transactions {
        ids.extend_from_slice(tx.id());
    }
    sha256(&ids)
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .with_limit(MAX_BLOCK_BYTES)
}
