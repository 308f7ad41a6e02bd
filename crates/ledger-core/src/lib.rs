//! Proof-of-work blocks, transactions and the hash-linked chain façade.

pub mod block;
pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;
pub mod pow;
pub mod transaction;

use sha2::{Digest, Sha256};

pub use block::Block;
pub use chain::{Chain, ChainIter, ChainOptions, ChainStore};
pub use error::{LedgerError, Result};
pub use pow::ProofOfWork;
pub use transaction::{Input, Output, Transaction};

pub type Hash = [u8; 32];

pub fn sha256(bytes: &[u8]) -> Hash {
    sha256_parts(&[bytes])
}

pub fn sha256_parts(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}
