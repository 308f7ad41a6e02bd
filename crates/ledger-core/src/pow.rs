use crate::constants::{BYTE, CANCEL_CHECK_INTERVAL, DIFFICULTY, HASH_BITS, HASH_SIZE};
use crate::error::{LedgerError, Result};
use crate::{sha256_parts, Hash};
use std::sync::atomic::{AtomicBool, Ordering};

/// Hashcash-style proof of work over SHA-256.
///
/// A digest is valid when, read as a big-endian integer, it is strictly less
/// than `1 << (256 - difficulty)`, i.e. it has at least `difficulty` leading
/// zero bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
    target: Hash,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<Self> {
        if difficulty == 0 || difficulty > HASH_BITS {
            return Err(LedgerError::Config(format!(
                "difficulty must be within 1..={HASH_BITS}, got {difficulty}"
            )));
        }
        Ok(Self {
            difficulty,
            target: target_for(difficulty),
        })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target(&self) -> &Hash {
        &self.target
    }

    /// `sha256(payload || be(nonce) || be(difficulty))`
    pub fn digest(&self, payload: &[u8], nonce: u64) -> Hash {
        sha256_parts(&[
            payload,
            &nonce.to_be_bytes(),
            &u64::from(self.difficulty).to_be_bytes(),
        ])
    }

    /// Byte-wise comparison of two equal-length arrays is the big-endian
    /// integer comparison.
    pub fn meets_target(&self, hash: &Hash) -> bool {
        hash < &self.target
    }

    /// Search nonces from zero until one satisfies the target. Unbounded.
    pub fn mine(&self, payload: &[u8]) -> (u64, Hash) {
        let mut nonce = 0u64;
        loop {
            let hash = self.digest(payload, nonce);
            if self.meets_target(&hash) {
                return (nonce, hash);
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    /// Like [`ProofOfWork::mine`] but gives up once `cancel` is raised.
    pub fn mine_until(&self, payload: &[u8], cancel: &AtomicBool) -> Option<(u64, Hash)> {
        let mut nonce = 0u64;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return None;
            }
            let hash = self.digest(payload, nonce);
            if self.meets_target(&hash) {
                return Some((nonce, hash));
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    /// Recomputes the digest; a stored hash is never trusted on its own.
    pub fn validate(&self, payload: &[u8], nonce: u64, claimed: &Hash) -> bool {
        let hash = self.digest(payload, nonce);
        &hash == claimed && self.meets_target(&hash)
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self {
            difficulty: DIFFICULTY,
            target: target_for(DIFFICULTY),
        }
    }
}

fn target_for(difficulty: u32) -> Hash {
    let shift = (HASH_BITS - difficulty) as usize;
    let mut target = [0u8; HASH_SIZE];
    target[HASH_SIZE - 1 - shift / BYTE] = 1 << (shift % BYTE);
    target
}

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}
