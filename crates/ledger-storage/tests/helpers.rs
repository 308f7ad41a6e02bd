#![allow(dead_code)]

use ledger_core::{Chain, ChainOptions, Output, Transaction};
use ledger_storage::open_chain;
use ledger_storage::sled_store::SledStore;
use rand::Rng;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

pub const TEST_DIFFICULTY: u32 = 8;

pub fn create_temp_dir() -> (TempDir, PathBuf) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("chain");
    (temp_dir, db_path)
}

pub fn test_options() -> ChainOptions {
    ChainOptions {
        difficulty: TEST_DIFFICULTY,
        ..ChainOptions::default()
    }
}

pub fn open_test_chain(path: &Path) -> Chain<SledStore> {
    open_chain(path, test_options()).expect("Failed to open chain")
}

pub fn payment(to: &str) -> Transaction {
    let mut rng = rand::thread_rng();
    Transaction::new(
        vec![],
        vec![Output {
            value: rng.gen_range(1..1_000),
            lock_key: to.to_string(),
        }],
    )
    .expect("Failed to build transaction")
}

/// Overwrites the first occurrence of `from` with the same-length `to`.
pub fn rewrite_bytes(bytes: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    assert_eq!(from.len(), to.len(), "rewrite must keep the length");
    let at = bytes
        .windows(from.len())
        .position(|w| w == from)
        .expect("pattern present");
    let mut out = bytes.to_vec();
    out[at..at + to.len()].copy_from_slice(to);
    out
}
