use ledger_core::chain::{block_key, ChainStore, LAST_HASH_KEY};
use ledger_core::{Hash, LedgerError, Result};
use sled::transaction::{
  ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Db, IVec};
use std::path::Path;
use tracing::{debug, info};

/// `ChainStore` over a single sled tree.
///
/// Layout: `"lh"` holds the raw tip hash, `"block-" || hash` holds the
/// serialized block. Both keys are written inside one sled transaction.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path.as_ref()).map_err(LedgerError::store)?;
    info!("sled store opened at {}", path.as_ref().display());
    Ok(Self { db })
  }

  fn flush_db(&self) -> Result<()> {
    let bytes = self.db.flush().map_err(LedgerError::store)?;
    debug!("flushed {} bytes", bytes);
    Ok(())
  }
}

impl ChainStore for SledStore {
  fn last_hash(&self) -> Result<Option<Hash>> {
    self
      .db
      .get(LAST_HASH_KEY)
      .map_err(LedgerError::store)?
      .map(to_hash)
      .transpose()
  }

  fn get_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
    let opt = self.db.get(block_key(hash)).map_err(LedgerError::store)?;
    Ok(opt.map(|ivec: IVec| ivec.to_vec()))
  }

  fn init_genesis(&self, hash: &Hash, bytes: &[u8]) -> Result<bool> {
    let key = block_key(hash);
    let created = self
      .db
      .transaction(|tx| -> ConflictableTransactionResult<bool, LedgerError> {
        if tx.get(LAST_HASH_KEY)?.is_some() {
          return Ok(false);
        }
        tx.insert(key.as_slice(), bytes)?;
        tx.insert(LAST_HASH_KEY, &hash[..])?;
        Ok(true)
      })
      .map_err(from_tx)?;
    self.flush_db()?;
    Ok(created)
  }

  fn commit_block(&self, expected_tip: &Hash, hash: &Hash, bytes: &[u8]) -> Result<()> {
    let key = block_key(hash);
    self
      .db
      .transaction(|tx| -> ConflictableTransactionResult<(), LedgerError> {
        let found = tx.get(LAST_HASH_KEY)?;
        if found.as_deref() != Some(&expected_tip[..]) {
          return Err(ConflictableTransactionError::Abort(LedgerError::TipMoved {
            expected: hex::encode(expected_tip),
            found: found.as_deref().map(hex::encode).unwrap_or_default(),
          }));
        }
        tx.insert(key.as_slice(), bytes)?;
        tx.insert(LAST_HASH_KEY, &hash[..])?;
        Ok(())
      })
      .map_err(from_tx)?;

    self.flush_db()
  }

  fn flush(&self) -> Result<()> {
    self.flush_db()
  }
}

fn to_hash(v: IVec) -> Result<Hash> {
  if v.len() != 32 {
    return Err(LedgerError::integrity(
      &v,
      format!("tip record has {} bytes", v.len()),
    ));
  }
  let mut arr = [0u8; 32];
  arr.copy_from_slice(&v);
  Ok(arr)
}

fn from_tx(err: TransactionError<LedgerError>) -> LedgerError {
  match err {
    TransactionError::Abort(e) => e,
    TransactionError::Storage(e) => LedgerError::store(e),
  }
}
