pub mod sled_store;

use ledger_core::{Chain, ChainOptions, Result};
use sled_store::SledStore;
use std::path::Path;
use std::sync::Arc;

/// Opens (or creates, with a genesis block) the chain stored at `path`.
pub fn open_chain<P: AsRef<Path>>(path: P, options: ChainOptions) -> Result<Chain<SledStore>> {
    let store = Arc::new(SledStore::open(path)?);
    Chain::open(store, options)
}
