use std::time::Duration;

pub(crate) const DEFAULT_PEERS: usize = 2;
pub(crate) const DEFAULT_BLOCKS_PER_PEER: u32 = 3;
pub(crate) const DEFAULT_INTERVAL_SECS: u64 = 5;
pub(crate) const DEFAULT_BENEFICIARY: &str = "miner";
pub(crate) const MAX_PEERS: usize = 64;

pub(crate) const OBJECTS_DIR: &str = "objects";
pub(crate) const CHAIN_DIR: &str = "chain";
pub(crate) const BLOCKS_DIR: &str = "blocks";

pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
