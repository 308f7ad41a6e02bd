pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const HASH_BITS: u32 = (HASH_SIZE * BYTE) as u32;

/// Leading zero bits a block hash needs unless configured otherwise.
pub const DIFFICULTY: u32 = 12;
/// Reward carried by every coinbase output.
pub const SUBSIDY: u64 = 100;
/// Sentinel `output_index` of a coinbase input.
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

pub const GENESIS_BENEFICIARY: &str = "genesis";
pub const GENESIS_MEMO: &str = "First Transaction from Genesis";

/// Upper bound for a decoded block, guards against corrupt length prefixes.
pub const MAX_BLOCK_BYTES: u64 = 16 * 1024 * 1024;

/// How many nonces the sequential miner tries between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;
