use crate::constants::{
    DEFAULT_BENEFICIARY, DEFAULT_BLOCKS_PER_PEER, DEFAULT_INTERVAL_SECS, DEFAULT_PEERS, MAX_PEERS,
};
use clap::Parser;
use ledger_core::constants::DIFFICULTY;
use ledger_core::{ChainOptions, ProofOfWork};
use ledger_gossip::GossipConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node", about = "Runs in-process peers that mine and gossip blocks")]
pub struct Args {
    /// Root directory for chains, materialized blocks and the object store
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Leading zero bits required of every block hash
    #[arg(long, default_value_t = DIFFICULTY)]
    pub difficulty: u32,

    /// Number of peers to start
    #[arg(long, default_value_t = DEFAULT_PEERS)]
    pub peers: usize,

    /// Blocks each peer mines after start-up
    #[arg(long, default_value_t = DEFAULT_BLOCKS_PER_PEER)]
    pub blocks: u32,

    /// Seconds between index broadcasts
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval_secs: u64,

    /// Receiver of the coinbase reward in mined blocks
    #[arg(long, default_value = DEFAULT_BENEFICIARY)]
    pub beneficiary: String,

    /// Search nonces on the rayon pool
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("difficulty {0} is outside 1..=256")]
    Difficulty(u32),
    #[error("peer count must be between 1 and 64, got {0}")]
    Peers(usize),
    #[error("broadcast interval must be at least one second")]
    Interval,
    #[error("beneficiary must not be empty")]
    Beneficiary,
}

/// Validated settings for a node run.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub peers: usize,
    pub blocks_per_peer: u32,
    pub beneficiary: String,
    pub chain: ChainOptions,
    pub gossip: GossipConfig,
}

impl NodeConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        ProofOfWork::new(args.difficulty).map_err(|_| ConfigError::Difficulty(args.difficulty))?;
        if args.peers == 0 || args.peers > MAX_PEERS {
            return Err(ConfigError::Peers(args.peers));
        }
        if args.interval_secs == 0 {
            return Err(ConfigError::Interval);
        }
        let beneficiary = args.beneficiary.trim().to_string();
        if beneficiary.is_empty() {
            return Err(ConfigError::Beneficiary);
        }

        Ok(Self {
            data_dir: args.data_dir,
            peers: args.peers,
            blocks_per_peer: args.blocks,
            beneficiary,
            chain: ChainOptions {
                difficulty: args.difficulty,
                parallel_mining: args.parallel,
                ..ChainOptions::default()
            },
            gossip: GossipConfig {
                broadcast_interval: Duration::from_secs(args.interval_secs),
                ..GossipConfig::default()
            },
        })
    }
}
