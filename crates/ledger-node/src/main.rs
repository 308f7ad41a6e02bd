mod config;
mod constants;
mod node;

use clap::Parser;
use config::{Args, NodeConfig};
use node::Node;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = NodeConfig::from_args(args)?;
    info!(
        "starting {} peers, difficulty {}, {} blocks each",
        config.peers, config.chain.difficulty, config.blocks_per_peer
    );

    let node = Node::start(&config).await?;
    tokio::signal::ctrl_c().await?;
    info!("shutting down, indexed blocks per peer: {:?}", node.index_sizes().await);
    node.shutdown().await?;
    info!("bye");
    Ok(())
}
