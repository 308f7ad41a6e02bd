use ledger_core::LedgerError;
use thiserror::Error;

pub type Result<T, E = GossipError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("transport error: {0}")]
    Transport(String),

    /// One index entry could not be fetched; the rest of the batch goes on.
    #[error("failed to fetch {content_hash} from {locator}: {reason}")]
    Fetch {
        content_hash: String,
        locator: String,
        reason: String,
    },

    #[error("content store error: {0}")]
    Content(#[from] std::io::Error),

    #[error("malformed gossip payload: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid gossip configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("gossip task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GossipError {
    pub fn fetch(content_hash: &str, locator: &str, reason: impl ToString) -> Self {
        GossipError::Fetch {
            content_hash: content_hash.to_string(),
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }
}
