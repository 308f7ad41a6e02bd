use thiserror::Error;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Boxed error coming out of a `ChainStore` backend.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// The hash chain is broken: a referenced block is missing or does not
    /// match the key it is stored under.
    #[error("chain integrity violated at block {hash}: {reason}")]
    Integrity { hash: String, reason: String },

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The tip changed between reading it and committing the next block.
    #[error("tip moved during append: expected {expected}, found {found}")]
    TipMoved { expected: String, found: String },

    #[error("mining cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("chain store used after close")]
    UseAfterClose,
}

impl LedgerError {
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LedgerError::Store(Box::new(err))
    }

    pub fn integrity(hash: impl AsRef<[u8]>, reason: impl Into<String>) -> Self {
        LedgerError::Integrity {
            hash: hex::encode(hash),
            reason: reason.into(),
        }
    }

    /// True for errors after which the chain must not be trusted any more.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::Integrity { .. } | LedgerError::UseAfterClose
        )
    }
}
