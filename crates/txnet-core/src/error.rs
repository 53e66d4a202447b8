use crate::types::Blockchain;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid {blockchain} address format: {address}")]
    InvalidAddress {
        blockchain: Blockchain,
        address: String,
    },

    #[error("unsupported blockchain: {0}")]
    UnsupportedBlockchain(String),

    #[error("chain data source failure: {0}")]
    ChainService(#[from] ChainServiceError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network depth must be between 1 and {max}, got {depth}")]
    InvalidDepth { depth: u32, max: u32 },

    #[error("transaction store failure: {0}")]
    Store(#[from] sqlx::Error),
}

/// Failures talking to a remote chain data service. None of these are
/// retried; the caller sees them as "service unavailable".
#[derive(Debug, thiserror::Error)]
pub enum ChainServiceError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("upstream rejected request: {0}")]
    Remote(String),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ChainServiceError {
    /// Upstream HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::Remote(_) | Self::InvalidResponse(_) => None,
        }
    }
}
