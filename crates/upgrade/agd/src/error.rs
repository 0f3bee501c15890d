use thiserror::Error;
use upgrade_types::TxAbbr;

/// Result type for chain command operations.
pub type AgdResult<T> = Result<T, AgdError>;

/// Errors from invoking chain tools or decoding their output.
#[derive(Debug, Error)]
pub enum AgdError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status:?}: {stderr}")]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("transaction {action} rejected: {tx}")]
    TxRejected { action: String, tx: TxAbbr },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("missing field: {0}")]
    Missing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
