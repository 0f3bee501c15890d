use thiserror::Error;

/// Result type for ledger reads.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger read errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No row matched. Often expected; the caller decides.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound(_))
    }
}
