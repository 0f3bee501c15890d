use thiserror::Error;

/// Result type for parsing and decoding model values.
pub type TypesResult<T> = Result<T, TypesError>;

/// Errors raised while building model values from external input.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid bundle file name: {0}")]
    InvalidBundleName(String),

    #[error("unknown proposal status: {0}")]
    UnknownStatus(String),

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}
