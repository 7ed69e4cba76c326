use thiserror::Error;

/// Errors while decoding caveat terms.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("terms truncated")]
    Truncated,
    #[error("unexpected trailing bytes")]
    TrailingBytes,
    #[error("packed list length {len} is not a multiple of {width}")]
    Misaligned { len: usize, width: usize },
    #[error("abi decoding failed: {0}")]
    Abi(String),
}

/// Errors while building a delegation. Construction aborts; no partial structure is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Address or selector with the wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Negative, non-finite or unparseable native amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// Out-of-range construction parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
