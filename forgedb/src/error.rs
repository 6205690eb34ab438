use thiserror::Error;

/// The crate-wide result alias. Every public entry point into the engine
/// returns this instead of panicking on malformed input.
pub type CResult<T> = std::result::Result<T, Error>;

/// Error kinds surfaced to the caller, one per category in the error
/// handling design: parse, schema, type, arity, transaction, io,
/// unsupported, plus an internal catch-all for invariant violations
/// that should never actually happen.
#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("arity error: {0}")]
    Arity(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
