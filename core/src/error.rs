//! Error type shared by the weighting model, the ranking engine and snapshot persistence.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankError {
    /// `search`, `transform` or `save` was called before any successful fit or load.
    #[error("index not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The snapshot is readable but structurally inconsistent or tampered with.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RankError>;

impl From<regex::Error> for RankError {
    fn from(err: regex::Error) -> Self {
        RankError::Config(format!("invalid token pattern: {err}"))
    }
}

impl From<walkdir::Error> for RankError {
    fn from(err: walkdir::Error) -> Self {
        RankError::Io(err.into())
    }
}
