use crate::server::ServerMatchError;
use relint_issue_store::{CacheError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("server matching failed: {0}")]
    ServerMatch(#[from] ServerMatchError),

    /// The server response did not mirror the request shape; nothing was
    /// applied.
    #[error("server response shape mismatch: {0}")]
    ResponseShape(String),

    #[error("no tracked finding with id {0}")]
    UnknownFinding(uuid::Uuid),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
