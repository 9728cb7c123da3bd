use thiserror::Error;

/// Errors from the durable object store. All of them are recoverable from
/// the caller's point of view: a failed read or write never poisons the
/// store itself.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Errors from the bounded cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller asked for live state of a file that has no live entry.
    /// This is a contract violation on the caller's side ("this file has
    /// been analyzed in this session"), not a condition to default away.
    #[error("no live cache entry for {0}")]
    NotLive(String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
