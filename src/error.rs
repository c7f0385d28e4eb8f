//! Error taxonomy.
//!
//! Transient conditions (rate limits, absent chunks) are variants callers
//! branch on. Bookkeeping violations between loaders, the chunk store and the
//! interest index are not represented here: they panic.

use thiserror::Error;

/// Outcome of a storage provider call other than success.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing has been stored under this key yet.
    #[error("not found in storage")]
    NotExist,
    /// The provider's own limiter refused the request; retry later.
    #[error("storage rate limit reached")]
    RateLimited,
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage codec failed: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_not_exist(&self) -> bool {
        matches!(self, StorageError::NotExist)
    }
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid player profile: {0}")]
    InvalidProfile(String),
}

pub type Result<T, E = WorldError> = std::result::Result<T, E>;
