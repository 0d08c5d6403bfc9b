//! Error types raised by store implementations.

use thiserror::Error;

/// Errors surfaced by [`super::KeyValueStore`] implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
