//! Unified error type surfaced by the world runtime API.
//!
//! Wraps channel failures and the domain errors returned by the worker so
//! clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use game_core::{CombatError, RegistryError};

pub use crate::persistence::PersistenceError;
pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("world worker command channel closed")]
    CommandChannelClosed,

    #[error("world worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("world worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Combat(#[from] CombatError),
}
