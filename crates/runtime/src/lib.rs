//! Local-authority world runtime.
//!
//! This crate wires the shard registry from `game-core` to storage and a
//! background worker. Consumers embed [`WorldRuntime`] and talk to the world
//! through the cloneable [`WorldHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`persistence`] caches shards and writes snapshots through to storage
//! - [`repository`] provides the key-value storage backends
//! - `workers` keeps the background task internal to the crate
pub mod api;
pub mod config;
pub mod persistence;
pub mod repository;
pub mod runtime;

mod workers;

pub use api::{CheckpointReport, Result, RuntimeError, WorldEvent, WorldHandle};
pub use config::WorldRuntimeConfig;
pub use persistence::{DeltaBundle, PersistenceError, PersistenceLayer, storage_key};
pub use repository::{FileStore, InMemoryStore, KeyValueStore, RepositoryError};
pub use runtime::{WorldRuntime, WorldRuntimeBuilder};
