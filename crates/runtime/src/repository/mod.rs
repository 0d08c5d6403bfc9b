//! Storage layer for dynamic world data.
//!
//! Everything the runtime persists goes through the [`KeyValueStore`]
//! contract so the world logic can run against an in-memory fake in tests
//! and against the file system in the binary.

mod error;
mod file;
mod memory;
mod traits;

pub use error::{RepositoryError, Result};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use traits::KeyValueStore;
