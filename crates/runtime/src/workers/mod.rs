//! Worker tasks that back the runtime orchestration.

mod world;

pub use world::{Command, WorldWorker};
