//! High-level world runtime orchestrator.
//!
//! The runtime owns the world worker, wires up command/event channels, and
//! exposes a builder-based API for clients to drive the shared world.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use game_core::{Clock, SystemClock};

use crate::api::{Result, RuntimeError, WorldEvent, WorldHandle};
use crate::config::WorldRuntimeConfig;
use crate::persistence::PersistenceLayer;
use crate::repository::{FileStore, InMemoryStore, KeyValueStore};
use crate::workers::{Command, WorldWorker};

/// Local-authority world runtime.
///
/// [`WorldHandle`] provides a cloneable façade for clients.
pub struct WorldRuntime {
    handle: WorldHandle,
    worker: JoinHandle<()>,
}

impl WorldRuntime {
    pub fn builder() -> WorldRuntimeBuilder {
        WorldRuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime.
    pub fn handle(&self) -> WorldHandle {
        self.handle.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorldEvent> {
        self.handle.subscribe()
    }

    /// Stops the worker after a final checkpoint.
    pub async fn shutdown(self) -> Result<()> {
        // The worker may already be gone if every sender was dropped.
        let _ = self.handle.shutdown().await;
        drop(self.handle);

        self.worker.await.map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`WorldRuntime`].
pub struct WorldRuntimeBuilder {
    config: WorldRuntimeConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl WorldRuntimeBuilder {
    fn new() -> Self {
        Self {
            config: WorldRuntimeConfig::default(),
            store: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: WorldRuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `store` instead of the one derived from the configuration.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Spawns the world worker. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<WorldRuntime> {
        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None if self.config.enable_persistence => {
                let dir = self.config.resolved_data_dir();
                tracing::info!(target: "runtime", dir = %dir.display(), "using file store");
                Arc::new(FileStore::new(dir)?)
            }
            None => Arc::new(InMemoryStore::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let (command_tx, command_rx) = mpsc::channel::<Command>(self.config.command_buffer_size);
        let (event_tx, _event_rx) =
            broadcast::channel::<WorldEvent>(self.config.event_buffer_size);

        let handle = WorldHandle::new(command_tx, event_tx.clone());

        let persistence = PersistenceLayer::new(store, clock.clone(), self.config.world.clone());
        let worker = WorldWorker::new(
            persistence,
            clock,
            self.config.tick_interval,
            self.config.checkpoint_every_ticks,
            command_rx,
            event_tx,
        );

        let worker = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(WorldRuntime { handle, worker })
    }
}
