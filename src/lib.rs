mod cli;
pub mod db;
pub mod error;
pub mod settings;
pub mod stats;
pub mod store;
pub mod tracker;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;

use db::Database;
use stats::StatsAggregator;
use store::{MemoryStore, SharedStore};
use tracker::SessionTracker;

pub use db::{Interruption, SessionKey, WorkSession};
pub use error::{TrackerError, TrackerResult};

/// Which session store backs an [`AppState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// SQLite file; survives restarts.
    Durable(PathBuf),
    /// Process memory; gone when the state is dropped.
    Ephemeral,
}

#[derive(Clone)]
pub struct AppState {
    pub tracker: SessionTracker,
    pub stats: StatsAggregator,
}

impl AppState {
    pub fn open(backend: Backend) -> anyhow::Result<Self> {
        let store: SharedStore = match backend {
            Backend::Durable(path) => Arc::new(Database::new(path)?),
            Backend::Ephemeral => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_store(store))
    }

    pub fn with_store(store: SharedStore) -> Self {
        Self {
            tracker: SessionTracker::new(store.clone()),
            stats: StatsAggregator::new(store),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    // Defaults to warn; RUST_LOG overrides.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    cli::execute(cli::Args::parse()).await
}
