use crate::collector::IngestionCoordinator;
use crate::core::Config;
use crate::fetcher::EventsFetcher;
use crate::metrics::QueryEngine;
use crate::monitor::MonitorRegistry;
use crate::store::EventStore;
use anyhow::Result;
use std::sync::Arc;

/// Shared state handed to every API handler.
///
/// The coordinator and the monitor registry each get their own fetcher clone
/// and keep their own conditional-request state; they share nothing mutable.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<EventStore>,
    pub engine: QueryEngine,
    pub coordinator: Arc<IngestionCoordinator>,
    pub monitors: Arc<MonitorRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(EventStore::open(&config.storage.database_path)?);
        let fetcher = EventsFetcher::new(&config.github)?;
        let engine = QueryEngine::new(store.clone());
        let coordinator = Arc::new(IngestionCoordinator::new(
            fetcher.clone(),
            store.clone(),
            config.collector.clone(),
        ));
        let monitors = Arc::new(MonitorRegistry::new(fetcher));

        Ok(Self {
            config,
            store,
            engine,
            coordinator,
            monitors,
        })
    }
}
