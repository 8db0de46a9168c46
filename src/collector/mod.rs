use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::core::config::CollectorConfig;
use crate::core::Result;
use crate::events::Event;
use crate::fetcher::{EventsFetcher, FetchState};
use crate::store::EventStore;

// Key for the global feed's conditional-request state.
const GLOBAL_FEED: &str = "";

/// Drives the fetcher on demand or on a schedule and hands results to the
/// store in one batch per collection.
///
/// Owns its own conditional-request state per endpoint; live monitors keep
/// theirs separately.
pub struct IngestionCoordinator {
    fetcher: EventsFetcher,
    store: Arc<EventStore>,
    config: CollectorConfig,
    states: Mutex<HashMap<String, FetchState>>,
    collect_lock: Mutex<()>,
}

impl IngestionCoordinator {
    pub fn new(fetcher: EventsFetcher, store: Arc<EventStore>, config: CollectorConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
            states: Mutex::new(HashMap::new()),
            collect_lock: Mutex::new(()),
        }
    }

    /// Collect once and return the number of newly stored events.
    ///
    /// `repos` overrides the configured target list; an empty target list
    /// means the global feed. Single-flight per process: a concurrent call is
    /// coalesced to a no-op returning 0.
    pub async fn collect_now(
        &self,
        limit: Option<usize>,
        repos: Option<&[String]>,
    ) -> Result<usize> {
        let _guard = match self.collect_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Collection already in flight, coalescing to no-op");
                return Ok(0);
            }
        };

        let limit = limit.or(self.config.max_events_per_fetch);
        let targets: Vec<String> = repos
            .map(|r| r.to_vec())
            .unwrap_or_else(|| self.config.target_repositories.clone());

        let mut states = self.states.lock().await;
        let mut batch: Vec<Event> = Vec::new();
        if targets.is_empty() {
            let state = states.entry(GLOBAL_FEED.to_string()).or_default();
            batch.extend(self.fetcher.fetch_global(state, limit).await.events);
        } else {
            for repo in &targets {
                let state = states.entry(repo.clone()).or_default();
                batch.extend(self.fetcher.fetch_repo(repo, state, limit).await.events);
            }
        }
        drop(states);

        let inserted = self.store.insert_many(&batch)?;
        info!("Collected {} events, {} newly stored", batch.len(), inserted);
        Ok(inserted)
    }

    /// Configured base cadence for scheduled ingestion.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_seconds)
    }

    // Longest poll interval any polled endpoint has suggested so far.
    async fn suggested_poll(&self) -> Option<Duration> {
        let states = self.states.lock().await;
        states.values().filter_map(|s| s.suggested_poll).max()
    }

    /// Run scheduled ingestion until the owning task is dropped.
    ///
    /// Each tick waits `max(configured, server-suggested)`. A store failure
    /// is logged and ingestion pauses until the next tick.
    pub async fn run_periodic(&self) {
        let configured = self.poll_interval();
        info!(
            "Starting periodic ingestion every {}s",
            configured.as_secs()
        );
        loop {
            let suggested = self.suggested_poll().await.unwrap_or_default();
            tokio::time::sleep(configured.max(suggested)).await;
            match self.collect_now(None, None).await {
                Ok(inserted) => debug!("Scheduled collection stored {} events", inserted),
                Err(e) => error!("Scheduled collection failed: {}", e),
            }
        }
    }
}
