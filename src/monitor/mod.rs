use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{Error, Result};
use crate::events::{EventKind, EventSummary};
use crate::fetcher::{EventsFetcher, FetchState, FetchStatus};

/// Upper bound on buffered summaries per monitor.
pub const MONITOR_BUFFER_CAP: usize = 1000;

const MIN_POLL: Duration = Duration::from_secs(5);
const ERROR_POLL: Duration = Duration::from_secs(10);
const LIST_PREVIEW: usize = 5;

/// Metadata for one active monitor, as returned by `list`.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorInfo {
    pub id: Uuid,
    pub repo: String,
    pub kinds: Vec<EventKind>,
    pub interval_seconds: u64,
    pub buffer_size: usize,
    pub started_at: DateTime<Utc>,
    pub recent: Vec<EventSummary>,
}

struct MonitorHandle {
    repo: String,
    kinds: HashSet<EventKind>,
    interval: Duration,
    started_at: DateTime<Utc>,
    buffer: Arc<RwLock<VecDeque<EventSummary>>>,
    task: JoinHandle<()>,
}

/// Process-local registry of per-repository polling workers.
///
/// Each worker owns its buffer and conditional-request state; workers never
/// touch the event store or each other.
pub struct MonitorRegistry {
    fetcher: EventsFetcher,
    monitors: RwLock<HashMap<Uuid, MonitorHandle>>,
}

impl MonitorRegistry {
    pub fn new(fetcher: EventsFetcher) -> Self {
        Self {
            fetcher,
            monitors: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn a polling worker for `repo` and return its id.
    pub async fn start(
        &self,
        repo: &str,
        kinds: HashSet<EventKind>,
        interval: Duration,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let buffer = Arc::new(RwLock::new(VecDeque::new()));
        let worker = MonitorWorker {
            fetcher: self.fetcher.clone(),
            repo: repo.to_string(),
            kinds: kinds.clone(),
            interval: interval.max(MIN_POLL),
            buffer: buffer.clone(),
        };
        let task = tokio::spawn(worker.run());

        let handle = MonitorHandle {
            repo: repo.to_string(),
            kinds,
            interval,
            started_at: Utc::now(),
            buffer,
            task,
        };
        self.monitors.write().await.insert(id, handle);
        info!("Started monitor {} for {}", id, repo);
        id
    }

    /// Cancel a worker and drop its record.
    pub async fn stop(&self, id: Uuid) -> Result<()> {
        let mut monitors = self.monitors.write().await;
        let handle = monitors.remove(&id).ok_or(Error::MonitorNotFound(id))?;
        handle.task.abort();
        info!("Stopped monitor {} for {}", id, handle.repo);
        Ok(())
    }

    /// Stop every worker; used on shutdown.
    pub async fn stop_all(&self) {
        let mut monitors = self.monitors.write().await;
        for (id, handle) in monitors.drain() {
            handle.task.abort();
            debug!("Stopped monitor {} for {}", id, handle.repo);
        }
    }

    /// Describe every active monitor with up to five recent summaries each.
    pub async fn list(&self) -> Vec<MonitorInfo> {
        let monitors = self.monitors.read().await;
        let mut infos = Vec::with_capacity(monitors.len());
        for (id, handle) in monitors.iter() {
            let buffer = handle.buffer.read().await;
            let mut kinds: Vec<EventKind> = handle.kinds.iter().copied().collect();
            kinds.sort();
            infos.push(MonitorInfo {
                id: *id,
                repo: handle.repo.clone(),
                kinds,
                interval_seconds: handle.interval.as_secs(),
                buffer_size: buffer.len(),
                started_at: handle.started_at,
                recent: buffer.iter().take(LIST_PREVIEW).cloned().collect(),
            });
        }
        infos.sort_by_key(|info| info.started_at);
        infos
    }

    /// The most recent `limit` buffered summaries, newest first.
    pub async fn get_events(&self, id: Uuid, limit: usize) -> Result<Vec<EventSummary>> {
        let monitors = self.monitors.read().await;
        let handle = monitors.get(&id).ok_or(Error::MonitorNotFound(id))?;
        let limit = limit.clamp(1, MONITOR_BUFFER_CAP);
        let buffer = handle.buffer.read().await;
        Ok(buffer.iter().take(limit).cloned().collect())
    }

    /// The full buffer grouped by kind.
    pub async fn get_grouped(&self, id: Uuid) -> Result<BTreeMap<EventKind, Vec<EventSummary>>> {
        let monitors = self.monitors.read().await;
        let handle = monitors.get(&id).ok_or(Error::MonitorNotFound(id))?;
        let buffer = handle.buffer.read().await;
        let mut grouped: BTreeMap<EventKind, Vec<EventSummary>> = BTreeMap::new();
        for summary in buffer.iter() {
            grouped.entry(summary.kind).or_default().push(summary.clone());
        }
        Ok(grouped)
    }
}

struct MonitorWorker {
    fetcher: EventsFetcher,
    repo: String,
    kinds: HashSet<EventKind>,
    interval: Duration,
    buffer: Arc<RwLock<VecDeque<EventSummary>>>,
}

impl MonitorWorker {
    async fn run(self) {
        let mut state = FetchState::default();
        loop {
            let outcome = self.fetcher.fetch_repo(&self.repo, &mut state, None).await;
            let wait = match outcome.status {
                FetchStatus::Fresh => {
                    let mut buffer = self.buffer.write().await;
                    for event in &outcome.events {
                        if self.kinds.contains(&event.kind) {
                            buffer.push_front(EventSummary::from(event));
                        }
                    }
                    buffer.truncate(MONITOR_BUFFER_CAP);
                    self.interval
                }
                FetchStatus::NotModified | FetchStatus::RateLimited { .. } => self.interval,
                FetchStatus::Failed => self.interval.max(ERROR_POLL),
            };
            tokio::time::sleep(wait).await;
        }
    }
}
