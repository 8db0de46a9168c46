use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::{Error, Result};
use crate::events::{Event, EventKind, MONITORED_KINDS};

/// Per-kind activity slice returned by repository queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindActivity {
    pub count: u64,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
}

/// One entry in the trending list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingRepo {
    pub repo: String,
    pub total: u64,
    pub counts: BTreeMap<EventKind, u64>,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
}

/// One half-open `[start, end)` bucket of a time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub counts: BTreeMap<EventKind, u64>,
}

/// Zero counts for every monitored kind.
pub fn zero_filled_counts() -> BTreeMap<EventKind, u64> {
    MONITORED_KINDS.iter().map(|k| (*k, 0)).collect()
}

/// Append-only SQLite store of event records, keyed by event id.
///
/// One writer connection is kept open behind a mutex; each read opens its
/// own short-lived connection and never queues behind an insert batch. The
/// database runs in WAL mode.
pub struct EventStore {
    path: PathBuf,
    writer: Mutex<Connection>,
}

impl EventStore {
    /// Open (creating if needed) the store at `path` and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::StoreUnavailable(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self {
            path,
            writer: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("Event store ready at {}", store.path.display());
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.writer();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                repo TEXT NOT NULL,
                actor TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                payload TEXT NOT NULL,
                collected_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_kind ON events(kind);
            CREATE INDEX IF NOT EXISTS idx_events_repo ON events(repo);
            CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);
            CREATE INDEX IF NOT EXISTS idx_events_repo_kind_created
                ON events(repo, kind, created_at);",
        )?;
        Ok(())
    }

    fn writer(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().expect("event store writer lock poisoned")
    }

    fn read_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Insert a batch of events, returning how many were newly stored.
    ///
    /// Duplicate ids are ignored and do not count; re-running the same batch
    /// inserts nothing.
    pub fn insert_many(&self, events: &[Event]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let collected_at = Utc::now().timestamp();
        let mut conn = self.writer();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO events
                 (id, kind, repo, actor, created_at, payload, collected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for event in events {
                let payload = serde_json::to_string(&event.payload)?;
                inserted += stmt.execute(params![
                    event.id,
                    event.kind.as_str(),
                    event.repo,
                    event.actor,
                    event.created_at.timestamp(),
                    payload,
                    collected_at,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Stored {} new events out of {}", inserted, events.len());
        Ok(inserted)
    }

    /// Total number of stored events.
    pub fn total_events(&self) -> Result<u64> {
        let conn = self.read_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Count events per kind, optionally restricted to a window start and a repo.
    ///
    /// Only kinds actually present appear in the result; callers wanting the
    /// full zero-filled kind set overlay this onto [`zero_filled_counts`].
    pub fn count_by_kind(
        &self,
        since: Option<i64>,
        repo: Option<&str>,
    ) -> Result<BTreeMap<EventKind, u64>> {
        let conn = self.read_conn()?;
        let mut counts = BTreeMap::new();
        match (since, repo) {
            (Some(since), Some(repo)) => {
                let mut stmt = conn.prepare(
                    "SELECT kind, COUNT(*) FROM events
                     WHERE created_at >= ?1 AND repo = ?2 GROUP BY kind",
                )?;
                collect_kind_counts(&mut stmt.query(params![since, repo])?, &mut counts)?;
            }
            (Some(since), None) => {
                let mut stmt = conn.prepare(
                    "SELECT kind, COUNT(*) FROM events WHERE created_at >= ?1 GROUP BY kind",
                )?;
                collect_kind_counts(&mut stmt.query(params![since])?, &mut counts)?;
            }
            (None, Some(repo)) => {
                let mut stmt = conn.prepare(
                    "SELECT kind, COUNT(*) FROM events WHERE repo = ?1 GROUP BY kind",
                )?;
                collect_kind_counts(&mut stmt.query(params![repo])?, &mut counts)?;
            }
            (None, None) => {
                let mut stmt =
                    conn.prepare("SELECT kind, COUNT(*) FROM events GROUP BY kind")?;
                collect_kind_counts(&mut stmt.query([])?, &mut counts)?;
            }
        }
        Ok(counts)
    }

    /// Count one kind in a window, optionally filtered by repo and payload action.
    pub fn count_kind(
        &self,
        kind: EventKind,
        since: i64,
        repo: Option<&str>,
        action: Option<&str>,
    ) -> Result<u64> {
        let conn = self.read_conn()?;
        let count: i64 = match (repo, action) {
            (Some(repo), Some(action)) => conn.query_row(
                "SELECT COUNT(*) FROM events
                 WHERE created_at >= ?1 AND repo = ?2 AND kind = ?3
                   AND json_extract(payload, '$.action') = ?4",
                params![since, repo, kind.as_str(), action],
                |row| row.get(0),
            )?,
            (Some(repo), None) => conn.query_row(
                "SELECT COUNT(*) FROM events
                 WHERE created_at >= ?1 AND repo = ?2 AND kind = ?3",
                params![since, repo, kind.as_str()],
                |row| row.get(0),
            )?,
            (None, Some(action)) => conn.query_row(
                "SELECT COUNT(*) FROM events
                 WHERE created_at >= ?1 AND kind = ?2
                   AND json_extract(payload, '$.action') = ?3",
                params![since, kind.as_str(), action],
                |row| row.get(0),
            )?,
            (None, None) => conn.query_row(
                "SELECT COUNT(*) FROM events WHERE created_at >= ?1 AND kind = ?2",
                params![since, kind.as_str()],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    /// Sum the `payload.size` of push events in a window (total commits pushed).
    pub fn sum_push_commits(&self, since: i64, repo: Option<&str>) -> Result<u64> {
        let conn = self.read_conn()?;
        let total: i64 = match repo {
            Some(repo) => conn.query_row(
                "SELECT COALESCE(SUM(CAST(json_extract(payload, '$.size') AS INTEGER)), 0)
                 FROM events
                 WHERE created_at >= ?1 AND repo = ?2 AND kind = 'PushEvent'",
                params![since, repo],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COALESCE(SUM(CAST(json_extract(payload, '$.size') AS INTEGER)), 0)
                 FROM events
                 WHERE created_at >= ?1 AND kind = 'PushEvent'",
                params![since],
                |row| row.get(0),
            )?,
        };
        Ok(total.max(0) as u64)
    }

    /// Unix timestamps of pull requests opened in a repo, ascending.
    pub fn pr_opened_timestamps(&self, repo: &str) -> Result<Vec<i64>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT created_at FROM events
             WHERE repo = ?1 AND kind = 'PullRequestEvent'
               AND json_extract(payload, '$.action') = 'opened'
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![repo], |row| row.get::<_, i64>(0))?;
        let mut timestamps = Vec::new();
        for ts in rows {
            timestamps.push(ts?);
        }
        Ok(timestamps)
    }

    /// Seconds from earliest open to earliest merge-close, per PR number.
    ///
    /// Only PRs opened inside the window count; negative durations are
    /// excluded.
    pub fn pr_merge_durations(&self, repo: &str, since: i64) -> Result<Vec<i64>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "WITH opens AS (
                SELECT CAST(json_extract(payload, '$.pull_request.number') AS INTEGER) AS pr_num,
                       MIN(created_at) AS opened_ts
                FROM events
                WHERE repo = ?1
                  AND kind = 'PullRequestEvent'
                  AND created_at >= ?2
                  AND json_extract(payload, '$.action') = 'opened'
                GROUP BY pr_num
            ), merges AS (
                SELECT CAST(json_extract(payload, '$.pull_request.number') AS INTEGER) AS pr_num,
                       MIN(created_at) AS merged_ts
                FROM events
                WHERE repo = ?1
                  AND kind = 'PullRequestEvent'
                  AND json_extract(payload, '$.action') = 'closed'
                  AND json_extract(payload, '$.pull_request.merged') = 1
                GROUP BY pr_num
            )
            SELECT m.merged_ts - o.opened_ts AS seconds
            FROM opens o
            JOIN merges m ON m.pr_num = o.pr_num
            WHERE m.merged_ts >= o.opened_ts",
        )?;
        let rows = stmt.query_map(params![repo, since], |row| row.get::<_, i64>(0))?;
        let mut durations = Vec::new();
        for seconds in rows {
            durations.push(seconds?);
        }
        Ok(durations)
    }

    /// Seconds from issue open to first issue comment, per issue number.
    pub fn issue_first_response_durations(&self, repo: &str, since: i64) -> Result<Vec<i64>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "WITH openings AS (
                SELECT CAST(json_extract(payload, '$.issue.number') AS INTEGER) AS issue_num,
                       MIN(created_at) AS opened_ts
                FROM events
                WHERE repo = ?1
                  AND kind = 'IssuesEvent'
                  AND created_at >= ?2
                  AND json_extract(payload, '$.action') = 'opened'
                GROUP BY issue_num
            ), first_comments AS (
                SELECT CAST(json_extract(payload, '$.issue.number') AS INTEGER) AS issue_num,
                       MIN(created_at) AS first_comment_ts
                FROM events
                WHERE repo = ?1
                  AND kind = 'IssueCommentEvent'
                GROUP BY issue_num
            )
            SELECT c.first_comment_ts - o.opened_ts AS seconds
            FROM openings o
            JOIN first_comments c ON c.issue_num = o.issue_num
            WHERE c.first_comment_ts >= o.opened_ts",
        )?;
        let rows = stmt.query_map(params![repo, since], |row| row.get::<_, i64>(0))?;
        let mut durations = Vec::new();
        for seconds in rows {
            durations.push(seconds?);
        }
        Ok(durations)
    }

    /// Per-kind activity for a repo in a window, with the windowed total and a
    /// flag set when the empty window fell back to the all-time aggregation.
    pub fn repo_activity(
        &self,
        repo: &str,
        since: i64,
    ) -> Result<(BTreeMap<EventKind, KindActivity>, u64, bool)> {
        let windowed = self.repo_activity_query(repo, Some(since))?;
        let total: u64 = windowed.values().map(|a| a.count).sum();
        if total > 0 {
            return Ok((windowed, total, false));
        }
        let alltime = self.repo_activity_query(repo, None)?;
        let alltime_total: u64 = alltime.values().map(|a| a.count).sum();
        let fell_back = alltime_total > 0;
        Ok((alltime, alltime_total, fell_back))
    }

    fn repo_activity_query(
        &self,
        repo: &str,
        since: Option<i64>,
    ) -> Result<BTreeMap<EventKind, KindActivity>> {
        let conn = self.read_conn()?;
        let mut activity = BTreeMap::new();
        match since {
            Some(since) => {
                let mut stmt = conn.prepare(
                    "SELECT kind, COUNT(*), MIN(created_at), MAX(created_at)
                     FROM events WHERE repo = ?1 AND created_at >= ?2
                     GROUP BY kind",
                )?;
                collect_kind_activity(&mut stmt.query(params![repo, since])?, &mut activity)?;
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT kind, COUNT(*), MIN(created_at), MAX(created_at)
                     FROM events WHERE repo = ?1 GROUP BY kind",
                )?;
                collect_kind_activity(&mut stmt.query(params![repo])?, &mut activity)?;
            }
        }
        Ok(activity)
    }

    /// Most active repositories in a window, with per-kind breakdown.
    ///
    /// Ties on total break by repo name ascending so the result is stable.
    pub fn trending(&self, since: i64, limit: usize) -> Result<Vec<TrendingRepo>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT repo, kind, COUNT(*), MIN(created_at), MAX(created_at)
             FROM events WHERE created_at >= ?1 AND repo != ''
             GROUP BY repo, kind",
        )?;
        let mut rows = stmt.query(params![since])?;
        let mut by_repo: HashMap<String, TrendingRepo> = HashMap::new();
        while let Some(row) = rows.next()? {
            let repo: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let count: i64 = row.get(2)?;
            let first: i64 = row.get(3)?;
            let last: i64 = row.get(4)?;
            let kind = match EventKind::from_api(&kind) {
                Some(kind) => kind,
                None => continue,
            };
            let entry = by_repo.entry(repo.clone()).or_insert_with(|| TrendingRepo {
                repo,
                total: 0,
                counts: zero_filled_counts(),
                first_ts: timestamp(first),
                last_ts: timestamp(last),
            });
            entry.total += count as u64;
            entry.counts.insert(kind, count as u64);
            entry.first_ts = entry.first_ts.min(timestamp(first));
            entry.last_ts = entry.last_ts.max(timestamp(last));
        }
        let mut trending: Vec<TrendingRepo> = by_repo.into_values().collect();
        trending.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.repo.cmp(&b.repo)));
        trending.truncate(limit);
        Ok(trending)
    }

    /// Per-kind counts tiled into `[since, now)` buckets of `bucket_minutes`.
    ///
    /// Buckets are half-open and pairwise disjoint; the final bucket is cut
    /// short at "now" when the window does not divide evenly.
    pub fn event_counts_timeseries(
        &self,
        since: i64,
        bucket_minutes: i64,
        repo: Option<&str>,
    ) -> Result<Vec<TimeBucket>> {
        let now = Utc::now().timestamp();
        if since >= now {
            return Ok(Vec::new());
        }
        let width = bucket_minutes * 60;
        let mut buckets = Vec::new();
        let mut start = since;
        while start < now {
            let end = (start + width).min(now);
            buckets.push(TimeBucket {
                start: timestamp(start),
                end: timestamp(end),
                counts: zero_filled_counts(),
            });
            start = end;
        }

        let conn = self.read_conn()?;
        match repo {
            Some(repo) => {
                let mut stmt = conn.prepare(
                    "SELECT created_at, kind FROM events
                     WHERE created_at >= ?1 AND repo = ?2",
                )?;
                fill_buckets(&mut stmt.query(params![since, repo])?, &mut buckets, since, width, now)?;
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT created_at, kind FROM events WHERE created_at >= ?1")?;
                fill_buckets(&mut stmt.query(params![since])?, &mut buckets, since, width, now)?;
            }
        }
        Ok(buckets)
    }

    /// Counts of events per kind grouped into hour-of-epoch buckets.
    ///
    /// Only hours with at least one event produce a bucket; the vectors are
    /// ordered by hour ascending.
    pub fn hourly_kind_counts(
        &self,
        repo: &str,
        since: i64,
    ) -> Result<BTreeMap<EventKind, Vec<u64>>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT kind, created_at / 3600 AS hour_bucket, COUNT(*)
             FROM events WHERE repo = ?1 AND created_at >= ?2
             GROUP BY kind, hour_bucket
             ORDER BY kind, hour_bucket",
        )?;
        let mut rows = stmt.query(params![repo, since])?;
        let mut series: BTreeMap<EventKind, Vec<u64>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(0)?;
            let count: i64 = row.get(2)?;
            if let Some(kind) = EventKind::from_api(&kind) {
                series.entry(kind).or_default().push(count as u64);
            }
        }
        Ok(series)
    }
}

fn collect_kind_counts(
    rows: &mut rusqlite::Rows<'_>,
    counts: &mut BTreeMap<EventKind, u64>,
) -> Result<()> {
    while let Some(row) = rows.next()? {
        let kind: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        if let Some(kind) = EventKind::from_api(&kind) {
            counts.insert(kind, count as u64);
        }
    }
    Ok(())
}

fn collect_kind_activity(
    rows: &mut rusqlite::Rows<'_>,
    activity: &mut BTreeMap<EventKind, KindActivity>,
) -> Result<()> {
    while let Some(row) = rows.next()? {
        let kind: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        let first: i64 = row.get(2)?;
        let last: i64 = row.get(3)?;
        if let Some(kind) = EventKind::from_api(&kind) {
            activity.insert(
                kind,
                KindActivity {
                    count: count as u64,
                    first_ts: timestamp(first),
                    last_ts: timestamp(last),
                },
            );
        }
    }
    Ok(())
}

fn fill_buckets(
    rows: &mut rusqlite::Rows<'_>,
    buckets: &mut [TimeBucket],
    since: i64,
    width: i64,
    now: i64,
) -> Result<()> {
    while let Some(row) = rows.next()? {
        let created_at: i64 = row.get(0)?;
        let kind: String = row.get(1)?;
        if created_at >= now {
            continue;
        }
        let idx = ((created_at - since) / width) as usize;
        if let (Some(kind), Some(bucket)) = (EventKind::from_api(&kind), buckets.get_mut(idx)) {
            *bucket.counts.entry(kind).or_insert(0) += 1;
        }
    }
    Ok(())
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
