use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{Error, Result};
use crate::events::EventKind;
use crate::store::{zero_filled_counts, EventStore, KindActivity, TimeBucket, TrendingRepo};

/// Default analysis window for health scoring: one week.
pub const DEFAULT_HEALTH_HOURS: i64 = 168;

/// Event counts per kind over a window.
///
/// `fell_back_to_alltime` is set when the window held nothing but the store
/// did not, and the counts shown are the all-time aggregation instead.
#[derive(Debug, Clone, Serialize)]
pub struct EventCounts {
    pub offset_minutes: i64,
    pub repo: Option<String>,
    pub total: u64,
    pub counts: BTreeMap<EventKind, u64>,
    pub fell_back_to_alltime: bool,
    pub timestamp: DateTime<Utc>,
}

/// Spacing statistics over a repository's opened pull requests.
///
/// All statistics are `None` with fewer than two opens on record.
#[derive(Debug, Clone, Serialize)]
pub struct PrIntervalStats {
    pub repo: String,
    pub pr_count: usize,
    pub avg_seconds: Option<f64>,
    pub median_seconds: Option<f64>,
    pub min_seconds: Option<f64>,
    pub max_seconds: Option<f64>,
    pub avg_hours: Option<f64>,
    pub avg_days: Option<f64>,
}

/// Duration statistics shared by PR merge time and issue first response.
#[derive(Debug, Clone, Serialize)]
pub struct DurationStats {
    pub repo: String,
    pub hours: i64,
    pub count: usize,
    pub avg_seconds: Option<f64>,
    pub p50_seconds: Option<f64>,
    pub p90_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoActivity {
    pub repo: String,
    pub hours: i64,
    pub total: u64,
    pub activity: BTreeMap<EventKind, KindActivity>,
    pub fell_back_to_alltime: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StarCount {
    pub hours: i64,
    pub repo: Option<String>,
    pub stars: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseCount {
    pub hours: i64,
    pub repo: Option<String>,
    pub releases: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushActivity {
    pub hours: i64,
    pub repo: Option<String>,
    pub push_events: u64,
    pub total_commits: u64,
}

/// Weighted composite health score, each component on a 0-100 scale.
#[derive(Debug, Clone, Serialize)]
pub struct HealthScore {
    pub repo: String,
    pub hours: i64,
    pub total_events: u64,
    pub activity: f64,
    pub collaboration: f64,
    pub maintenance: f64,
    pub security: f64,
    pub overall: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    Spike,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub kind: EventKind,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub threshold: f64,
    pub value: u64,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

// Kind groups feeding the health score components.
const ACTIVITY_KINDS: [EventKind; 5] = [
    EventKind::Push,
    EventKind::PullRequest,
    EventKind::Issues,
    EventKind::Create,
    EventKind::Delete,
];
const COLLAB_KINDS: [EventKind; 4] = [
    EventKind::PullRequestReview,
    EventKind::IssueComment,
    EventKind::PullRequestReviewComment,
    EventKind::CommitComment,
];
const MAINTENANCE_KINDS: [EventKind; 4] = [
    EventKind::Release,
    EventKind::Deployment,
    EventKind::Status,
    EventKind::CheckRun,
];
const SECURITY_KINDS: [EventKind; 3] = [
    EventKind::CheckSuite,
    EventKind::Status,
    EventKind::DeploymentStatus,
];

/// Pure query layer over the event store.
///
/// Windows arrive in minutes or hours from "now" and are converted to a
/// cutoff instant once at entry; everything below that is arithmetic over
/// store results.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<EventStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    pub fn event_counts(&self, offset_minutes: i64, repo: Option<&str>) -> Result<EventCounts> {
        if offset_minutes <= 0 {
            return Err(Error::invalid("offset_minutes must be positive"));
        }
        let since = Utc::now().timestamp() - offset_minutes * 60;

        let mut counts = zero_filled_counts();
        counts.extend(self.store.count_by_kind(Some(since), repo)?);
        let mut total: u64 = counts.values().sum();
        let mut fell_back = false;
        if total == 0 {
            let alltime = self.store.count_by_kind(None, repo)?;
            let alltime_total: u64 = alltime.values().sum();
            if alltime_total > 0 {
                counts = zero_filled_counts();
                counts.extend(alltime);
                total = alltime_total;
                fell_back = true;
            }
        }

        Ok(EventCounts {
            offset_minutes,
            repo: repo.map(|r| r.to_string()),
            total,
            counts,
            fell_back_to_alltime: fell_back,
            timestamp: Utc::now(),
        })
    }

    pub fn avg_pr_interval(&self, repo: &str) -> Result<PrIntervalStats> {
        let stamps = self.store.pr_opened_timestamps(repo)?;
        if stamps.len() < 2 {
            return Ok(PrIntervalStats {
                repo: repo.to_string(),
                pr_count: stamps.len(),
                avg_seconds: None,
                median_seconds: None,
                min_seconds: None,
                max_seconds: None,
                avg_hours: None,
                avg_days: None,
            });
        }

        let gaps: Vec<f64> = stamps.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
        let avg = gaps.iter().sum::<f64>() / gaps.len() as f64;
        let min = gaps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(PrIntervalStats {
            repo: repo.to_string(),
            pr_count: stamps.len(),
            avg_seconds: Some(avg),
            median_seconds: Some(percentile(&gaps, 50.0)),
            min_seconds: Some(min),
            max_seconds: Some(max),
            avg_hours: Some(avg / 3600.0),
            avg_days: Some(avg / 86400.0),
        })
    }

    pub fn pr_merge_time(&self, repo: &str, hours: i64) -> Result<DurationStats> {
        let durations = self.store.pr_merge_durations(repo, since_hours(hours))?;
        Ok(duration_stats(repo, hours, &durations))
    }

    pub fn issue_first_response(&self, repo: &str, hours: i64) -> Result<DurationStats> {
        let durations = self
            .store
            .issue_first_response_durations(repo, since_hours(hours))?;
        Ok(duration_stats(repo, hours, &durations))
    }

    pub fn repository_activity(&self, repo: &str, hours: i64) -> Result<RepoActivity> {
        let (activity, total, fell_back) = self.store.repo_activity(repo, since_hours(hours))?;
        Ok(RepoActivity {
            repo: repo.to_string(),
            hours,
            total,
            activity,
            fell_back_to_alltime: fell_back,
            timestamp: Utc::now(),
        })
    }

    pub fn trending(&self, hours: i64, limit: usize) -> Result<Vec<TrendingRepo>> {
        self.store.trending(since_hours(hours), limit)
    }

    pub fn event_counts_timeseries(
        &self,
        hours: i64,
        bucket_minutes: i64,
        repo: Option<&str>,
    ) -> Result<Vec<TimeBucket>> {
        if bucket_minutes < 1 {
            return Err(Error::invalid("bucket_minutes must be at least 1"));
        }
        self.store
            .event_counts_timeseries(since_hours(hours), bucket_minutes, repo)
    }

    pub fn stars(&self, hours: i64, repo: Option<&str>) -> Result<StarCount> {
        let stars = self
            .store
            .count_kind(EventKind::Watch, since_hours(hours), repo, None)?;
        Ok(StarCount {
            hours,
            repo: repo.map(|r| r.to_string()),
            stars,
        })
    }

    pub fn releases(&self, hours: i64, repo: Option<&str>) -> Result<ReleaseCount> {
        // Only published releases count.
        let releases = self.store.count_kind(
            EventKind::Release,
            since_hours(hours),
            repo,
            Some("published"),
        )?;
        Ok(ReleaseCount {
            hours,
            repo: repo.map(|r| r.to_string()),
            releases,
        })
    }

    pub fn push_activity(&self, hours: i64, repo: Option<&str>) -> Result<PushActivity> {
        let since = since_hours(hours);
        let push_events = self.store.count_kind(EventKind::Push, since, repo, None)?;
        let total_commits = self.store.sum_push_commits(since, repo)?;
        Ok(PushActivity {
            hours,
            repo: repo.map(|r| r.to_string()),
            push_events,
            total_commits,
        })
    }

    pub fn repository_health(&self, repo: &str, hours: i64) -> Result<HealthScore> {
        let hours = if hours <= 0 { DEFAULT_HEALTH_HOURS } else { hours };
        let (activity, total, _) = self.store.repo_activity(repo, since_hours(hours))?;

        let count_of = |kinds: &[EventKind]| -> u64 {
            kinds
                .iter()
                .filter_map(|k| activity.get(k).map(|a| a.count))
                .sum()
        };
        let per_hour = |count: u64| count as f64 / hours.max(1) as f64;

        let activity_score = (per_hour(count_of(&ACTIVITY_KINDS)) * 10.0).min(100.0);
        let collaboration_score =
            (count_of(&COLLAB_KINDS) as f64 / total.max(1) as f64 * 100.0).min(100.0);
        let maintenance_score = (per_hour(count_of(&MAINTENANCE_KINDS)) * 20.0).min(100.0);
        let security_score = (per_hour(count_of(&SECURITY_KINDS)) * 15.0).min(100.0);

        let overall = activity_score * 0.30
            + collaboration_score * 0.25
            + maintenance_score * 0.25
            + security_score * 0.20;

        Ok(HealthScore {
            repo: repo.to_string(),
            hours,
            total_events: total,
            activity: activity_score,
            collaboration: collaboration_score,
            maintenance: maintenance_score,
            security: security_score,
            overall,
            timestamp: Utc::now(),
        })
    }

    /// Flag hourly buckets whose counts sit outside two standard deviations.
    ///
    /// Kinds with fewer than three populated hourly buckets yield nothing;
    /// the drop rule only applies when the kind's hourly mean exceeds five.
    pub fn anomalies(&self, repo: &str, hours: i64) -> Result<Vec<Anomaly>> {
        let series = self.store.hourly_kind_counts(repo, since_hours(hours))?;
        let detected_at = Utc::now();
        let mut anomalies = Vec::new();

        for (kind, counts) in series {
            if counts.len() < 3 {
                continue;
            }
            let mean = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
            let stdev = sample_stdev(&counts, mean);
            if stdev <= 0.0 {
                continue;
            }
            let max = *counts.iter().max().unwrap_or(&0);
            let min = *counts.iter().min().unwrap_or(&0);

            if (max as f64) > mean + 2.0 * stdev {
                let severity = if (max as f64) > mean + 3.0 * stdev {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Medium
                };
                anomalies.push(Anomaly {
                    kind,
                    anomaly_type: AnomalyType::Spike,
                    severity,
                    threshold: mean + 2.0 * stdev,
                    value: max,
                    confidence: 0.95,
                    detected_at,
                });
            }

            if mean > 5.0 && (min as f64) < (mean - 2.0 * stdev).max(0.0) {
                anomalies.push(Anomaly {
                    kind,
                    anomaly_type: AnomalyType::Drop,
                    severity: AnomalySeverity::Medium,
                    threshold: mean - 2.0 * stdev,
                    value: min,
                    confidence: 0.85,
                    detected_at,
                });
            }
        }
        Ok(anomalies)
    }
}

fn since_hours(hours: i64) -> i64 {
    Utc::now().timestamp() - hours.max(0) * 3600
}

fn duration_stats(repo: &str, hours: i64, durations: &[i64]) -> DurationStats {
    if durations.is_empty() {
        return DurationStats {
            repo: repo.to_string(),
            hours,
            count: 0,
            avg_seconds: None,
            p50_seconds: None,
            p90_seconds: None,
        };
    }
    let values: Vec<f64> = durations.iter().map(|&d| d as f64).collect();
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    DurationStats {
        repo: repo.to_string(),
        hours,
        count: durations.len(),
        avg_seconds: Some(avg),
        p50_seconds: Some(percentile(&values, 50.0)),
        p90_seconds: Some(percentile(&values, 90.0)),
    }
}

// Linear interpolation between order statistics; callers pass non-empty input.
fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let k = (sorted.len() - 1) as f64 * (p / 100.0);
    let floor = k.floor();
    let ceil = k.ceil();
    if floor == ceil {
        return sorted[k as usize];
    }
    sorted[floor as usize] * (ceil - k) + sorted[ceil as usize] * (k - floor)
}

// Sample standard deviation; zero for fewer than two values.
fn sample_stdev(counts: &[u64], mean: f64) -> f64 {
    if counts.len() < 2 {
        return 0.0;
    }
    let variance = counts
        .iter()
        .map(|&c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / (counts.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn engine_with_store(dir: &TempDir) -> (QueryEngine, Arc<EventStore>) {
        let store = Arc::new(EventStore::open(dir.path().join("events.db")).unwrap());
        (QueryEngine::new(store.clone()), store)
    }

    fn event(id: &str, kind: EventKind, repo: &str, ts: i64, payload: serde_json::Value) -> Event {
        Event {
            id: id.to_string(),
            kind,
            repo: repo.to_string(),
            actor: "octocat".to_string(),
            created_at: Utc.timestamp_opt(ts, 0).single().unwrap(),
            payload,
        }
    }

    #[test]
    fn test_event_counts_rejects_non_positive_offset() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = engine_with_store(&dir);

        assert!(matches!(
            engine.event_counts(0, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.event_counts(-5, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(engine.event_counts(1, None).is_ok());
    }

    #[test]
    fn test_event_counts_covers_full_kind_set() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let now = Utc::now().timestamp();

        store
            .insert_many(&[event("1", EventKind::Watch, "o/r", now - 30, json!({}))])
            .unwrap();

        let counts = engine.event_counts(60, None).unwrap();
        assert_eq!(counts.counts.len(), crate::events::MONITORED_KINDS.len());
        assert_eq!(counts.counts.get(&EventKind::Watch), Some(&1));
        assert_eq!(counts.counts.get(&EventKind::Gollum), Some(&0));
        assert_eq!(counts.total, 1);
        assert!(!counts.fell_back_to_alltime);
    }

    #[test]
    fn test_event_counts_falls_back_to_alltime_and_says_so() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let now = Utc::now().timestamp();

        store
            .insert_many(&[event("old", EventKind::Push, "o/r", now - 86_400, json!({}))])
            .unwrap();

        let counts = engine.event_counts(1, None).unwrap();
        assert!(counts.fell_back_to_alltime);
        assert_eq!(counts.total, 1);
        assert_eq!(counts.counts.get(&EventKind::Push), Some(&1));

        // Empty store: zeros, no fallback claimed.
        let empty_dir = TempDir::new().unwrap();
        let (empty_engine, _) = engine_with_store(&empty_dir);
        let counts = empty_engine.event_counts(1, None).unwrap();
        assert!(!counts.fell_back_to_alltime);
        assert_eq!(counts.total, 0);
    }

    #[test]
    fn test_avg_pr_interval_statistics() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let base = Utc::now().timestamp() - 100_000;

        // Opens at t=0h, t=2h, t=5h.
        store
            .insert_many(&[
                event("p1", EventKind::PullRequest, "o/r", base, json!({"action": "opened"})),
                event("p2", EventKind::PullRequest, "o/r", base + 7_200, json!({"action": "opened"})),
                event("p3", EventKind::PullRequest, "o/r", base + 18_000, json!({"action": "opened"})),
            ])
            .unwrap();

        let stats = engine.avg_pr_interval("o/r").unwrap();
        assert_eq!(stats.pr_count, 3);
        assert_eq!(stats.avg_seconds, Some(9_000.0));
        assert_eq!(stats.min_seconds, Some(7_200.0));
        assert_eq!(stats.max_seconds, Some(10_800.0));
        assert_eq!(stats.median_seconds, Some(9_000.0));
        assert_eq!(stats.avg_hours, Some(2.5));
    }

    #[test]
    fn test_avg_pr_interval_insufficient_data() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let now = Utc::now().timestamp();

        store
            .insert_many(&[event(
                "p1",
                EventKind::PullRequest,
                "o/r",
                now - 60,
                json!({"action": "opened"}),
            )])
            .unwrap();

        let stats = engine.avg_pr_interval("o/r").unwrap();
        assert_eq!(stats.pr_count, 1);
        assert_eq!(stats.avg_seconds, None);
    }

    #[test]
    fn test_pr_merge_time_percentiles_ordered() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let base = Utc::now().timestamp() - 100_000;

        let mut batch = Vec::new();
        for (i, minutes) in [10_i64, 20, 30, 240].iter().enumerate() {
            batch.push(event(
                &format!("o{}", i),
                EventKind::PullRequest,
                "o/r",
                base + i as i64 * 1000,
                json!({"action": "opened", "pull_request": {"number": i}}),
            ));
            batch.push(event(
                &format!("c{}", i),
                EventKind::PullRequest,
                "o/r",
                base + i as i64 * 1000 + minutes * 60,
                json!({"action": "closed", "pull_request": {"number": i, "merged": true}}),
            ));
        }
        store.insert_many(&batch).unwrap();

        let stats = engine.pr_merge_time("o/r", 48).unwrap();
        assert_eq!(stats.count, 4);
        let p50 = stats.p50_seconds.unwrap();
        let p90 = stats.p90_seconds.unwrap();
        assert!(p50 <= p90);
        assert!(p50 >= 600.0 && p90 <= 14_400.0);
    }

    #[test]
    fn test_repository_activity_unknown_repo_is_empty() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = engine_with_store(&dir);

        let activity = engine.repository_activity("never/seen", 24).unwrap();
        assert_eq!(activity.total, 0);
        assert!(activity.activity.is_empty());
        assert!(!activity.fell_back_to_alltime);
    }

    #[test]
    fn test_timeseries_rejects_small_buckets() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = engine_with_store(&dir);

        assert!(matches!(
            engine.event_counts_timeseries(24, 0, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(engine.event_counts_timeseries(1, 1, None).is_ok());
    }

    #[test]
    fn test_convenience_counts() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let now = Utc::now().timestamp();

        store
            .insert_many(&[
                event("w1", EventKind::Watch, "o/r", now - 60, json!({"action": "started"})),
                event("w2", EventKind::Watch, "o/r", now - 120, json!({"action": "started"})),
                event("r1", EventKind::Release, "o/r", now - 60, json!({"action": "published"})),
                event("r2", EventKind::Release, "o/r", now - 60, json!({"action": "created"})),
                event("g1", EventKind::Push, "o/r", now - 60, json!({"size": 3})),
            ])
            .unwrap();

        assert_eq!(engine.stars(1, Some("o/r")).unwrap().stars, 2);
        assert_eq!(engine.releases(1, Some("o/r")).unwrap().releases, 1);
        let pushes = engine.push_activity(1, Some("o/r")).unwrap();
        assert_eq!(pushes.push_events, 1);
        assert_eq!(pushes.total_commits, 3);
    }

    #[test]
    fn test_repository_health_score_components() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let now = Utc::now().timestamp();

        store
            .insert_many(&[
                event("h1", EventKind::Push, "o/r", now - 60, json!({})),
                event("h2", EventKind::Push, "o/r", now - 120, json!({})),
                event("h3", EventKind::Push, "o/r", now - 180, json!({})),
                event("h4", EventKind::IssueComment, "o/r", now - 240, json!({})),
                event("h5", EventKind::Release, "o/r", now - 300, json!({})),
                event("h6", EventKind::CheckSuite, "o/r", now - 360, json!({})),
            ])
            .unwrap();

        let health = engine.repository_health("o/r", 1).unwrap();
        assert_eq!(health.total_events, 6);
        assert!((health.activity - 30.0).abs() < 1e-9);
        assert!((health.collaboration - 100.0 / 6.0).abs() < 1e-9);
        assert!((health.maintenance - 20.0).abs() < 1e-9);
        assert!((health.security - 15.0).abs() < 1e-9);
        let expected = 30.0 * 0.30 + (100.0 / 6.0) * 0.25 + 20.0 * 0.25 + 15.0 * 0.20;
        assert!((health.overall - expected).abs() < 1e-9);
    }

    #[test]
    fn test_anomaly_spike_detection() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let hour = (Utc::now().timestamp() / 3600) * 3600;

        // Hourly counts [1, 1, 1, 1, 1, 20]: the last hour is a medium spike.
        let mut batch = Vec::new();
        for h in 0..5 {
            batch.push(event(
                &format!("q{}", h),
                EventKind::Push,
                "o/r",
                hour - (6 - h) * 3600,
                json!({}),
            ));
        }
        for i in 0..20 {
            batch.push(event(
                &format!("s{}", i),
                EventKind::Push,
                "o/r",
                hour - 3600 + i,
                json!({}),
            ));
        }
        store.insert_many(&batch).unwrap();

        let anomalies = engine.anomalies("o/r", 24).unwrap();
        assert_eq!(anomalies.len(), 1);
        let spike = &anomalies[0];
        assert_eq!(spike.kind, EventKind::Push);
        assert_eq!(spike.anomaly_type, AnomalyType::Spike);
        assert_eq!(spike.severity, AnomalySeverity::Medium);
        assert_eq!(spike.value, 20);
        assert!((spike.threshold - 19.68).abs() < 0.1);
        assert_eq!(spike.confidence, 0.95);
    }

    #[test]
    fn test_anomaly_requires_three_buckets() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine_with_store(&dir);
        let hour = (Utc::now().timestamp() / 3600) * 3600;

        store
            .insert_many(&[
                event("a1", EventKind::Push, "o/r", hour - 2 * 3600, json!({})),
                event("a2", EventKind::Push, "o/r", hour - 3600, json!({})),
            ])
            .unwrap();

        assert!(engine.anomalies("o/r", 24).unwrap().is_empty());
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 90.0) - 3.7).abs() < 1e-9);
    }

    #[test]
    fn test_sample_stdev_matches_scenario() {
        let counts = vec![1, 1, 1, 1, 1, 20];
        let mean = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
        let stdev = sample_stdev(&counts, mean);
        assert!((mean - 4.1667).abs() < 0.001);
        assert!((stdev - 7.7567).abs() < 0.01);
    }
}
