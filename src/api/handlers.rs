// API handlers implementation
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::core::Error;
use crate::events::{EventKind, EventSummary};
use crate::metrics::{
    Anomaly, DurationStats, EventCounts, HealthScore, PrIntervalStats, PushActivity, ReleaseCount,
    RepoActivity, StarCount, DEFAULT_HEALTH_HOURS,
};
use crate::monitor::MonitorInfo;
use crate::store::{TimeBucket, TrendingRepo};

type ApiError = (StatusCode, Json<Value>);

fn api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::InvalidArgument(_) | Error::MalformedEvent(_) => StatusCode::BAD_REQUEST,
        Error::MonitorNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

fn default_hours() -> i64 {
    24
}

fn default_health_hours() -> i64 {
    DEFAULT_HEALTH_HOURS
}

fn default_limit() -> usize {
    10
}

fn default_bucket_minutes() -> i64 {
    60
}

fn default_monitor_limit() -> usize {
    100
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "github-events-monitor",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Deserialize)]
pub struct EventCountsParams {
    pub offset_minutes: i64,
    pub repo: Option<String>,
}

pub async fn metrics_event_counts(
    State(state): State<AppState>,
    Query(params): Query<EventCountsParams>,
) -> Result<Json<EventCounts>, ApiError> {
    state
        .engine
        .event_counts(params.offset_minutes, params.repo.as_deref())
        .map(Json)
        .map_err(api_error)
}

#[derive(Deserialize)]
pub struct RepoParams {
    pub repo: String,
}

pub async fn metrics_avg_pr_interval(
    State(state): State<AppState>,
    Query(params): Query<RepoParams>,
) -> Result<Json<PrIntervalStats>, ApiError> {
    state
        .engine
        .avg_pr_interval(&params.repo)
        .map(Json)
        .map_err(api_error)
}

#[derive(Deserialize)]
pub struct RepoWindowParams {
    pub repo: String,
    #[serde(default = "default_hours")]
    pub hours: i64,
}

pub async fn metrics_repository_activity(
    State(state): State<AppState>,
    Query(params): Query<RepoWindowParams>,
) -> Result<Json<RepoActivity>, ApiError> {
    state
        .engine
        .repository_activity(&params.repo, params.hours)
        .map(Json)
        .map_err(api_error)
}

#[derive(Deserialize)]
pub struct TrendingParams {
    #[serde(default = "default_hours")]
    pub hours: i64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn metrics_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<Vec<TrendingRepo>>, ApiError> {
    state
        .engine
        .trending(params.hours, params.limit)
        .map(Json)
        .map_err(api_error)
}

#[derive(Deserialize)]
pub struct TimeseriesParams {
    #[serde(default = "default_hours")]
    pub hours: i64,
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: i64,
    pub repo: Option<String>,
}

pub async fn metrics_event_counts_timeseries(
    State(state): State<AppState>,
    Query(params): Query<TimeseriesParams>,
) -> Result<Json<Vec<TimeBucket>>, ApiError> {
    state
        .engine
        .event_counts_timeseries(params.hours, params.bucket_minutes, params.repo.as_deref())
        .map(Json)
        .map_err(api_error)
}

pub async fn metrics_pr_merge_time(
    State(state): State<AppState>,
    Query(params): Query<RepoWindowParams>,
) -> Result<Json<DurationStats>, ApiError> {
    state
        .engine
        .pr_merge_time(&params.repo, params.hours)
        .map(Json)
        .map_err(api_error)
}

pub async fn metrics_issue_first_response(
    State(state): State<AppState>,
    Query(params): Query<RepoWindowParams>,
) -> Result<Json<DurationStats>, ApiError> {
    state
        .engine
        .issue_first_response(&params.repo, params.hours)
        .map(Json)
        .map_err(api_error)
}

#[derive(Deserialize)]
pub struct HealthWindowParams {
    pub repo: String,
    #[serde(default = "default_health_hours")]
    pub hours: i64,
}

pub async fn metrics_repository_health(
    State(state): State<AppState>,
    Query(params): Query<HealthWindowParams>,
) -> Result<Json<HealthScore>, ApiError> {
    state
        .engine
        .repository_health(&params.repo, params.hours)
        .map(Json)
        .map_err(api_error)
}

pub async fn metrics_event_anomalies(
    State(state): State<AppState>,
    Query(params): Query<HealthWindowParams>,
) -> Result<Json<Vec<Anomaly>>, ApiError> {
    state
        .engine
        .anomalies(&params.repo, params.hours)
        .map(Json)
        .map_err(api_error)
}

#[derive(Deserialize)]
pub struct WindowParams {
    #[serde(default = "default_hours")]
    pub hours: i64,
    pub repo: Option<String>,
}

pub async fn metrics_stars(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<StarCount>, ApiError> {
    state
        .engine
        .stars(params.hours, params.repo.as_deref())
        .map(Json)
        .map_err(api_error)
}

pub async fn metrics_releases(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<ReleaseCount>, ApiError> {
    state
        .engine
        .releases(params.hours, params.repo.as_deref())
        .map(Json)
        .map_err(api_error)
}

pub async fn metrics_push_activity(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<PushActivity>, ApiError> {
    state
        .engine
        .push_activity(params.hours, params.repo.as_deref())
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectRequest {
    pub limit: Option<usize>,
    pub repos: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct CollectResponse {
    pub inserted: usize,
}

pub async fn collect_now(
    State(state): State<AppState>,
    payload: Option<Json<CollectRequest>>,
) -> Result<Json<CollectResponse>, ApiError> {
    let Json(request) = payload.unwrap_or_default();
    let inserted = state
        .coordinator
        .collect_now(request.limit, request.repos.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(CollectResponse { inserted }))
}

#[derive(Deserialize)]
pub struct CreateMonitorRequest {
    pub repository: String,
    pub events: Option<Vec<String>>,
    pub interval_seconds: Option<u64>,
}

#[derive(Serialize)]
pub struct CreateMonitorResponse {
    pub monitor_id: Uuid,
}

pub async fn create_monitor(
    State(state): State<AppState>,
    Json(request): Json<CreateMonitorRequest>,
) -> Result<Json<CreateMonitorResponse>, ApiError> {
    let kinds: HashSet<EventKind> = match &request.events {
        Some(names) => {
            let mut kinds = HashSet::new();
            for name in names {
                let kind = EventKind::from_api(name).ok_or_else(|| {
                    api_error(Error::invalid(format!("unknown event kind: {}", name)))
                })?;
                kinds.insert(kind);
            }
            kinds
        }
        None => [EventKind::Watch, EventKind::PullRequest, EventKind::Issues]
            .into_iter()
            .collect(),
    };
    let interval = Duration::from_secs(request.interval_seconds.unwrap_or(60));

    let monitor_id = state
        .monitors
        .start(&request.repository, kinds, interval)
        .await;
    Ok(Json(CreateMonitorResponse { monitor_id }))
}

pub async fn list_monitors(State(state): State<AppState>) -> Json<Vec<MonitorInfo>> {
    Json(state.monitors.list().await)
}

pub async fn stop_monitor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.monitors.stop(id).await.map_err(api_error)?;
    Ok(Json(json!({ "stopped": id })))
}

#[derive(Deserialize)]
pub struct MonitorEventsParams {
    #[serde(default = "default_monitor_limit")]
    pub limit: usize,
}

pub async fn monitor_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<MonitorEventsParams>,
) -> Result<Json<Vec<EventSummary>>, ApiError> {
    state
        .monitors
        .get_events(id, params.limit)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn monitor_events_grouped(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BTreeMap<EventKind, Vec<EventSummary>>>, ApiError> {
    state
        .monitors
        .get_grouped(id)
        .await
        .map(Json)
        .map_err(api_error)
}
