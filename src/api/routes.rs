// API routes implementation
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{
    collect_now, create_monitor, health_check, list_monitors, metrics_avg_pr_interval,
    metrics_event_anomalies, metrics_event_counts, metrics_event_counts_timeseries,
    metrics_issue_first_response, metrics_pr_merge_time, metrics_push_activity, metrics_releases,
    metrics_repository_activity, metrics_repository_health, metrics_stars, metrics_trending,
    monitor_events, monitor_events_grouped, stop_monitor,
};
use crate::api::state::AppState;

pub fn create_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Metric queries
        .route("/metrics/event-counts", get(metrics_event_counts))
        .route("/metrics/avg-pr-interval", get(metrics_avg_pr_interval))
        .route("/metrics/repository-activity", get(metrics_repository_activity))
        .route("/metrics/trending", get(metrics_trending))
        .route(
            "/metrics/event-counts-timeseries",
            get(metrics_event_counts_timeseries),
        )
        .route("/metrics/pr-merge-time", get(metrics_pr_merge_time))
        .route("/metrics/issue-first-response", get(metrics_issue_first_response))
        .route("/metrics/repository-health", get(metrics_repository_health))
        .route("/metrics/event-anomalies", get(metrics_event_anomalies))
        .route("/metrics/stars", get(metrics_stars))
        .route("/metrics/releases", get(metrics_releases))
        .route("/metrics/push-activity", get(metrics_push_activity))
        // Ingestion command
        .route("/collect", post(collect_now))
        // Live monitor lifecycle
        .route("/monitors", post(create_monitor).get(list_monitors))
        .route("/monitors/:id", delete(stop_monitor))
        .route("/monitors/:id/events", get(monitor_events))
        .route("/monitors/:id/events/grouped", get(monitor_events_grouped))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
