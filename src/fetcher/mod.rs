use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::config::GitHubConfig;
use crate::events::Event;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const API_VERSION: &str = "2022-11-28";

/// Conditional-request state for one upstream endpoint.
///
/// Owned by the caller (coordinator or monitor worker), never shared between
/// them. Lost on restart; dedup by event id absorbs the replays.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub suggested_poll: Option<Duration>,
}

/// How a single fetch resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    /// 200 with a (possibly empty) body of events.
    Fresh,
    /// 304, nothing changed upstream.
    NotModified,
    /// 429 or 403 with the quota exhausted; the reset instant was waited out.
    RateLimited { reset: DateTime<Utc> },
    /// Transport error or unexpected status; retried on the next schedule.
    Failed,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub events: Vec<Event>,
    pub status: FetchStatus,
}

impl FetchOutcome {
    fn empty(status: FetchStatus) -> Self {
        Self {
            events: Vec::new(),
            status,
        }
    }
}

/// Stateless client for the GitHub events endpoints.
///
/// All per-endpoint mutable state lives in the `FetchState` the caller passes
/// in; the fetcher itself never retries and never touches the store.
#[derive(Clone)]
pub struct EventsFetcher {
    client: Client,
    api_base: String,
    token: Option<String>,
    user_agent: String,
}

impl EventsFetcher {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    /// Fetch the global public events feed.
    pub async fn fetch_global(&self, state: &mut FetchState, limit: Option<usize>) -> FetchOutcome {
        let url = format!("{}/events", self.api_base);
        self.fetch(&url, state, limit).await
    }

    /// Fetch the events feed of one repository (`owner/name`).
    pub async fn fetch_repo(
        &self,
        repo: &str,
        state: &mut FetchState,
        limit: Option<usize>,
    ) -> FetchOutcome {
        let url = format!("{}/repos/{}/events", self.api_base, repo);
        self.fetch(&url, state, limit).await
    }

    async fn fetch(&self, url: &str, state: &mut FetchState, limit: Option<usize>) -> FetchOutcome {
        let mut request = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(etag) = &state.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &state.last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Request to {} failed: {}", url, e);
                return FetchOutcome::empty(FetchStatus::Failed);
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!("No new events from {} (304 Not Modified)", url);
            return FetchOutcome::empty(FetchStatus::NotModified);
        }

        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && rate_limit_exhausted(&response))
        {
            let reset = rate_limit_reset(&response);
            let wait = (reset - Utc::now()).to_std().unwrap_or_default();
            warn!(
                "Rate limited by {}; waiting {}s until reset",
                url,
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
            return FetchOutcome::empty(FetchStatus::RateLimited { reset });
        }

        if !status.is_success() {
            warn!("Unexpected status {} from {}", status, url);
            return FetchOutcome::empty(FetchStatus::Failed);
        }

        state.etag = header_value(&response, header::ETAG.as_str());
        state.last_modified = header_value(&response, header::LAST_MODIFIED.as_str());
        if let Some(seconds) = header_value(&response, "X-Poll-Interval")
            .and_then(|v| v.parse::<u64>().ok())
        {
            state.suggested_poll = Some(Duration::from_secs(seconds));
        }

        let items: Vec<Value> = match response.json().await {
            Ok(items) => items,
            Err(e) => {
                error!("Failed to read events body from {}: {}", url, e);
                return FetchOutcome::empty(FetchStatus::Failed);
            }
        };

        let mut events = Vec::new();
        for item in &items {
            match Event::from_feed(item) {
                Ok(Some(event)) => {
                    events.push(event);
                    if limit.map_or(false, |l| events.len() >= l) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Skipping malformed event from {}: {}", url, e),
            }
        }
        info!(
            "Fetched {} relevant events out of {} from {}",
            events.len(),
            items.len(),
            url
        );
        FetchOutcome {
            events,
            status: FetchStatus::Fresh,
        }
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn rate_limit_exhausted(response: &Response) -> bool {
    header_value(response, "X-RateLimit-Remaining").as_deref() == Some("0")
}

fn rate_limit_reset(response: &Response) -> DateTime<Utc> {
    header_value(response, "X-RateLimit-Reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer) -> EventsFetcher {
        EventsFetcher::new(&GitHubConfig {
            token: None,
            user_agent: "github-events-monitor/test".to_string(),
            api_base_url: server.uri(),
        })
        .unwrap()
    }

    fn feed_item(id: &str, kind: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": kind,
            "repo": {"name": "octocat/hello-world"},
            "actor": {"login": "octocat"},
            "created_at": "2024-05-01T12:00:00Z",
            "payload": {}
        })
    }

    #[tokio::test]
    async fn test_conditional_request_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"X\"")
                    .set_body_json(json!([feed_item("1", "WatchEvent"), feed_item("2", "PushEvent")])),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("If-None-Match", "\"X\""))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let mut state = FetchState::default();

        let first = fetcher.fetch_global(&mut state, None).await;
        assert_eq!(first.status, FetchStatus::Fresh);
        assert_eq!(first.events.len(), 2);
        assert_eq!(state.etag.as_deref(), Some("\"X\""));

        let second = fetcher.fetch_global(&mut state, None).await;
        assert_eq!(second.status, FetchStatus::NotModified);
        assert!(second.events.is_empty());
        assert_eq!(state.etag.as_deref(), Some("\"X\""));
    }

    #[tokio::test]
    async fn test_unmonitored_kinds_are_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                feed_item("1", "PushEvent"),
                feed_item("2", "GollumEvent"),
                feed_item("3", "FollowEvent"),
            ])))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let outcome = fetcher.fetch_global(&mut FetchState::default(), None).await;
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.events[0].kind, EventKind::Push);
        assert_eq!(outcome.events[1].kind, EventKind::Gollum);
    }

    #[tokio::test]
    async fn test_limit_stops_early() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                feed_item("1", "PushEvent"),
                feed_item("2", "PushEvent"),
                feed_item("3", "PushEvent"),
            ])))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let outcome = fetcher.fetch_global(&mut FetchState::default(), Some(2)).await;
        assert_eq!(outcome.events.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_leaves_state_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/events"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let mut state = FetchState {
            etag: Some("\"kept\"".to_string()),
            ..Default::default()
        };
        let outcome = fetcher.fetch_repo("o/r", &mut state, None).await;
        assert_eq!(outcome.status, FetchStatus::Failed);
        assert!(outcome.events.is_empty());
        assert_eq!(state.etag.as_deref(), Some("\"kept\""));
    }

    #[tokio::test]
    async fn test_rate_limit_returns_empty_after_reset() {
        let server = MockServer::start().await;
        // Reset instant already in the past, so the wait is zero.
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("X-RateLimit-Reset", "0")
                    .insert_header("X-RateLimit-Remaining", "0"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let outcome = fetcher.fetch_global(&mut FetchState::default(), None).await;
        assert!(matches!(outcome.status, FetchStatus::RateLimited { .. }));
        assert!(outcome.events.is_empty());
    }

    #[tokio::test]
    async fn test_poll_interval_suggestion_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Poll-Interval", "60")
                    .set_body_json(json!([])),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let mut state = FetchState::default();
        fetcher.fetch_global(&mut state, None).await;
        assert_eq!(state.suggested_poll, Some(Duration::from_secs(60)));
    }
}
