use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Error;

/// The closed set of GitHub event kinds this system monitors.
///
/// Variant wire names match the upstream `type` strings exactly; anything the
/// feed returns outside this set is dropped before storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    // Development
    #[serde(rename = "PushEvent")]
    Push,
    #[serde(rename = "PullRequestEvent")]
    PullRequest,
    #[serde(rename = "IssuesEvent")]
    Issues,
    #[serde(rename = "CreateEvent")]
    Create,
    #[serde(rename = "DeleteEvent")]
    Delete,
    // Collaboration
    #[serde(rename = "PullRequestReviewEvent")]
    PullRequestReview,
    #[serde(rename = "PullRequestReviewCommentEvent")]
    PullRequestReviewComment,
    #[serde(rename = "IssueCommentEvent")]
    IssueComment,
    #[serde(rename = "CommitCommentEvent")]
    CommitComment,
    // Engagement
    #[serde(rename = "WatchEvent")]
    Watch,
    #[serde(rename = "ForkEvent")]
    Fork,
    #[serde(rename = "SponsorshipEvent")]
    Sponsorship,
    #[serde(rename = "MarketplacePurchaseEvent")]
    MarketplacePurchase,
    // Release / deploy
    #[serde(rename = "ReleaseEvent")]
    Release,
    #[serde(rename = "DeploymentEvent")]
    Deployment,
    #[serde(rename = "DeploymentStatusEvent")]
    DeploymentStatus,
    // Quality
    #[serde(rename = "StatusEvent")]
    Status,
    #[serde(rename = "CheckRunEvent")]
    CheckRun,
    #[serde(rename = "CheckSuiteEvent")]
    CheckSuite,
    // Repository management
    #[serde(rename = "PublicEvent")]
    Public,
    #[serde(rename = "MemberEvent")]
    Member,
    #[serde(rename = "TeamAddEvent")]
    TeamAdd,
    // Docs
    #[serde(rename = "GollumEvent")]
    Gollum,
}

/// Every monitored kind, in a stable order.
pub const MONITORED_KINDS: [EventKind; 23] = [
    EventKind::Push,
    EventKind::PullRequest,
    EventKind::Issues,
    EventKind::Create,
    EventKind::Delete,
    EventKind::PullRequestReview,
    EventKind::PullRequestReviewComment,
    EventKind::IssueComment,
    EventKind::CommitComment,
    EventKind::Watch,
    EventKind::Fork,
    EventKind::Sponsorship,
    EventKind::MarketplacePurchase,
    EventKind::Release,
    EventKind::Deployment,
    EventKind::DeploymentStatus,
    EventKind::Status,
    EventKind::CheckRun,
    EventKind::CheckSuite,
    EventKind::Public,
    EventKind::Member,
    EventKind::TeamAdd,
    EventKind::Gollum,
];

impl EventKind {
    /// The upstream `type` string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "PushEvent",
            EventKind::PullRequest => "PullRequestEvent",
            EventKind::Issues => "IssuesEvent",
            EventKind::Create => "CreateEvent",
            EventKind::Delete => "DeleteEvent",
            EventKind::PullRequestReview => "PullRequestReviewEvent",
            EventKind::PullRequestReviewComment => "PullRequestReviewCommentEvent",
            EventKind::IssueComment => "IssueCommentEvent",
            EventKind::CommitComment => "CommitCommentEvent",
            EventKind::Watch => "WatchEvent",
            EventKind::Fork => "ForkEvent",
            EventKind::Sponsorship => "SponsorshipEvent",
            EventKind::MarketplacePurchase => "MarketplacePurchaseEvent",
            EventKind::Release => "ReleaseEvent",
            EventKind::Deployment => "DeploymentEvent",
            EventKind::DeploymentStatus => "DeploymentStatusEvent",
            EventKind::Status => "StatusEvent",
            EventKind::CheckRun => "CheckRunEvent",
            EventKind::CheckSuite => "CheckSuiteEvent",
            EventKind::Public => "PublicEvent",
            EventKind::Member => "MemberEvent",
            EventKind::TeamAdd => "TeamAddEvent",
            EventKind::Gollum => "GollumEvent",
        }
    }

    /// Map an upstream `type` string to a monitored kind, `None` if unmonitored.
    pub fn from_api(kind: &str) -> Option<Self> {
        MONITORED_KINDS.iter().copied().find(|k| k.as_str() == kind)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::from_api(s)
            .ok_or_else(|| Error::invalid(format!("unknown event kind: {}", s)))
    }
}

/// A stored GitHub event.
///
/// `payload` is retained verbatim; per-kind interpretation happens in the
/// query layer, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub repo: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
    pub payload: Value,
}

/// Compact event form kept in live monitor buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub kind: EventKind,
    pub repo: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            kind: event.kind,
            repo: event.repo.clone(),
            actor: event.actor.clone(),
            created_at: event.created_at,
        }
    }
}

// Deserialization target matching the shape of one item in the events feed.
#[derive(Deserialize)]
struct FeedEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    repo: FeedRepo,
    actor: FeedActor,
    created_at: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct FeedRepo {
    name: String,
}

#[derive(Deserialize)]
struct FeedActor {
    login: String,
}

impl Event {
    /// Build an event record from one feed object.
    ///
    /// Returns `Ok(None)` for kinds outside the monitored set and
    /// `Err(Error::MalformedEvent)` when a required field (`id`, `type`,
    /// `repo.name`, `actor.login`, `created_at`) is absent or malformed.
    pub fn from_feed(raw: &Value) -> Result<Option<Self>, Error> {
        let feed: FeedEvent = serde_json::from_value(raw.clone())
            .map_err(|e| Error::MalformedEvent(e.to_string()))?;

        let kind = match EventKind::from_api(&feed.kind) {
            Some(kind) => kind,
            None => return Ok(None),
        };

        let created_at = DateTime::parse_from_rfc3339(&feed.created_at)
            .map_err(|e| {
                Error::MalformedEvent(format!("event {}: bad created_at: {}", feed.id, e))
            })?
            .with_timezone(&Utc);

        Ok(Some(Event {
            id: feed.id,
            kind,
            repo: feed.repo.name,
            actor: feed.actor.login,
            created_at,
            payload: feed.payload,
        }))
    }
}
