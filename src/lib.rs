pub mod api;
pub mod collector;
pub mod core;
pub mod events;
pub mod fetcher;
pub mod metrics;
pub mod monitor;
pub mod store;

pub use collector::IngestionCoordinator;
pub use core::{Config, Error, Result};
pub use events::{Event, EventKind, EventSummary, MONITORED_KINDS};
pub use fetcher::{EventsFetcher, FetchState, FetchStatus};
pub use metrics::QueryEngine;
pub use monitor::MonitorRegistry;
pub use store::EventStore;
