//! Core domain logic for the timeline garden.
//! This crate is the single source of truth for item invariants and feed
//! query semantics.

pub mod db;
pub mod feed;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use feed::index::{timestamp_index, EventKind, TimestampEntry};
pub use feed::query::{
    query_feed, FeedPage, FeedParams, FeedQuery, SortOrder, FEED_DEFAULT_LIMIT, FEED_LIMIT_MAX,
};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::item::{
    ContactDetails, Item, ItemDetails, ItemDraft, ItemId, ItemKind, ItemValidationError,
    TaskDetails,
};
pub use repo::item_repo::{
    ItemListQuery, ItemRepository, RepoError, RepoResult, SqliteItemRepository,
};
pub use service::feed_service::{FeedItem, FeedResponse, FeedService};
pub use service::item_service::{ImportSummary, ItemService, ServiceError, ServiceResult};

/// Minimal health-check API for integration probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
