//! Timeline feed use-case service.
//!
//! # Responsibility
//! - Snapshot active items from the store and run the feed query engine.
//! - Resolve page entries back to full item bodies for callers.
//!
//! # Invariants
//! - `datetime` on a feed item is the timestamp of its selected entry.
//! - Store failures propagate; parameter problems never do.

use crate::feed::index::EventKind;
use crate::feed::query::{query_feed, FeedParams, FeedQuery};
use crate::model::item::{Item, ItemId};
use crate::model::timestamp;
use crate::repo::item_repo::{ItemListQuery, ItemRepository, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One resolved feed row: the item plus its selected timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub item: Item,
    #[serde(with = "timestamp::rfc3339")]
    pub datetime: DateTime<Utc>,
    /// Event kind that produced `datetime` (`created` on fallback).
    pub event: EventKind,
}

/// Response envelope for one feed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    pub has_more: bool,
    /// Value to pass as `start` for the next page.
    #[serde(with = "timestamp::rfc3339_opt")]
    pub next_start: Option<DateTime<Utc>>,
    /// Effective normalized limit used by the query.
    pub limit: u32,
}

/// Feed service facade over repository implementations.
pub struct FeedService<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> FeedService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Serves one page from raw, unvalidated parameters.
    pub fn feed(&self, params: &FeedParams) -> RepoResult<FeedResponse> {
        self.feed_query(&FeedQuery::from_params(params))
    }

    /// Serves one page for an already normalized query.
    pub fn feed_query(&self, query: &FeedQuery) -> RepoResult<FeedResponse> {
        let items = self.repo.list_items(&ItemListQuery::active())?;
        let page = query_feed(&items, query);
        let next_start = page.next_start();

        let mut by_id: HashMap<ItemId, Item> = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        let mut resolved = Vec::with_capacity(page.entries.len());
        for entry in page.entries {
            let item = by_id.remove(&entry.item_id).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "feed entry `{}` has no backing item",
                    entry.item_id
                ))
            })?;
            resolved.push(FeedItem {
                item,
                datetime: entry.timestamp,
                event: entry.event_kind,
            });
        }

        Ok(FeedResponse {
            items: resolved,
            has_more: page.has_more,
            next_start,
            limit: query.limit,
        })
    }
}
