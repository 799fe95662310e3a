//! Feed query engine.
//!
//! # Responsibility
//! - Normalize raw feed parameters (sort, order, cursor, limit).
//! - Select one timestamp entry per item, with `created` fallback.
//! - Filter by cursor, order deterministically and cut one page.
//!
//! # Invariants
//! - Every active item contributes exactly one candidate per query.
//! - Ordering is total: timestamp first, then item id ascending.
//! - Parameter problems never fail a query; they normalize to defaults.
//! - Same items + same query always yield the same page.

use crate::feed::index::{timestamp_index, EventKind, TimestampEntry};
use crate::model::item::Item;
use crate::model::timestamp::parse_timestamp_exact;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use std::cmp::Ordering;

pub const DEFAULT_SORT: &str = "created";
pub const FEED_DEFAULT_LIMIT: u32 = 20;
pub const FEED_LIMIT_MAX: u32 = 100;

/// Sort direction. Anything other than `asc` reads as descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Lenient parse: only a (case-insensitive) `asc` selects ascending.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some(raw) if raw.trim().eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }
}

/// Raw, unvalidated feed parameters as they arrive from a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedParams {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub limit: Option<String>,
    pub start: Option<String>,
}

impl FeedParams {
    /// Collects parameters from raw key/value pairs.
    ///
    /// The first occurrence of a key wins; unknown keys are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "sort" => &mut params.sort,
                "order" => &mut params.order,
                "limit" => &mut params.limit,
                "start" => &mut params.start,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        params
    }
}

/// Normalized feed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// Event kind to sort and select by. Arbitrary strings are allowed.
    pub sort: String,
    pub order: SortOrder,
    /// Exclusive timestamp boundary of the page.
    pub cursor: Option<DateTime<Utc>>,
    /// Page size, always within `1..=FEED_LIMIT_MAX`.
    pub limit: u32,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            sort: DEFAULT_SORT.to_string(),
            order: SortOrder::Desc,
            cursor: None,
            limit: FEED_DEFAULT_LIMIT,
        }
    }
}

impl FeedQuery {
    /// Builds a query from raw parameters, replacing anything invalid with
    /// its default.
    pub fn from_params(params: &FeedParams) -> Self {
        let sort = params
            .sort
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_SORT)
            .to_string();

        Self {
            sort,
            order: SortOrder::parse_lenient(params.order.as_deref()),
            cursor: params.start.as_deref().and_then(parse_timestamp_exact),
            limit: normalize_feed_limit(parse_limit(params.limit.as_deref())),
        }
    }

    pub fn sorted_by(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<DateTime<Utc>>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = normalize_feed_limit(Some(limit));
        self
    }

    fn admits(&self, timestamp: DateTime<Utc>) -> bool {
        match (self.cursor, self.order) {
            (None, _) => true,
            (Some(cursor), SortOrder::Desc) => timestamp < cursor,
            (Some(cursor), SortOrder::Asc) => timestamp > cursor,
        }
    }

    fn compare(&self, left: &TimestampEntry, right: &TimestampEntry) -> Ordering {
        let by_time = match self.order {
            SortOrder::Asc => left.timestamp.cmp(&right.timestamp),
            SortOrder::Desc => right.timestamp.cmp(&left.timestamp),
        };
        by_time.then_with(|| left.item_id.cmp(&right.item_id))
    }
}

/// One page of feed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    pub entries: Vec<TimestampEntry>,
    /// True when more candidates exist past this page.
    pub has_more: bool,
}

impl FeedPage {
    /// Cursor that continues after this page, when there is one.
    ///
    /// The cursor boundary is exclusive, so the last timestamp itself is the
    /// correct value in both directions.
    pub fn next_start(&self) -> Option<DateTime<Utc>> {
        if !self.has_more {
            return None;
        }
        self.entries.last().map(|entry| entry.timestamp)
    }
}

/// Parses a raw limit value. Non-numeric input yields `None`.
pub fn parse_limit(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

/// Normalizes a feed limit: missing or non-positive -> 20, above 100 -> 100.
pub fn normalize_feed_limit(limit: Option<i64>) -> u32 {
    match limit {
        Some(value) if value <= 0 => FEED_DEFAULT_LIMIT,
        Some(value) if value > i64::from(FEED_LIMIT_MAX) => FEED_LIMIT_MAX,
        Some(value) => u32::try_from(value).unwrap_or(FEED_DEFAULT_LIMIT),
        None => FEED_DEFAULT_LIMIT,
    }
}

/// Picks the entry of `sort` kind for one item, falling back to `created`.
pub fn select_entry(item: &Item, sort: &str) -> TimestampEntry {
    timestamp_index(item)
        .into_iter()
        .find(|entry| entry.event_kind.as_str() == sort)
        .unwrap_or_else(|| TimestampEntry::new(item.id.as_str(), EventKind::Created, item.created_date))
}

/// Runs one feed query over a snapshot of items.
///
/// Deleted items are skipped. Each remaining item yields exactly one
/// candidate; candidates are cursor-filtered, ordered and cut to `limit`.
pub fn query_feed<'a, I>(items: I, query: &FeedQuery) -> FeedPage
where
    I: IntoIterator<Item = &'a Item>,
{
    let mut candidates: Vec<TimestampEntry> = items
        .into_iter()
        .filter(|item| item.is_active())
        .map(|item| select_entry(item, query.sort.as_str()))
        .filter(|entry| query.admits(entry.timestamp))
        .collect();

    candidates.sort_by(|left, right| query.compare(left, right));

    let total = candidates.len();
    let limit = query.limit as usize;
    let has_more = total > limit;
    candidates.truncate(limit);

    debug!(
        "event=feed_query module=feed status=ok sort={} order={} cursor={} limit={} candidates={} returned={} has_more={}",
        query.sort,
        query.order.as_str(),
        query.cursor.is_some(),
        query.limit,
        total,
        candidates.len(),
        has_more
    );

    FeedPage {
        entries: candidates,
        has_more,
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_feed_limit, parse_limit, FeedParams, FeedQuery, SortOrder};

    #[test]
    fn limit_normalization_matches_contract() {
        assert_eq!(normalize_feed_limit(None), 20);
        assert_eq!(normalize_feed_limit(Some(0)), 20);
        assert_eq!(normalize_feed_limit(Some(-5)), 20);
        assert_eq!(normalize_feed_limit(Some(1)), 1);
        assert_eq!(normalize_feed_limit(Some(100)), 100);
        assert_eq!(normalize_feed_limit(Some(999)), 100);
    }

    #[test]
    fn parse_limit_rejects_non_numeric() {
        assert_eq!(parse_limit(Some("abc")), None);
        assert_eq!(parse_limit(Some("2.5")), None);
        assert_eq!(parse_limit(Some(" 7 ")), Some(7));
        assert_eq!(parse_limit(None), None);
    }

    #[test]
    fn order_defaults_to_desc() {
        assert_eq!(SortOrder::parse_lenient(None), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient(Some("sideways")), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient(Some("DESC")), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient(Some("ASC")), SortOrder::Asc);
    }

    #[test]
    fn from_params_normalizes_everything() {
        let query = FeedQuery::from_params(&FeedParams {
            sort: Some("  ".to_string()),
            order: Some("up".to_string()),
            limit: Some("nope".to_string()),
            start: Some("not-a-date".to_string()),
        });
        assert_eq!(query, FeedQuery::default());
    }

    #[test]
    fn from_pairs_keeps_first_occurrence_and_skips_unknown_keys() {
        let params = FeedParams::from_pairs([
            ("order", "asc"),
            ("order", "desc"),
            ("page", "3"),
            ("limit", "5"),
        ]);
        assert_eq!(params.order.as_deref(), Some("asc"));
        assert_eq!(params.limit.as_deref(), Some("5"));
        assert_eq!(params.sort, None);
        assert_eq!(params.start, None);
    }

    #[test]
    fn from_params_keeps_arbitrary_sort_kind() {
        let query = FeedQuery::from_params(&FeedParams {
            sort: Some("birthday".to_string()),
            ..FeedParams::default()
        });
        assert_eq!(query.sort, "birthday");
    }
}
