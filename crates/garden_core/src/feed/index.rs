//! Timestamp index derivation.
//!
//! # Responsibility
//! - Project one item into its timestamp entries, one per non-null date
//!   field.
//!
//! # Invariants
//! - Event kind name is the date field name without its `Date` suffix.
//! - `created` and `updated` entries exist for every item.
//! - `due` and `done` entries only come from task items.
//! - Pure function of the item; entries are never stored.

use crate::model::item::{Item, ItemDetails, ItemId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter};

const DATE_FIELD_SUFFIX: &str = "Date";

/// Named category of timestamp on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Due,
    Done,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [Self::Created, Self::Updated, Self::Due, Self::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Due => "due",
            Self::Done => "done",
        }
    }

    /// Wire name of the item field this kind is derived from.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Created => "createdDate",
            Self::Updated => "updatedDate",
            Self::Due => "dueDate",
            Self::Done => "doneDate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Maps a date field name (`dueDate`) to its event kind (`due`).
    pub fn from_field_name(field: &str) -> Option<Self> {
        field.strip_suffix(DATE_FIELD_SUFFIX).and_then(Self::parse)
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived `(item_id, event_kind, timestamp)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampEntry {
    pub item_id: ItemId,
    pub event_kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl TimestampEntry {
    pub fn new(item_id: impl Into<ItemId>, event_kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            event_kind,
            timestamp,
        }
    }
}

/// Returns the timestamp entries of one item in `created, updated, due, done`
/// order, skipping null fields.
pub fn timestamp_index(item: &Item) -> Vec<TimestampEntry> {
    let mut entries = vec![
        TimestampEntry::new(item.id.as_str(), EventKind::Created, item.created_date),
        TimestampEntry::new(item.id.as_str(), EventKind::Updated, item.updated_date),
    ];

    match &item.details {
        ItemDetails::Task(task) => {
            let task_dates = [(EventKind::Due, task.due_date), (EventKind::Done, task.done_date)];
            for (kind, value) in task_dates {
                if let Some(timestamp) = value {
                    entries.push(TimestampEntry::new(item.id.as_str(), kind, timestamp));
                }
            }
        }
        ItemDetails::Note | ItemDetails::Contact(_) => {}
    }

    entries
}
