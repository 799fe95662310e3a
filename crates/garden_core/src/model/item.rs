//! Item domain model.
//!
//! # Responsibility
//! - Define the canonical record behind every timeline entry.
//! - Keep kind-specific fields inside a closed sum type so consumers match
//!   exhaustively on `kind`.
//!
//! # Invariants
//! - `id` is stable and never reused for another item.
//! - `created_date` and `updated_date` are always present.
//! - Only task items carry `due_date`/`done_date`; on tasks they are
//!   serialized as `null` when absent, never omitted.
//! - `refs` is ordered and unique by id, and never contains the item itself.
//! - `deleted` is the source of truth for tombstone state.

use crate::model::timestamp::{self, now_millis};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Maximum title length in characters.
pub const TITLE_MAX_CHARS: usize = 500;
/// Maximum body length in characters.
pub const BODY_MAX_CHARS: usize = 10_000;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Stable item identifier.
///
/// Items created locally get a UUID v4 string; imported items keep the id
/// they were exported with.
pub type ItemId = String;

/// Discriminant of [`ItemDetails`], used for filters and storage columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Note,
    Task,
    Contact,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Task => "task",
            Self::Contact => "contact",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(Self::Note),
            "task" => Some(Self::Task),
            "contact" => Some(Self::Contact),
            _ => None,
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload, tagged on the wire by `kind`.
///
/// Fields that do not belong to the tagged kind are ignored on input, so a
/// stray `dueDate` on a note never reaches the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDetails {
    /// Free-form markdown note.
    Note,
    /// Actionable task with optional due/done dates.
    Task(TaskDetails),
    /// Address book entry.
    Contact(ContactDetails),
}

impl ItemDetails {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Note => ItemKind::Note,
            Self::Task(_) => ItemKind::Task,
            Self::Contact(_) => ItemKind::Contact,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    #[serde(default, with = "timestamp::rfc3339_opt")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::rfc3339_opt")]
    pub done_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Validation failures for [`Item`] invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    EmptyId,
    EmptyTitle,
    TitleTooLong { chars: usize },
    BodyTooLong { chars: usize },
    DuplicateRef(ItemId),
    SelfRef(ItemId),
    InvalidEmail(String),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "item id must not be empty"),
            Self::EmptyTitle => write!(f, "title must not be blank"),
            Self::TitleTooLong { chars } => {
                write!(f, "title has {chars} chars, limit is {TITLE_MAX_CHARS}")
            }
            Self::BodyTooLong { chars } => {
                write!(f, "body has {chars} chars, limit is {BODY_MAX_CHARS}")
            }
            Self::DuplicateRef(id) => write!(f, "duplicate ref `{id}`"),
            Self::SelfRef(id) => write!(f, "item `{id}` must not reference itself"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
        }
    }
}

impl Error for ItemValidationError {}

/// Canonical record for note/task/contact data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawItem")]
pub struct Item {
    pub id: ItemId,
    #[serde(flatten)]
    pub details: ItemDetails,
    pub title: String,
    pub body: String,
    #[serde(with = "timestamp::rfc3339")]
    pub created_date: DateTime<Utc>,
    #[serde(with = "timestamp::rfc3339")]
    pub updated_date: DateTime<Utc>,
    pub refs: Vec<ItemId>,
    pub deleted: bool,
}

/// Unvalidated wire shape; converted through [`Item::validate`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    id: ItemId,
    #[serde(flatten)]
    details: ItemDetails,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(with = "timestamp::rfc3339")]
    created_date: DateTime<Utc>,
    #[serde(with = "timestamp::rfc3339")]
    updated_date: DateTime<Utc>,
    #[serde(default)]
    refs: Vec<ItemId>,
    #[serde(default)]
    deleted: bool,
}

impl TryFrom<RawItem> for Item {
    type Error = ItemValidationError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let item = Self {
            id: raw.id,
            details: raw.details,
            title: raw.title,
            body: raw.body,
            created_date: raw.created_date,
            updated_date: raw.updated_date,
            refs: raw.refs,
            deleted: raw.deleted,
        };
        item.validate()?;
        Ok(item)
    }
}

impl Item {
    /// Creates a new item with a generated id, stamped with the current time.
    pub fn new(details: ItemDetails, title: impl Into<String>) -> Result<Self, ItemValidationError> {
        Self::with_id(Uuid::new_v4().to_string(), details, title, now_millis())
    }

    /// Creates an item with a caller-provided id and creation time.
    ///
    /// `updated_date` starts equal to `created_date`. Used by import paths
    /// and by tests that need deterministic timelines.
    pub fn with_id(
        id: impl Into<ItemId>,
        details: ItemDetails,
        title: impl Into<String>,
        created_date: DateTime<Utc>,
    ) -> Result<Self, ItemValidationError> {
        let created_date = timestamp::truncate_millis(created_date);
        let item = Self {
            id: id.into(),
            details,
            title: title.into(),
            body: String::new(),
            created_date,
            updated_date: created_date,
            refs: Vec::new(),
            deleted: false,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn kind(&self) -> ItemKind {
        self.details.kind()
    }

    /// Task payload, when this item is a task.
    pub fn task(&self) -> Option<&TaskDetails> {
        match &self.details {
            ItemDetails::Task(task) => Some(task),
            ItemDetails::Note | ItemDetails::Contact(_) => None,
        }
    }

    pub fn task_mut(&mut self) -> Option<&mut TaskDetails> {
        match &mut self.details {
            ItemDetails::Task(task) => Some(task),
            ItemDetails::Note | ItemDetails::Contact(_) => None,
        }
    }

    /// Checks every model invariant.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id.trim().is_empty() {
            return Err(ItemValidationError::EmptyId);
        }

        if self.title.trim().is_empty() {
            return Err(ItemValidationError::EmptyTitle);
        }
        let title_chars = self.title.chars().count();
        if title_chars > TITLE_MAX_CHARS {
            return Err(ItemValidationError::TitleTooLong { chars: title_chars });
        }

        let body_chars = self.body.chars().count();
        if body_chars > BODY_MAX_CHARS {
            return Err(ItemValidationError::BodyTooLong { chars: body_chars });
        }

        let mut seen = HashSet::with_capacity(self.refs.len());
        for reference in &self.refs {
            if reference == &self.id {
                return Err(ItemValidationError::SelfRef(reference.clone()));
            }
            if !seen.insert(reference.as_str()) {
                return Err(ItemValidationError::DuplicateRef(reference.clone()));
            }
        }

        if let ItemDetails::Contact(contact) = &self.details {
            if let Some(email) = contact.email.as_deref() {
                if !EMAIL_RE.is_match(email) {
                    return Err(ItemValidationError::InvalidEmail(email.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Records a modification at `now`. Never moves `updated_date` backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let now = timestamp::truncate_millis(now);
        if now > self.updated_date {
            self.updated_date = now;
        }
    }

    /// Marks this item as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }

    /// Clears soft delete flag.
    pub fn restore(&mut self) {
        self.deleted = false;
    }

    /// Returns whether this item should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}

/// Client-provided item content for create and full-replace updates.
///
/// Identity and lifecycle dates are owned by the service layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    #[serde(flatten)]
    pub details: ItemDetails,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub refs: Vec<ItemId>,
}

impl ItemDraft {
    pub fn new(details: ItemDetails, title: impl Into<String>) -> Self {
        Self {
            details,
            title: title.into(),
            body: String::new(),
            refs: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_refs(mut self, refs: Vec<ItemId>) -> Self {
        self.refs = refs;
        self
    }
}
