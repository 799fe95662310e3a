//! Item use-case service.
//!
//! # Responsibility
//! - Provide create/update/lifecycle entry points for every item kind.
//! - Own identity generation and `createdDate`/`updatedDate` stamping.
//! - Upsert externally exported items (bulk import / contact sync).
//!
//! # Invariants
//! - Service APIs never bypass repository validation.
//! - Every content mutation moves `updated_date` forward (never backward).
//! - Task-only operations reject non-task items.

use crate::model::item::{
    ContactDetails, Item, ItemDetails, ItemDraft, ItemId, ItemValidationError, TaskDetails,
};
use crate::model::timestamp::now_millis;
use crate::repo::item_repo::{ItemListQuery, ItemRepository, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Time source used to stamp item lifecycle dates.
pub type Clock = fn() -> DateTime<Utc>;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for item use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input violates an item invariant.
    Validation(ItemValidationError),
    /// Target item does not exist (or is soft-deleted).
    ItemNotFound(ItemId),
    /// Operation only applies to task items.
    NotATask(ItemId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::NotATask(id) => write!(f, "item is not a task: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::ItemNotFound(_) | Self::NotATask(_) => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::ItemNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ItemValidationError> for ServiceError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Counts reported by [`ItemService::import_items`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

/// Use-case service wrapper for item operations.
pub struct ItemService<R: ItemRepository> {
    repo: R,
    clock: Clock,
}

impl<R: ItemRepository> ItemService<R> {
    /// Creates a service stamping dates with the wall clock.
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, now_millis)
    }

    /// Creates a service with an explicit time source.
    pub fn with_clock(repo: R, clock: Clock) -> Self {
        Self { repo, clock }
    }

    /// Creates an item from client content with a fresh id.
    pub fn create(&self, draft: ItemDraft) -> ServiceResult<Item> {
        let mut item = Item::with_id(
            Uuid::new_v4().to_string(),
            draft.details,
            draft.title,
            (self.clock)(),
        )?;
        item.body = draft.body;
        item.refs = draft.refs;
        self.repo.create_item(&item)?;

        info!(
            "event=item_create module=service status=ok kind={} id={}",
            item.kind(),
            item.id
        );
        Ok(item)
    }

    pub fn create_note(
        &self,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> ServiceResult<Item> {
        self.create(ItemDraft::new(ItemDetails::Note, title).with_body(body))
    }

    /// Creates an open task, optionally with a due date.
    pub fn create_task(
        &self,
        title: impl Into<String>,
        due_date: Option<DateTime<Utc>>,
    ) -> ServiceResult<Item> {
        let details = ItemDetails::Task(TaskDetails {
            due_date,
            done_date: None,
        });
        self.create(ItemDraft::new(details, title))
    }

    pub fn create_contact(
        &self,
        name: impl Into<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> ServiceResult<Item> {
        let details = ItemDetails::Contact(ContactDetails { email, phone });
        self.create(ItemDraft::new(details, name))
    }

    /// Gets one active item by id.
    pub fn get(&self, id: &str) -> ServiceResult<Item> {
        self.repo
            .get_item(id, false)?
            .ok_or_else(|| ServiceError::ItemNotFound(id.to_string()))
    }

    /// Lists items using filter and pagination options.
    pub fn list(&self, query: &ItemListQuery) -> RepoResult<Vec<Item>> {
        self.repo.list_items(query)
    }

    /// Replaces the content (kind payload, title, body, refs) of an item.
    ///
    /// Identity, `created_date` and tombstone state are kept.
    pub fn update(&self, id: &str, draft: ItemDraft) -> ServiceResult<Item> {
        self.modify(id, |item| {
            item.details = draft.details;
            item.title = draft.title;
            item.body = draft.body;
            item.refs = draft.refs;
            Ok(())
        })
    }

    /// Stamps `done_date` on a task.
    pub fn complete_task(&self, id: &str) -> ServiceResult<Item> {
        let now = (self.clock)();
        self.modify(id, |item| {
            task_of(item)?.done_date = Some(now);
            Ok(())
        })
    }

    /// Clears `done_date` on a task.
    pub fn reopen_task(&self, id: &str) -> ServiceResult<Item> {
        self.modify(id, |item| {
            task_of(item)?.done_date = None;
            Ok(())
        })
    }

    pub fn set_due_date(&self, id: &str, due_date: Option<DateTime<Utc>>) -> ServiceResult<Item> {
        self.modify(id, |item| {
            task_of(item)?.due_date = due_date;
            Ok(())
        })
    }

    /// Replaces the ordered reference list of an item.
    pub fn set_refs(&self, id: &str, refs: Vec<ItemId>) -> ServiceResult<Item> {
        self.modify(id, |item| {
            item.refs = refs;
            Ok(())
        })
    }

    /// Soft-deletes an item by id.
    pub fn soft_delete(&self, id: &str) -> ServiceResult<()> {
        self.repo.soft_delete_item(id)?;
        info!("event=item_delete module=service status=ok id={id}");
        Ok(())
    }

    /// Clears the tombstone of a soft-deleted item.
    pub fn restore(&self, id: &str) -> ServiceResult<Item> {
        let mut item = self
            .repo
            .get_item(id, true)?
            .ok_or_else(|| ServiceError::ItemNotFound(id.to_string()))?;
        item.restore();
        self.repo.update_item(&item)?;
        Ok(item)
    }

    /// Upserts exported items as-is, keeping their ids and dates.
    ///
    /// Items are applied one by one; a failure stops the import and leaves
    /// earlier items applied.
    pub fn import_items(
        &self,
        items: impl IntoIterator<Item = Item>,
    ) -> ServiceResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        for item in items {
            if self.repo.get_item(&item.id, true)?.is_some() {
                self.repo.update_item(&item)?;
                summary.updated += 1;
            } else {
                self.repo.create_item(&item)?;
                summary.created += 1;
            }
        }

        info!(
            "event=item_import module=service status=ok created={} updated={}",
            summary.created, summary.updated
        );
        Ok(summary)
    }

    fn modify(
        &self,
        id: &str,
        change: impl FnOnce(&mut Item) -> ServiceResult<()>,
    ) -> ServiceResult<Item> {
        let mut item = self.get(id)?;
        change(&mut item)?;
        item.touch((self.clock)());
        self.repo.update_item(&item)?;

        info!(
            "event=item_update module=service status=ok kind={} id={}",
            item.kind(),
            item.id
        );
        Ok(item)
    }
}

fn task_of(item: &mut Item) -> ServiceResult<&mut TaskDetails> {
    let id = item.id.clone();
    item.task_mut().ok_or(ServiceError::NotATask(id))
}
