//! Item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and enumeration APIs over the `items` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Item::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Timestamps are stored as epoch milliseconds.
//! - Refs are replaced as a whole and read back in stored order.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::item::{
    ContactDetails, Item, ItemDetails, ItemId, ItemKind, ItemValidationError, TaskDetails,
};
use crate::model::timestamp::from_epoch_millis;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    kind,
    title,
    body,
    created_at,
    updated_at,
    due_at,
    done_at,
    email,
    phone,
    is_deleted
FROM items";

const REQUIRED_ITEM_COLUMNS: &[&str] = &[
    "id",
    "kind",
    "title",
    "body",
    "created_at",
    "updated_at",
    "due_at",
    "done_at",
    "email",
    "phone",
    "is_deleted",
];

const REFS_BATCH_SIZE: usize = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    NotFound(ItemId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it through db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemListQuery {
    pub kind: Option<ItemKind>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ItemListQuery {
    /// All non-deleted items of every kind; the feed snapshot.
    pub fn active() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: ItemKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}

/// Repository interface for item CRUD operations.
pub trait ItemRepository {
    fn create_item(&self, item: &Item) -> RepoResult<ItemId>;
    fn update_item(&self, item: &Item) -> RepoResult<()>;
    fn get_item(&self, id: &str, include_deleted: bool) -> RepoResult<Option<Item>>;
    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<Item>>;
    fn soft_delete_item(&self, id: &str) -> RepoResult<()>;
}

impl<R: ItemRepository + ?Sized> ItemRepository for &R {
    fn create_item(&self, item: &Item) -> RepoResult<ItemId> {
        (**self).create_item(item)
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        (**self).update_item(item)
    }

    fn get_item(&self, id: &str, include_deleted: bool) -> RepoResult<Option<Item>> {
        (**self).get_item(id, include_deleted)
    }

    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<Item>> {
        (**self).list_items(query)
    }

    fn soft_delete_item(&self, id: &str) -> RepoResult<()> {
        (**self).soft_delete_item(id)
    }
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Wraps a connection after checking it was migrated by `db::open_db`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        for table in ["items", "item_refs"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        for &column in REQUIRED_ITEM_COLUMNS {
            if !table_has_column(conn, "items", column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: "items",
                    column,
                });
            }
        }

        Ok(Self { conn })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_item(&self, item: &Item) -> RepoResult<ItemId> {
        item.validate()?;
        let columns = ItemColumns::from_item(item);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO items (
                id,
                kind,
                title,
                body,
                created_at,
                updated_at,
                due_at,
                done_at,
                email,
                phone,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                item.id.as_str(),
                item.kind().as_str(),
                item.title.as_str(),
                item.body.as_str(),
                item.created_date.timestamp_millis(),
                item.updated_date.timestamp_millis(),
                columns.due_at,
                columns.done_at,
                columns.email,
                columns.phone,
                bool_to_int(item.deleted),
            ],
        )?;
        replace_refs(&tx, item)?;
        tx.commit()?;

        Ok(item.id.clone())
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;
        let columns = ItemColumns::from_item(item);

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE items
             SET
                kind = ?1,
                title = ?2,
                body = ?3,
                created_at = ?4,
                updated_at = ?5,
                due_at = ?6,
                done_at = ?7,
                email = ?8,
                phone = ?9,
                is_deleted = ?10
             WHERE id = ?11;",
            params![
                item.kind().as_str(),
                item.title.as_str(),
                item.body.as_str(),
                item.created_date.timestamp_millis(),
                item.updated_date.timestamp_millis(),
                columns.due_at,
                columns.done_at,
                columns.email,
                columns.phone,
                bool_to_int(item.deleted),
                item.id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(item.id.clone()));
        }

        replace_refs(&tx, item)?;
        tx.commit()?;
        Ok(())
    }

    fn get_item(&self, id: &str, include_deleted: bool) -> RepoResult<Option<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id, bool_to_int(include_deleted)])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut item = parse_item_row(row)?;
        item.refs = load_refs(self.conn, &item.id)?;
        item.validate()?;
        Ok(Some(item))
    }

    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<Item>> {
        let mut sql = format!("{ITEM_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }

        if let Some(kind) = query.kind {
            sql.push_str(" AND kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        match (query.limit, query.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                bind_values.push(Value::Integer(i64::from(limit)));
                bind_values.push(Value::Integer(i64::from(offset)));
            }
            (None, 0) => {}
            (None, offset) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                bind_values.push(Value::Integer(i64::from(offset)));
            }
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }

        let mut refs_by_item = {
            let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
            load_refs_batch(self.conn, &ids)?
        };
        for item in &mut items {
            if let Some(refs) = refs_by_item.remove(&item.id) {
                item.refs = refs;
            }
            item.validate()?;
        }

        Ok(items)
    }

    fn soft_delete_item(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE items SET is_deleted = 1 WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }

        Ok(())
    }
}

/// Kind-specific columns flattened from `ItemDetails`.
struct ItemColumns<'a> {
    due_at: Option<i64>,
    done_at: Option<i64>,
    email: Option<&'a str>,
    phone: Option<&'a str>,
}

impl<'a> ItemColumns<'a> {
    fn from_item(item: &'a Item) -> Self {
        match &item.details {
            ItemDetails::Note => Self {
                due_at: None,
                done_at: None,
                email: None,
                phone: None,
            },
            ItemDetails::Task(task) => Self {
                due_at: task.due_date.map(|value| value.timestamp_millis()),
                done_at: task.done_date.map(|value| value.timestamp_millis()),
                email: None,
                phone: None,
            },
            ItemDetails::Contact(contact) => Self {
                due_at: None,
                done_at: None,
                email: contact.email.as_deref(),
                phone: contact.phone.as_deref(),
            },
        }
    }
}

fn replace_refs(conn: &Connection, item: &Item) -> RepoResult<()> {
    conn.execute("DELETE FROM item_refs WHERE item_id = ?1;", [item.id.as_str()])?;
    let mut stmt =
        conn.prepare("INSERT INTO item_refs (item_id, position, ref_id) VALUES (?1, ?2, ?3);")?;
    for (position, reference) in item.refs.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| RepoError::InvalidData(format!("too many refs on `{}`", item.id)))?;
        stmt.execute(params![item.id.as_str(), position, reference.as_str()])?;
    }
    Ok(())
}

fn load_refs(conn: &Connection, item_id: &str) -> RepoResult<Vec<ItemId>> {
    let mut stmt =
        conn.prepare("SELECT ref_id FROM item_refs WHERE item_id = ?1 ORDER BY position ASC;")?;
    let mut rows = stmt.query([item_id])?;
    let mut refs = Vec::new();
    while let Some(row) = rows.next()? {
        refs.push(row.get(0)?);
    }
    Ok(refs)
}

/// Refs of many items, keyed by item id, in stored order.
///
/// Ids are bound in chunks to stay under SQLite's variable limit.
fn load_refs_batch(
    conn: &Connection,
    item_ids: &[&str],
) -> RepoResult<HashMap<ItemId, Vec<ItemId>>> {
    let mut refs_by_item: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
    for chunk in item_ids.chunks(REFS_BATCH_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT item_id, ref_id
             FROM item_refs
             WHERE item_id IN ({placeholders})
             ORDER BY item_id ASC, position ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
        while let Some(row) = rows.next()? {
            let item_id: String = row.get(0)?;
            refs_by_item.entry(item_id).or_default().push(row.get(1)?);
        }
    }
    Ok(refs_by_item)
}

/// Parses the scalar columns of one row. Refs are attached and the item is
/// validated by the caller.
fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id: String = row.get("id")?;

    let kind_text: String = row.get("kind")?;
    let kind = ItemKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid item kind `{kind_text}` in items.kind"))
    })?;

    let due_at = parse_optional_millis(row, "due_at")?;
    let done_at = parse_optional_millis(row, "done_at")?;
    let email: Option<String> = row.get("email")?;
    let phone: Option<String> = row.get("phone")?;

    let details = match kind {
        ItemKind::Task => ItemDetails::Task(TaskDetails {
            due_date: due_at,
            done_date: done_at,
        }),
        ItemKind::Note | ItemKind::Contact if due_at.is_some() || done_at.is_some() => {
            return Err(RepoError::InvalidData(format!(
                "{kind} `{id}` carries task-only dates"
            )));
        }
        ItemKind::Note => ItemDetails::Note,
        ItemKind::Contact => ItemDetails::Contact(ContactDetails { email, phone }),
    };

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in items.is_deleted"
            )));
        }
    };

    Ok(Item {
        id,
        details,
        title: row.get("title")?,
        body: row.get("body")?,
        created_date: parse_required_millis(row, "created_at")?,
        updated_date: parse_required_millis(row, "updated_at")?,
        deleted: is_deleted,
        refs: Vec::new(),
    })
}

fn parse_required_millis(row: &Row<'_>, column: &str) -> RepoResult<DateTime<Utc>> {
    let millis: i64 = row.get(column)?;
    from_epoch_millis(millis).ok_or_else(|| {
        RepoError::InvalidData(format!("out of range timestamp `{millis}` in items.{column}"))
    })
}

fn parse_optional_millis(row: &Row<'_>, column: &str) -> RepoResult<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(column)? {
        Some(millis) => from_epoch_millis(millis).map(Some).ok_or_else(|| {
            RepoError::InvalidData(format!("out of range timestamp `{millis}` in items.{column}"))
        }),
        None => Ok(None),
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
