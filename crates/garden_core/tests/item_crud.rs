use chrono::{DateTime, TimeZone, Utc};
use garden_core::db::migrations::latest_version;
use garden_core::db::open_db_in_memory;
use garden_core::{
    ContactDetails, Item, ItemDetails, ItemKind, ItemListQuery, ItemRepository, RepoError,
    SqliteItemRepository, TaskDetails,
};
use rusqlite::Connection;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, day, hour, 0, 0).unwrap()
}

fn note(id: &str, created: DateTime<Utc>) -> Item {
    Item::with_id(id, ItemDetails::Note, format!("note {id}"), created).unwrap()
}

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let mut item = note("n1", at(1, 10));
    item.body = "first body".to_string();
    item.refs = vec!["n9".to_string(), "n3".to_string()];
    let id = repo.create_item(&item).unwrap();

    let loaded = repo.get_item(&id, false).unwrap().unwrap();
    assert_eq!(loaded, item);
}

#[test]
fn task_and_contact_fields_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let task = Item::with_id(
        "t1",
        ItemDetails::Task(TaskDetails {
            due_date: Some(at(5, 9)),
            done_date: None,
        }),
        "ship it",
        at(1, 10),
    )
    .unwrap();
    let contact = Item::with_id(
        "c1",
        ItemDetails::Contact(ContactDetails {
            email: Some("grace@example.org".to_string()),
            phone: Some("+1 555 0100".to_string()),
        }),
        "Grace Hopper",
        at(2, 10),
    )
    .unwrap();
    repo.create_item(&task).unwrap();
    repo.create_item(&contact).unwrap();

    assert_eq!(repo.get_item("t1", false).unwrap().unwrap(), task);
    assert_eq!(repo.get_item("c1", false).unwrap().unwrap(), contact);
}

#[test]
fn update_existing_item_replaces_content_and_refs() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let mut item = note("n1", at(1, 10));
    item.refs = vec!["a".to_string(), "b".to_string()];
    repo.create_item(&item).unwrap();

    item.details = ItemDetails::Task(TaskDetails::default());
    item.title = "now a task".to_string();
    item.refs = vec!["b".to_string()];
    item.updated_date = at(2, 10);
    repo.update_item(&item).unwrap();

    let loaded = repo.get_item("n1", false).unwrap().unwrap();
    assert_eq!(loaded.kind(), ItemKind::Task);
    assert_eq!(loaded.title, "now a task");
    assert_eq!(loaded.refs, vec!["b".to_string()]);
    assert_eq!(loaded.updated_date, at(2, 10));
}

#[test]
fn update_not_found_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let item = note("missing", at(1, 10));
    let err = repo.update_item(&item).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == "missing"));
}

#[test]
fn list_excludes_deleted_by_default_and_can_include_them() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    repo.create_item(&note("active", at(1, 10))).unwrap();
    repo.create_item(&note("gone", at(2, 10))).unwrap();
    repo.soft_delete_item("gone").unwrap();

    let visible = repo.list_items(&ItemListQuery::active()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "active");

    let include_deleted = ItemListQuery {
        include_deleted: true,
        ..ItemListQuery::default()
    };
    let all = repo.list_items(&include_deleted).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn soft_delete_is_idempotent_and_hides_item() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    repo.create_item(&note("n1", at(1, 10))).unwrap();
    repo.soft_delete_item("n1").unwrap();
    repo.soft_delete_item("n1").unwrap();

    assert!(repo.get_item("n1", false).unwrap().is_none());
    let deleted = repo.get_item("n1", true).unwrap().unwrap();
    assert!(deleted.deleted);
}

#[test]
fn soft_delete_unknown_item_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let err = repo.soft_delete_item("nope").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == "nope"));
}

#[test]
fn validation_failure_blocks_create_and_update() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let mut invalid = note("n1", at(1, 10));
    invalid.title = String::new();
    let create_err = repo.create_item(&invalid).unwrap_err();
    assert!(matches!(create_err, RepoError::Validation(_)));

    let mut valid = note("n2", at(1, 10));
    repo.create_item(&valid).unwrap();
    valid.refs = vec!["n2".to_string()];
    let update_err = repo.update_item(&valid).unwrap_err();
    assert!(matches!(update_err, RepoError::Validation(_)));
}

#[test]
fn list_filters_by_kind() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    repo.create_item(&note("n1", at(1, 10))).unwrap();
    let task = Item::with_id(
        "t1",
        ItemDetails::Task(TaskDetails::default()),
        "task",
        at(2, 10),
    )
    .unwrap();
    repo.create_item(&task).unwrap();

    let result = repo.list_items(&ItemListQuery::of_kind(ItemKind::Task)).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].id, "t1");
}

#[test]
fn list_pagination_with_limit_and_offset_is_stable() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    for id in ["c", "a", "b"] {
        repo.create_item(&note(id, at(1, 10))).unwrap();
    }

    let query = ItemListQuery {
        limit: Some(2),
        offset: 1,
        ..ItemListQuery::default()
    };
    let page = repo.list_items(&query).unwrap();
    let ids: Vec<_> = page.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);

    let offset_only = ItemListQuery {
        offset: 2,
        ..ItemListQuery::default()
    };
    let tail = repo.list_items(&offset_only).unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].id, "c");
}

#[test]
fn read_rejects_task_dates_on_note_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    repo.create_item(&note("n1", at(1, 10))).unwrap();
    conn.execute("UPDATE items SET due_at = 1672531200000 WHERE id = 'n1';", [])
        .unwrap();

    let err = repo.get_item("n1", false).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteItemRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_required_items_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteItemRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("items"))
    ));
}

#[test]
fn repository_rejects_connection_missing_required_items_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE items (
            id TEXT PRIMARY KEY NOT NULL,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            due_at INTEGER,
            done_at INTEGER,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE item_refs (
            item_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            ref_id TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteItemRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "items",
            column: "email"
        })
    ));
}

#[test]
fn list_attaches_refs_in_order_across_many_items() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();

    let count = 520;
    for index in 0..count {
        let mut item = note(&format!("n{index:04}"), at(1, 10));
        if index > 0 {
            item.refs = vec![format!("n{:04}", index - 1), "shared".to_string()];
        }
        repo.create_item(&item).unwrap();
    }

    let listed = repo.list_items(&ItemListQuery::default()).unwrap();
    assert_eq!(listed.len(), count);
    for item in &listed {
        let index: usize = item.id[1..].parse().unwrap();
        if index == 0 {
            assert!(item.refs.is_empty());
        } else {
            assert_eq!(
                item.refs,
                vec![format!("n{:04}", index - 1), "shared".to_string()]
            );
        }
    }

    let paged = ItemListQuery {
        limit: Some(3),
        offset: 10,
        ..ItemListQuery::default()
    };
    for item in repo.list_items(&paged).unwrap() {
        assert_eq!(item, repo.get_item(&item.id, false).unwrap().unwrap());
    }
}
