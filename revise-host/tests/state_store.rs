//! Integration tests for the SQLite review store.
//!
//! Exercises: open_db, migrate, save_state, load_state, delete_state,
//! list_documents, SqliteStateStore.

use std::collections::BTreeMap;

use revise_core::PersistedState;
use revise_host::{db, SqliteStateStore, StateStore};

fn temp_db_path() -> String {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.keep().join("state.db");
    path.to_string_lossy().to_string()
}

fn snapshot(accepted: &[usize], ignored: &[usize], options: &[(usize, usize)]) -> PersistedState {
    PersistedState {
        raw_json: r#"{"session_id":"s1","findings":[]}"#.to_owned(),
        accepted_indices: accepted.to_vec(),
        ignored_indices: ignored.to_vec(),
        accepted_option_by_index: options
            .iter()
            .map(|(index, option)| (index.to_string(), *option))
            .collect::<BTreeMap<_, _>>(),
        original_text: None,
    }
}

async fn decision_row_count(conn: &tokio_rusqlite::Connection) -> i64 {
    conn.call(|db| {
        Ok::<_, rusqlite::Error>(db.query_row(
            "SELECT COUNT(*) FROM finding_decisions",
            [],
            |r| r.get(0),
        )?)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn open_db_applies_schema_and_wal() {
    let path = temp_db_path();
    let conn = db::open_db(&path).await.unwrap();

    let version: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT MAX(version) FROM schema_version",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(version, 2, "schema_version should be 2");

    let journal: String = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row("PRAGMA journal_mode", [], |r| r.get(0))?)
        })
        .await
        .unwrap();
    assert_eq!(journal, "wal", "journal_mode should be wal");

    let pk_count: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('finding_decisions') WHERE pk > 0",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(pk_count, 2, "finding_decisions should have composite PK");

    let has_original: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('document_reviews')
                 WHERE name = 'original_text'",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(has_original, 1, "v2 adds document_reviews.original_text");

    // Re-opening must not migrate twice.
    drop(conn);
    let conn = db::open_db(&path).await.unwrap();
    let rows: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT COUNT(*) FROM schema_version",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(rows, 2);
}

#[tokio::test]
async fn v1_database_is_upgraded_in_place() {
    let path = temp_db_path();
    {
        let raw = rusqlite::Connection::open(&path).unwrap();
        raw.execute_batch(revise_host::schema::SCHEMA_VERSION_DDL).unwrap();
        raw.execute_batch(revise_host::schema::SCHEMA_V1_SQL).unwrap();
        raw.execute(
            "INSERT INTO document_reviews (id, document_path, raw_json, created_at, updated_at)
             VALUES ('r1', 'a.md', '{\"session_id\":\"s1\",\"findings\":[]}', 1, 1)",
            [],
        )
        .unwrap();
        raw.execute("INSERT INTO schema_version (version) VALUES (1)", []).unwrap();
    }

    let conn = db::open_db(&path).await.unwrap();
    let loaded = db::load_state(&conn, "a.md").await.unwrap().unwrap();
    assert_eq!(loaded.raw_json, r#"{"session_id":"s1","findings":[]}"#);
    assert_eq!(loaded.original_text, None);

    let version: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT MAX(version) FROM schema_version",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(version, 2);
}

#[tokio::test]
async fn unknown_document_has_no_state() {
    let conn = db::open_db(temp_db_path()).await.unwrap();
    assert_eq!(db::load_state(&conn, "notes/a.md").await.unwrap(), None);
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let conn = db::open_db(temp_db_path()).await.unwrap();
    let state = snapshot(&[0, 3], &[1], &[(2, 1)]);

    db::save_state(&conn, "notes/a.md", &state).await.unwrap();
    let loaded = db::load_state(&conn, "notes/a.md").await.unwrap().unwrap();

    assert_eq!(loaded, state);
}

#[tokio::test]
async fn original_text_round_trips_and_is_replaced_on_resave() {
    let conn = db::open_db(temp_db_path()).await.unwrap();
    let state = snapshot(&[0], &[], &[]).with_original("I saw the cat.");

    db::save_state(&conn, "a.md", &state).await.unwrap();
    let loaded = db::load_state(&conn, "a.md").await.unwrap().unwrap();
    assert_eq!(loaded.original_text.as_deref(), Some("I saw the cat."));
    assert_eq!(loaded, state);

    let cleared = snapshot(&[0], &[], &[]);
    db::save_state(&conn, "a.md", &cleared).await.unwrap();
    let loaded = db::load_state(&conn, "a.md").await.unwrap().unwrap();
    assert_eq!(loaded.original_text, None);
}

#[tokio::test]
async fn pending_findings_write_no_decision_rows() {
    let conn = db::open_db(temp_db_path()).await.unwrap();

    db::save_state(&conn, "a.md", &snapshot(&[], &[], &[])).await.unwrap();
    assert_eq!(decision_row_count(&conn).await, 0);

    db::save_state(&conn, "a.md", &snapshot(&[1], &[], &[(3, 0)])).await.unwrap();
    assert_eq!(decision_row_count(&conn).await, 2);

    let loaded = db::load_state(&conn, "a.md").await.unwrap().unwrap();
    assert_eq!(loaded.accepted_indices, vec![1]);
    assert!(loaded.ignored_indices.is_empty());
    assert_eq!(loaded.accepted_option_by_index.len(), 1);
}

#[tokio::test]
async fn overlapping_snapshot_is_normalized_on_save() {
    let conn = db::open_db(temp_db_path()).await.unwrap();
    // 2 is listed as a plain accept and as an option accept; 0 as accept and ignore.
    let state = snapshot(&[0, 2], &[0, 4], &[(2, 1)]);

    db::save_state(&conn, "a.md", &state).await.unwrap();
    let loaded = db::load_state(&conn, "a.md").await.unwrap().unwrap();

    assert_eq!(loaded.accepted_indices, vec![0]);
    assert_eq!(loaded.ignored_indices, vec![4]);
    assert_eq!(loaded.accepted_option_by_index.get("2"), Some(&1));
}

#[tokio::test]
async fn resaving_replaces_decisions_and_keeps_review_id() {
    let conn = db::open_db(temp_db_path()).await.unwrap();

    db::save_state(&conn, "a.md", &snapshot(&[0, 1], &[2], &[])).await.unwrap();
    let first_id: String = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT id FROM document_reviews WHERE document_path = 'a.md'",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();

    let mut fresh = snapshot(&[], &[], &[]);
    fresh.raw_json = r#"{"session_id":"s2","findings":[]}"#.to_owned();
    db::save_state(&conn, "a.md", &fresh).await.unwrap();

    let loaded = db::load_state(&conn, "a.md").await.unwrap().unwrap();
    assert_eq!(loaded, fresh, "stale decisions must be removed");

    let (second_id, decisions): (String, i64) = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT r.id, (SELECT COUNT(*) FROM finding_decisions)
                 FROM document_reviews r WHERE r.document_path = 'a.md'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(second_id, first_id);
    assert_eq!(decisions, 0);
}

#[tokio::test]
async fn state_survives_reopen() {
    let path = temp_db_path();
    {
        let conn = db::open_db(&path).await.unwrap();
        db::save_state(&conn, "a.md", &snapshot(&[1], &[], &[(0, 2)])).await.unwrap();
    }

    let conn = db::open_db(&path).await.unwrap();
    let loaded = db::load_state(&conn, "a.md").await.unwrap().unwrap();
    assert_eq!(loaded.accepted_indices, vec![1]);
    assert_eq!(loaded.accepted_option_by_index.get("0"), Some(&2));
}

#[tokio::test]
async fn list_and_delete() {
    let conn = db::open_db(temp_db_path()).await.unwrap();
    db::save_state(&conn, "a.md", &snapshot(&[0], &[1], &[])).await.unwrap();
    db::save_state(&conn, "b.md", &snapshot(&[], &[], &[])).await.unwrap();

    let mut listed = db::list_documents(&conn).await.unwrap();
    listed.sort_by(|a, b| a.document_path.cmp(&b.document_path));
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].document_path, "a.md");
    assert_eq!(listed[0].decided, 2);
    assert_eq!(listed[1].decided, 0);

    assert!(db::delete_state(&conn, "a.md").await.unwrap());
    assert!(!db::delete_state(&conn, "a.md").await.unwrap());
    assert_eq!(db::load_state(&conn, "a.md").await.unwrap(), None);

    let orphans: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT COUNT(*) FROM finding_decisions",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(orphans, 0, "decisions cascade with their review");
}

#[tokio::test]
async fn sqlite_store_creates_parent_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join(".revise").join("state.db");

    let store = SqliteStateStore::open(&path).await.unwrap();
    let state = snapshot(&[0], &[], &[]);
    store.save_state("doc.md", &state).await.unwrap();

    assert!(path.exists());
    assert_eq!(store.load_state("doc.md").await.unwrap(), Some(state));

    let listed = db::list_documents(store.connection()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].document_path, "doc.md");
}
