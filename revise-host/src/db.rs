use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use revise_core::{Decision, PersistedState, RevisionState};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

/// Opens (or creates) the SQLite database at `path`, configures WAL mode,
/// and applies schema migrations via the `schema_version` table.
///
/// `busy_timeout` is set through the `Connection` method rather than a PRAGMA
/// string so the setting takes effect regardless of pragma caching.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the file cannot be opened, WAL
/// configuration fails, or schema DDL fails.
pub async fn open_db(path: impl AsRef<Path>) -> Result<Connection, tokio_rusqlite::Error> {
    let conn = Connection::open(path.as_ref()).await?;

    conn.call(|db| {
        db.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        db.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    })
    .await?;

    conn.call(|db| {
        db.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .await?;

    conn.call(|db| {
        crate::schema::migrate(db)?;
        Ok(())
    })
    .await?;

    Ok(conn)
}

/// Returns the current Unix timestamp in seconds.
fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// A stored review as listed by [`list_documents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReview {
    pub document_path: String,
    pub updated_at: i64,
    pub decided: usize,
}

/// Loads the persisted review for `document_path`.
///
/// Returns `None` when no session was ever saved for the document. Decision
/// rows are folded back into the camelCase wire shape.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if a query fails.
pub async fn load_state(
    conn: &Connection,
    document_path: &str,
) -> Result<Option<PersistedState>, tokio_rusqlite::Error> {
    let document_path = document_path.to_owned();

    conn.call(move |db| {
        let review: Option<(String, String, Option<String>)> = db
            .query_row(
                "SELECT id, raw_json, original_text FROM document_reviews WHERE document_path = ?1",
                rusqlite::params![&document_path],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let Some((review_id, raw_json, original_text)) = review else {
            return Ok(None);
        };

        let mut stmt = db.prepare(
            "SELECT finding_index, decision, option_index
             FROM finding_decisions
             WHERE review_id = ?1
             ORDER BY finding_index",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![&review_id], |r| {
                let index: i64 = r.get(0)?;
                let decision: String = r.get(1)?;
                let option: Option<i64> = r.get(2)?;
                Ok((index, decision, option))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut state = PersistedState { raw_json, original_text, ..PersistedState::default() };
        for (index, decision, option) in rows {
            let Ok(index) = usize::try_from(index) else { continue };
            match (decision.as_str(), option.and_then(|o| usize::try_from(o).ok())) {
                ("accepted", _) => state.accepted_indices.push(index),
                ("ignored", _) => state.ignored_indices.push(index),
                ("option", Some(option)) => {
                    state.accepted_option_by_index.insert(index.to_string(), option);
                }
                _ => {}
            }
        }
        Ok(Some(state))
    })
    .await
}

/// Writes the review for `document_path`, replacing any earlier snapshot.
///
/// The review row is upserted on `document_path`. Decisions are upserted per
/// finding, keeping the original `decided_at`; rows for findings that are no
/// longer decided (for example after a new session was loaded) are removed.
/// Everything happens inside one `BEGIN IMMEDIATE` transaction.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the write transaction fails.
pub async fn save_state(
    conn: &Connection,
    document_path: &str,
    state: &PersistedState,
) -> Result<(), tokio_rusqlite::Error> {
    let document_path = document_path.to_owned();
    let raw_json = state.raw_json.clone();
    let original_text = state.original_text.clone();
    let decisions = decision_rows(state);

    conn.call(move |db| {
        let now = now_secs();
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO document_reviews
                 (id, document_path, raw_json, original_text, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(document_path)
             DO UPDATE SET raw_json = excluded.raw_json,
                           original_text = excluded.original_text,
                           updated_at = excluded.updated_at",
            rusqlite::params![
                uuid::Uuid::new_v4().to_string(),
                &document_path,
                &raw_json,
                &original_text,
                now
            ],
        )?;
        let review_id: String = tx.query_row(
            "SELECT id FROM document_reviews WHERE document_path = ?1",
            rusqlite::params![&document_path],
            |r| r.get(0),
        )?;

        let stale: Vec<i64> = {
            let mut stmt =
                tx.prepare("SELECT finding_index FROM finding_decisions WHERE review_id = ?1")?;
            let existing = stmt
                .query_map(rusqlite::params![&review_id], |r| r.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            existing.into_iter().filter(|i| !decisions.contains_key(i)).collect()
        };
        for index in stale {
            tx.execute(
                "DELETE FROM finding_decisions WHERE review_id = ?1 AND finding_index = ?2",
                rusqlite::params![&review_id, index],
            )?;
        }

        for (index, (decision, option)) in &decisions {
            tx.execute(
                "INSERT INTO finding_decisions
                     (review_id, finding_index, decision, option_index, decided_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(review_id, finding_index)
                 DO UPDATE SET decision = excluded.decision,
                               option_index = excluded.option_index",
                rusqlite::params![&review_id, index, decision, option, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    })
    .await
}

/// Removes the stored review (and its decisions) for `document_path`.
///
/// Returns `true` if a review existed.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the delete fails.
pub async fn delete_state(
    conn: &Connection,
    document_path: &str,
) -> Result<bool, tokio_rusqlite::Error> {
    let document_path = document_path.to_owned();

    conn.call(move |db| {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            "DELETE FROM document_reviews WHERE document_path = ?1",
            rusqlite::params![&document_path],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    })
    .await
}

/// Lists stored reviews, most recently updated first.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn list_documents(conn: &Connection) -> Result<Vec<StoredReview>, tokio_rusqlite::Error> {
    conn.call(|db| {
        let mut stmt = db.prepare(
            "SELECT r.document_path, r.updated_at, COUNT(d.finding_index)
             FROM document_reviews r
             LEFT JOIN finding_decisions d ON d.review_id = r.id
             GROUP BY r.id
             ORDER BY r.updated_at DESC, r.document_path",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let decided: i64 = r.get(2)?;
                Ok(StoredReview {
                    document_path: r.get(0)?,
                    updated_at: r.get(1)?,
                    decided: usize::try_from(decided).unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

/// Flattens a snapshot into `finding_index → (decision, option_index)` rows.
///
/// The snapshot goes through `RevisionState` first so overlapping entries
/// resolve the same way they do when the state is restored. Pending findings
/// have no row.
fn decision_rows(state: &PersistedState) -> BTreeMap<i64, (&'static str, Option<i64>)> {
    let restored = RevisionState::from_persisted(state);
    let decided = restored
        .accepted_indices()
        .chain(restored.accepted_options().keys().copied())
        .chain(restored.ignored_indices());

    let mut rows = BTreeMap::new();
    for index in decided {
        if let Some(row) = decision_row(restored.decision(index)) {
            rows.insert(index as i64, row);
        }
    }
    rows
}

fn decision_row(decision: Decision) -> Option<(&'static str, Option<i64>)> {
    match decision {
        Decision::Pending => None,
        Decision::Accepted => Some(("accepted", None)),
        Decision::AcceptedOption(option) => Some(("option", Some(option as i64))),
        Decision::Ignored => Some(("ignored", None)),
    }
}
