/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every DB open (before checking the version),
/// using `IF NOT EXISTS` so it is safe to run multiple times.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the full v1 schema.
///
/// Contains two tables:
/// - `document_reviews`: one row per document path, holding the raw session
///   JSON last loaded for it. Keyed by UUID v4 text.
/// - `finding_decisions`: one row per decided finding of a review. `decision`
///   is `accepted`, `option` (with `option_index` set) or `ignored`; pending
///   findings have no row.
///
/// Both tables use `STRICT` mode. Removing a review cascades to its decisions.
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS document_reviews (
        id            TEXT    PRIMARY KEY,
        document_path TEXT    NOT NULL UNIQUE,
        raw_json      TEXT    NOT NULL,
        created_at    INTEGER NOT NULL,
        updated_at    INTEGER NOT NULL
    ) STRICT;

    CREATE TABLE IF NOT EXISTS finding_decisions (
        review_id     TEXT    NOT NULL REFERENCES document_reviews(id) ON DELETE CASCADE,
        finding_index INTEGER NOT NULL CHECK(finding_index >= 0),
        decision      TEXT    NOT NULL
                              CHECK(decision IN ('accepted', 'option', 'ignored')),
        option_index  INTEGER,
        decided_at    INTEGER NOT NULL,
        PRIMARY KEY (review_id, finding_index),
        CHECK((decision = 'option') = (option_index IS NOT NULL))
    ) STRICT;
";

/// DDL for v2: the document text a session was loaded against.
///
/// Nullable so reviews saved under v1 keep loading; those replay over the
/// text the host returns at open time.
pub const SCHEMA_V2_SQL: &str = "
    ALTER TABLE document_reviews ADD COLUMN original_text TEXT;
";

/// Runs forward-only schema migration to bring the DB to the latest version.
///
/// Idempotent: safe to call on every open.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the DDL fails or the version row cannot be read.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;

    let version: i64 = db.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_V1_SQL)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
        tx.commit()?;
    }

    if version < 2 {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_V2_SQL)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
        tx.commit()?;
    }

    Ok(())
}
