//! Embedded schema management
//!
//! The schema ships as ordered SQL steps embedded at compile time.
//! Applied steps are recorded in `corpus_migrations` together with a
//! content hash of their SQL; on startup the embedded set is diffed
//! against the recorded set, pending steps run inside one transaction,
//! and a recorded step whose SQL no longer matches its hash is rejected
//! as schema drift.

use std::collections::HashMap;

use chrono::Utc;
use corpus_core::errors::{Error, ErrorKind};
use corpus_core::hash::content_hash;
use rusqlite::Connection;

use super::fmt_ts;
use crate::errors::{from_rusqlite, Result};

/// Ordered schema steps: `(name, sql)`
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_corpus_snapshots",
        include_str!("../../migrations/001_corpus_snapshots.sql"),
    ),
    (
        "002_corpus_observations",
        include_str!("../../migrations/002_corpus_observations.sql"),
    ),
];

/// Bring the database up to the embedded schema
///
/// Idempotent: steps already recorded in `corpus_migrations` are skipped
/// after their checksum is verified. All pending steps commit together.
pub fn ensure_schema(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS corpus_migrations (
            name TEXT PRIMARY KEY,
            checksum TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(|e| from_rusqlite("ensure_schema", e))?;

    let recorded = recorded_checksums(conn)?;

    let tx = conn
        .transaction()
        .map_err(|e| from_rusqlite("ensure_schema", e))?;

    let mut pending = 0usize;
    for (name, sql) in MIGRATIONS {
        let checksum = content_hash(sql.as_bytes());
        match recorded.get(*name) {
            Some(previous) if *previous == checksum => continue,
            Some(previous) => {
                return Err(Error::new(ErrorKind::HashMismatch)
                    .with_op("ensure_schema")
                    .with_message(format!(
                        "schema step '{}' drifted: recorded {}, embedded {}",
                        name, previous, checksum
                    )));
            }
            None => {
                tx.execute_batch(sql)
                    .map_err(|e| from_rusqlite("ensure_schema", e))?;
                tx.execute(
                    "INSERT INTO corpus_migrations (name, checksum, applied_at) \
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![name, checksum, fmt_ts(&Utc::now())],
                )
                .map_err(|e| from_rusqlite("ensure_schema", e))?;
                pending += 1;
            }
        }
    }

    tx.commit().map_err(|e| from_rusqlite("ensure_schema", e))?;

    if pending > 0 {
        tracing::debug!(steps = pending, "Applied schema steps");
    }

    Ok(())
}

fn recorded_checksums(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT name, checksum FROM corpus_migrations")
        .map_err(|e| from_rusqlite("ensure_schema", e))?;
    let rows: std::result::Result<HashMap<String, String>, _> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| from_rusqlite("ensure_schema", e))?
        .collect();
    rows.map_err(|e| from_rusqlite("ensure_schema", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_schema(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_schema_and_bookkeeping_rows_exist() {
        let conn = fresh();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('corpus_snapshots', 'corpus_observations')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);

        let steps: i64 = conn
            .query_row("SELECT COUNT(*) FROM corpus_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(steps as usize, MIGRATIONS.len());
    }

    #[test]
    fn test_rerun_applies_nothing_new() {
        let mut conn = fresh();
        let before: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT applied_at FROM corpus_migrations ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<std::result::Result<_, _>>()
                .unwrap()
        };

        ensure_schema(&mut conn).unwrap();

        let after: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT applied_at FROM corpus_migrations ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<std::result::Result<_, _>>()
                .unwrap()
        };
        // Untouched rows keep their original timestamps.
        assert_eq!(before, after);
    }

    #[test]
    fn test_checksum_drift_is_rejected() {
        let mut conn = fresh();
        conn.execute(
            "UPDATE corpus_migrations SET checksum = 'tampered' \
             WHERE name = '001_corpus_snapshots'",
            [],
        )
        .unwrap();

        let err = ensure_schema(&mut conn).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HashMismatch);
    }
}
