//! Observation rows in SQLite
//!
//! Implements the adapter's base operations and overrides `query` and
//! `delete_by_source` with native SQL instead of scan-and-filter.

use chrono::Utc;
use corpus_core::backend::ObservationsAdapter;
use corpus_core::errors::Result;
use corpus_core::model::{ObservationQuery, ObservationRecord, SnapshotPointer, Span};
use rusqlite::types::ToSql;
use rusqlite::OptionalExtension;

use super::{column_error, fmt_ts, SqliteBackend};
use crate::errors::from_rusqlite;

const OBS_COLUMNS: &str = "id, type, source_store_id, source_version, source_path, \
                           source_span_start, source_span_end, content, confidence, \
                           observed_at, created_at, derived_from";

fn row_to_observation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObservationRecord> {
    let span_start: Option<i64> = row.get(5)?;
    let span_end: Option<i64> = row.get(6)?;
    let span = match (span_start, span_end) {
        (Some(start), Some(end)) => Some(Span::new(start as usize, end as usize)),
        _ => None,
    };

    let source = SnapshotPointer {
        store_id: row.get(2)?,
        version: row.get(3)?,
        path: row.get(4)?,
        span,
    };

    let content_text: String = row.get(7)?;
    let content = serde_json::from_str(&content_text).map_err(|e| column_error(7, e))?;

    let observed_text: Option<String> = row.get(9)?;
    let observed_at = match observed_text {
        Some(text) => Some(
            chrono::DateTime::parse_from_rfc3339(&text)
                .map_err(|e| column_error(9, e))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let created_text: String = row.get(10)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_text)
        .map_err(|e| column_error(10, e))?
        .with_timezone(&Utc);

    let derived_text: Option<String> = row.get(11)?;
    let derived_from = match derived_text {
        Some(text) => Some(serde_json::from_str(&text).map_err(|e| column_error(11, e))?),
        None => None,
    };

    Ok(ObservationRecord {
        id: row.get(0)?,
        kind: row.get(1)?,
        source,
        content,
        confidence: row.get(8)?,
        observed_at,
        created_at,
        derived_from,
    })
}

fn insert_row(conn: &rusqlite::Connection, row: &ObservationRecord) -> Result<()> {
    let content_json = serde_json::to_string(&row.content)
        .map_err(|e| corpus_core::errors::storage_error("observation_add", e))?;
    let derived_json = match &row.derived_from {
        Some(pointers) => Some(
            serde_json::to_string(pointers)
                .map_err(|e| corpus_core::errors::storage_error("observation_add", e))?,
        ),
        None => None,
    };

    conn.execute(
        "INSERT INTO corpus_observations
             (id, type, source_store_id, source_version, source_path,
              source_span_start, source_span_end, content, confidence,
              observed_at, created_at, derived_from)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            row.id,
            row.kind,
            row.source.store_id,
            row.source.version,
            row.source.path,
            row.source.span.map(|s| s.start as i64),
            row.source.span.map(|s| s.end as i64),
            content_json,
            row.confidence,
            row.observed_at.as_ref().map(fmt_ts),
            fmt_ts(&row.created_at),
            derived_json,
        ],
    )
    .map_err(|e| from_rusqlite("observation_add", e))?;

    Ok(())
}

impl ObservationsAdapter for SqliteBackend {
    fn get_all(&self) -> Result<Vec<ObservationRecord>> {
        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM corpus_observations ORDER BY created_at DESC, id DESC",
                OBS_COLUMNS
            ))
            .map_err(|e| from_rusqlite("observation_get_all", e))?;
        let rows: std::result::Result<Vec<_>, _> = stmt
            .query_map([], row_to_observation)
            .map_err(|e| from_rusqlite("observation_get_all", e))?
            .collect();
        rows.map_err(|e| from_rusqlite("observation_get_all", e))
    }

    fn set_all(&self, rows: Vec<ObservationRecord>) -> Result<()> {
        let mut conn = self.lock_conn();
        let tx = conn
            .transaction()
            .map_err(|e| from_rusqlite("observation_set_all", e))?;
        tx.execute("DELETE FROM corpus_observations", [])
            .map_err(|e| from_rusqlite("observation_set_all", e))?;
        for row in &rows {
            insert_row(&tx, row)?;
        }
        tx.commit()
            .map_err(|e| from_rusqlite("observation_set_all", e))
    }

    fn get_one(&self, id: &str) -> Result<Option<ObservationRecord>> {
        let conn = self.lock_conn();
        conn.query_row(
            &format!("SELECT {} FROM corpus_observations WHERE id = ?1", OBS_COLUMNS),
            rusqlite::params![id],
            row_to_observation,
        )
        .optional()
        .map_err(|e| from_rusqlite("observation_get", e))
    }

    fn add_one(&self, row: &ObservationRecord) -> Result<()> {
        let conn = self.lock_conn();
        insert_row(&conn, row)
    }

    fn remove_one(&self, id: &str) -> Result<bool> {
        let conn = self.lock_conn();
        let affected = conn
            .execute(
                "DELETE FROM corpus_observations WHERE id = ?1",
                rusqlite::params![id],
            )
            .map_err(|e| from_rusqlite("observation_delete", e))?;
        Ok(affected > 0)
    }

    fn query(&self, opts: &ObservationQuery) -> Result<Vec<ObservationRecord>> {
        let mut sql = format!("SELECT {} FROM corpus_observations WHERE 1=1", OBS_COLUMNS);
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(kinds) = opts.kinds.as_ref().filter(|k| !k.is_empty()) {
            let placeholders: Vec<String> = kinds
                .iter()
                .map(|kind| {
                    args.push(Box::new(kind.clone()));
                    format!("?{}", args.len())
                })
                .collect();
            sql.push_str(&format!(" AND type IN ({})", placeholders.join(", ")));
        }
        if let Some(store) = &opts.source_store {
            args.push(Box::new(store.clone()));
            sql.push_str(&format!(" AND source_store_id = ?{}", args.len()));
        }
        if let Some(version) = &opts.source_version {
            args.push(Box::new(version.clone()));
            sql.push_str(&format!(" AND source_version = ?{}", args.len()));
        }
        if let Some(prefix) = &opts.source_prefix {
            args.push(Box::new(prefix.clone()));
            let n = args.len();
            sql.push_str(&format!(
                " AND substr(source_version, 1, length(?{})) = ?{}",
                n, n
            ));
        }
        if let Some(after) = &opts.created_after {
            args.push(Box::new(fmt_ts(after)));
            sql.push_str(&format!(" AND created_at > ?{}", args.len()));
        }
        if let Some(before) = &opts.created_before {
            args.push(Box::new(fmt_ts(before)));
            sql.push_str(&format!(" AND created_at < ?{}", args.len()));
        }
        if let Some(after) = &opts.observed_after {
            args.push(Box::new(fmt_ts(after)));
            sql.push_str(&format!(
                " AND observed_at IS NOT NULL AND observed_at > ?{}",
                args.len()
            ));
        }
        if let Some(before) = &opts.observed_before {
            args.push(Box::new(fmt_ts(before)));
            sql.push_str(&format!(
                " AND observed_at IS NOT NULL AND observed_at < ?{}",
                args.len()
            ));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = opts.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| from_rusqlite("observation_query", e))?;
        let rows: std::result::Result<Vec<_>, _> = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                row_to_observation,
            )
            .map_err(|e| from_rusqlite("observation_query", e))?
            .collect();
        rows.map_err(|e| from_rusqlite("observation_query", e))
    }

    fn delete_by_source(
        &self,
        store_id: &str,
        version: &str,
        path: Option<&str>,
    ) -> Result<usize> {
        let conn = self.lock_conn();
        let affected = match path {
            None => conn
                .execute(
                    "DELETE FROM corpus_observations \
                     WHERE source_store_id = ?1 AND source_version = ?2",
                    rusqlite::params![store_id, version],
                )
                .map_err(|e| from_rusqlite("observation_delete_by_source", e))?,
            Some(path) => conn
                .execute(
                    "DELETE FROM corpus_observations \
                     WHERE source_store_id = ?1 AND source_version = ?2 \
                       AND source_path = ?3",
                    rusqlite::params![store_id, version, path],
                )
                .map_err(|e| from_rusqlite("observation_delete_by_source", e))?,
        };
        Ok(affected)
    }
}
