//! Metadata rows in SQLite
//!
//! One row per `(store_id, version)`; `parents` and `tags` are JSON text
//! and `get_children` matches parent pairs with a `json_each` existence
//! predicate.

use chrono::Utc;
use corpus_core::backend::MetadataStore;
use corpus_core::errors::{not_found, Result};
use corpus_core::model::{ListOptions, ParentRef, SnapshotMeta};
use rusqlite::types::ToSql;
use rusqlite::OptionalExtension;

use super::{column_error, fmt_ts, SqliteBackend};
use crate::errors::from_rusqlite;

const META_COLUMNS: &str = "store_id, version, parents, created_at, invoked_at, \
                            content_hash, content_type, size_bytes, data_key, tags";

fn row_to_meta(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotMeta> {
    let parents_text: String = row.get(2)?;
    let parents: Vec<ParentRef> =
        serde_json::from_str(&parents_text).map_err(|e| column_error(2, e))?;

    let created_text: String = row.get(3)?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_text)
        .map_err(|e| column_error(3, e))?
        .with_timezone(&Utc);

    let invoked_text: Option<String> = row.get(4)?;
    let invoked_at = match invoked_text {
        Some(text) => Some(
            chrono::DateTime::parse_from_rfc3339(&text)
                .map_err(|e| column_error(4, e))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let size_bytes: i64 = row.get(7)?;

    let tags_text: Option<String> = row.get(9)?;
    let tags = match tags_text {
        Some(text) => Some(serde_json::from_str(&text).map_err(|e| column_error(9, e))?),
        None => None,
    };

    Ok(SnapshotMeta {
        store_id: row.get(0)?,
        version: row.get(1)?,
        content_hash: row.get(5)?,
        content_type: row.get(6)?,
        size_bytes: size_bytes as u64,
        data_key: row.get(8)?,
        created_at,
        invoked_at,
        parents,
        tags,
    })
}

impl MetadataStore for SqliteBackend {
    fn get(&self, store_id: &str, version: &str) -> Result<SnapshotMeta> {
        let conn = self.lock_conn();
        conn.query_row(
            &format!(
                "SELECT {} FROM corpus_snapshots WHERE store_id = ?1 AND version = ?2",
                META_COLUMNS
            ),
            rusqlite::params![store_id, version],
            row_to_meta,
        )
        .optional()
        .map_err(|e| from_rusqlite("meta_get", e))?
        .ok_or_else(|| not_found(store_id, version).with_op("meta_get"))
    }

    fn put(&self, meta: &SnapshotMeta) -> Result<()> {
        let parents_json = serde_json::to_string(&meta.parents)
            .map_err(|e| corpus_core::errors::storage_error("meta_put", e))?;
        let tags_json = match &meta.tags {
            Some(tags) => Some(
                serde_json::to_string(tags)
                    .map_err(|e| corpus_core::errors::storage_error("meta_put", e))?,
            ),
            None => None,
        };

        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO corpus_snapshots
                 (store_id, version, parents, created_at, invoked_at,
                  content_hash, content_type, size_bytes, data_key, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(store_id, version) DO UPDATE SET
                 parents = excluded.parents,
                 created_at = excluded.created_at,
                 invoked_at = excluded.invoked_at,
                 content_hash = excluded.content_hash,
                 content_type = excluded.content_type,
                 size_bytes = excluded.size_bytes,
                 data_key = excluded.data_key,
                 tags = excluded.tags",
            rusqlite::params![
                meta.store_id,
                meta.version,
                parents_json,
                fmt_ts(&meta.created_at),
                meta.invoked_at.as_ref().map(fmt_ts),
                meta.content_hash,
                meta.content_type,
                meta.size_bytes as i64,
                meta.data_key,
                tags_json,
            ],
        )
        .map_err(|e| from_rusqlite("meta_put", e))?;

        Ok(())
    }

    fn delete(&self, store_id: &str, version: &str) -> Result<()> {
        let conn = self.lock_conn();
        conn.execute(
            "DELETE FROM corpus_snapshots WHERE store_id = ?1 AND version = ?2",
            rusqlite::params![store_id, version],
        )
        .map_err(|e| from_rusqlite("meta_delete", e))?;
        Ok(())
    }

    fn list(&self, store_id: &str, opts: &ListOptions) -> Result<Vec<SnapshotMeta>> {
        let mut sql = format!(
            "SELECT {} FROM corpus_snapshots WHERE store_id = ?1",
            META_COLUMNS
        );
        let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(store_id.to_string())];

        if let Some(before) = &opts.before {
            args.push(Box::new(fmt_ts(before)));
            sql.push_str(&format!(" AND created_at < ?{}", args.len()));
        }
        if let Some(after) = &opts.after {
            args.push(Box::new(fmt_ts(after)));
            sql.push_str(&format!(" AND created_at > ?{}", args.len()));
        }
        if let Some(tags) = opts.tags.as_ref().filter(|t| !t.is_empty()) {
            for tag in tags {
                args.push(Box::new(tag.clone()));
                sql.push_str(&format!(
                    " AND tags IS NOT NULL AND EXISTS (SELECT 1 FROM \
                     json_each(corpus_snapshots.tags) WHERE json_each.value = ?{})",
                    args.len()
                ));
            }
        }

        sql.push_str(" ORDER BY created_at DESC, version DESC");
        if let Some(limit) = opts.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| from_rusqlite("meta_list", e))?;
        let rows: std::result::Result<Vec<_>, _> = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                row_to_meta,
            )
            .map_err(|e| from_rusqlite("meta_list", e))?
            .collect();
        rows.map_err(|e| from_rusqlite("meta_list", e))
    }

    fn get_latest(&self, store_id: &str) -> Result<SnapshotMeta> {
        let conn = self.lock_conn();
        conn.query_row(
            &format!(
                "SELECT {} FROM corpus_snapshots WHERE store_id = ?1 \
                 ORDER BY created_at DESC, version DESC LIMIT 1",
                META_COLUMNS
            ),
            rusqlite::params![store_id],
            row_to_meta,
        )
        .optional()
        .map_err(|e| from_rusqlite("get_latest", e))?
        .ok_or_else(|| not_found(store_id, "<latest>").with_op("get_latest"))
    }

    fn get_children(
        &self,
        parent_store_id: &str,
        parent_version: &str,
    ) -> Result<Vec<SnapshotMeta>> {
        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM corpus_snapshots
                 WHERE EXISTS (
                     SELECT 1 FROM json_each(corpus_snapshots.parents)
                     WHERE json_extract(json_each.value, '$.store_id') = ?1
                       AND json_extract(json_each.value, '$.version') = ?2
                 )
                 ORDER BY created_at DESC, version DESC",
                META_COLUMNS
            ))
            .map_err(|e| from_rusqlite("get_children", e))?;
        let rows: std::result::Result<Vec<_>, _> = stmt
            .query_map(rusqlite::params![parent_store_id, parent_version], row_to_meta)
            .map_err(|e| from_rusqlite("get_children", e))?
            .collect();
        rows.map_err(|e| from_rusqlite("get_children", e))
    }

    fn find_by_hash(
        &self,
        store_id: &str,
        content_hash: &str,
    ) -> Result<Option<SnapshotMeta>> {
        let conn = self.lock_conn();
        conn.query_row(
            &format!(
                "SELECT {} FROM corpus_snapshots \
                 WHERE store_id = ?1 AND content_hash = ?2 \
                 ORDER BY created_at DESC, version DESC LIMIT 1",
                META_COLUMNS
            ),
            rusqlite::params![store_id, content_hash],
            row_to_meta,
        )
        .optional()
        .map_err(|e| from_rusqlite("find_by_hash", e))
    }
}
