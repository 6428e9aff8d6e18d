//! Embedded SQLite backend
//!
//! Metadata and observation rows live in SQL; data blobs go through a
//! composed [`DataStore`], so any blob store (filesystem, memory, an object
//! store wrapper) slots in.

pub mod migrations;

mod meta;
mod observations;

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use corpus_core::backend::{Backend, DataStore, MetadataStore, ObservationsAdapter};
use rusqlite::Connection;

use crate::errors::{from_rusqlite, Result};

/// SQLite-backed snapshot backend
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    data: Arc<dyn DataStore>,
}

impl SqliteBackend {
    /// Open (or create) a database file, bringing its schema up to date
    pub fn open<P: AsRef<Path>>(path: P, data: Arc<dyn DataStore>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| from_rusqlite("open", e))?;

        // Write-ahead logging keeps readers unblocked while the engine
        // fans writes in; the pragma reports the resulting mode as a row.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            .map_err(|e| from_rusqlite("open", e))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| from_rusqlite("open", e))?;

        Self::from_connection(conn, data)
    }

    /// Private in-memory database (for testing)
    pub fn open_in_memory(data: Arc<dyn DataStore>) -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| from_rusqlite("open_in_memory", e))?;
        Self::from_connection(conn, data)
    }

    fn from_connection(mut conn: Connection, data: Arc<dyn DataStore>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| from_rusqlite("open", e))?;
        migrations::ensure_schema(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            data,
        })
    }

    pub(crate) fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("connection lock poisoned")
    }
}

impl Backend for SqliteBackend {
    fn metadata(&self) -> &dyn MetadataStore {
        self
    }

    fn data(&self) -> &dyn DataStore {
        self.data.as_ref()
    }

    fn observations(&self) -> Option<&dyn ObservationsAdapter> {
        Some(self)
    }
}

/// Render a timestamp as fixed-precision RFC 3339 UTC text
///
/// Fixed precision keeps lexicographic order equal to chronological order,
/// which the `created_at` indexes and ORDER BY clauses rely on.
pub(crate) fn fmt_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Wrap a nested parse failure into a rusqlite row-mapping error
pub(crate) fn column_error(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}
