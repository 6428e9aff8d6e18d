//! Backend abstraction
//!
//! Traits the snapshot engine and composite backends consume: a metadata
//! store, a data store, and an optional observations adapter.
//!
//! All implementations must satisfy these invariants:
//! - Data blobs are immutable by key. Re-writing the same key with the same
//!   bytes is observably a no-op.
//! - A `data_key` may be referenced by many metadata rows; deleting a
//!   metadata row never deletes the blob.
//! - Deletes are idempotent: a missing key yields `Ok`.
//! - All I/O errors are propagated, never silently ignored.

pub mod memory;

use std::io::Read;

use crate::errors::{not_found, storage_error, Result};
use crate::filter::RowPipeline;
use crate::model::{ListOptions, ObservationQuery, ObservationRecord, SnapshotMeta};

/// Persistence contract for snapshot metadata
pub trait MetadataStore: Send + Sync {
    /// Fetch one metadata row; `not_found` when absent
    fn get(&self, store_id: &str, version: &str) -> Result<SnapshotMeta>;

    /// Upsert by `(store_id, version)`
    fn put(&self, meta: &SnapshotMeta) -> Result<()>;

    /// Remove one row; missing key yields `Ok`
    fn delete(&self, store_id: &str, version: &str) -> Result<()>;

    /// Filtered listing, ordered `created_at` descending with `version`
    /// descending as the tie-break
    fn list(&self, store_id: &str, opts: &ListOptions) -> Result<Vec<SnapshotMeta>>;

    /// Most recent row by `(created_at, version)`
    fn get_latest(&self, store_id: &str) -> Result<SnapshotMeta> {
        let opts = ListOptions {
            limit: Some(1),
            ..Default::default()
        };
        self.list(store_id, &opts)?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(store_id, "<latest>").with_op("get_latest"))
    }

    /// All rows whose `parents` contain the given `(store_id, version)` pair
    ///
    /// The parent's `role` does not participate in the match; children may
    /// live in any store.
    fn get_children(
        &self,
        parent_store_id: &str,
        parent_version: &str,
    ) -> Result<Vec<SnapshotMeta>>;

    /// Any row in the store with this content hash (most recent preferred)
    fn find_by_hash(&self, store_id: &str, content_hash: &str)
        -> Result<Option<SnapshotMeta>>;
}

/// Read handle over a stored blob
///
/// Produces either a full byte buffer or a byte stream without redundant
/// reads; consuming it one way precludes the other.
pub enum DataHandle {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

impl DataHandle {
    /// Consume the handle into a full buffer
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            DataHandle::Bytes(bytes) => Ok(bytes),
            DataHandle::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .map_err(|e| storage_error("data_read", e))?;
                Ok(buf)
            }
        }
    }

    /// Consume the handle into a reader
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self {
            DataHandle::Bytes(bytes) => Box::new(std::io::Cursor::new(bytes)),
            DataHandle::Stream(reader) => reader,
        }
    }
}

impl std::fmt::Debug for DataHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataHandle::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            DataHandle::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

/// Write payload for a blob
///
/// A stream is consumed exactly once; callers must not assume multiple
/// consumers of a single input stream.
pub enum DataPayload {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

impl DataPayload {
    /// Consume the payload into a full buffer (single pass for streams)
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            DataPayload::Bytes(bytes) => Ok(bytes),
            DataPayload::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .map_err(|e| storage_error("data_put", e))?;
                Ok(buf)
            }
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, DataPayload::Stream(_))
    }
}

impl From<Vec<u8>> for DataPayload {
    fn from(bytes: Vec<u8>) -> Self {
        DataPayload::Bytes(bytes)
    }
}

impl From<&[u8]> for DataPayload {
    fn from(bytes: &[u8]) -> Self {
        DataPayload::Bytes(bytes.to_vec())
    }
}

/// Persistence contract for raw content blobs, keyed by `data_key`
pub trait DataStore: Send + Sync {
    /// Fetch a blob handle; `not_found` when absent
    fn get(&self, data_key: &str) -> Result<DataHandle>;

    /// Store a blob; idempotent by key
    fn put(&self, data_key: &str, payload: DataPayload) -> Result<()>;

    /// Remove a blob; missing key yields `Ok`
    fn delete(&self, data_key: &str) -> Result<()>;

    /// Whether a blob exists for this key
    fn exists(&self, data_key: &str) -> Result<bool>;
}

/// Storage adapter for observation rows
///
/// Backends implement the base operations; `query` and `delete_by_source`
/// have scan-and-filter defaults built on them, and backends with a native
/// query path (e.g. SQL) override them.
pub trait ObservationsAdapter: Send + Sync {
    fn get_all(&self) -> Result<Vec<ObservationRecord>>;

    fn set_all(&self, rows: Vec<ObservationRecord>) -> Result<()>;

    fn get_one(&self, id: &str) -> Result<Option<ObservationRecord>>;

    fn add_one(&self, row: &ObservationRecord) -> Result<()>;

    /// Remove one row; returns whether it existed
    fn remove_one(&self, id: &str) -> Result<bool>;

    /// Filtered, ordered, limited row query
    fn query(&self, opts: &ObservationQuery) -> Result<Vec<ObservationRecord>> {
        Ok(filter_observation_rows(self.get_all()?, opts))
    }

    /// Remove all rows for `(store_id, version)`; with `path` given, only
    /// rows whose source path exactly equals it. Returns the count removed.
    fn delete_by_source(
        &self,
        store_id: &str,
        version: &str,
        path: Option<&str>,
    ) -> Result<usize> {
        let rows = self.get_all()?;
        let (removed, kept): (Vec<_>, Vec<_>) = rows.into_iter().partition(|row| {
            row.source.store_id == store_id
                && row.source.version == version
                && match path {
                    Some(path) => row.source.path.as_deref() == Some(path),
                    None => true,
                }
        });
        if removed.is_empty() {
            return Ok(0);
        }
        self.set_all(kept)?;
        Ok(removed.len())
    }
}

/// Apply the observation query predicates, ordering, and limit in memory
pub fn filter_observation_rows(
    rows: Vec<ObservationRecord>,
    opts: &ObservationQuery,
) -> Vec<ObservationRecord> {
    RowPipeline::new(rows)
        .filter_when(opts.kinds.as_deref(), |row, kinds: &[String]| {
            kinds.iter().any(|k| *k == row.kind)
        })
        .filter_when(opts.source_store.as_deref(), |row, store: &str| {
            row.source.store_id == store
        })
        .filter_when(opts.source_version.as_deref(), |row, version: &str| {
            row.source.version == version
        })
        .filter_when(opts.source_prefix.as_deref(), |row, prefix: &str| {
            row.source.version.starts_with(prefix)
        })
        .filter_when(opts.created_after.as_ref(), |row, after| {
            row.created_at > *after
        })
        .filter_when(opts.created_before.as_ref(), |row, before| {
            row.created_at < *before
        })
        .filter_when(opts.observed_after.as_ref(), |row, after| {
            row.observed_at.map_or(false, |at| at > *after)
        })
        .filter_when(opts.observed_before.as_ref(), |row, before| {
            row.observed_at.map_or(false, |at| at < *before)
        })
        .sort_by(|a, b| a.cmp_query(b))
        .limit(opts.limit)
        .into_vec()
}

/// What composite backends and the snapshot engine consume
pub trait Backend: Send + Sync {
    fn metadata(&self) -> &dyn MetadataStore;

    fn data(&self) -> &dyn DataStore;

    /// Observation storage, when this backend offers it
    fn observations(&self) -> Option<&dyn ObservationsAdapter> {
        None
    }
}
