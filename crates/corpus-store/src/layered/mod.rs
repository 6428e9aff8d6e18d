//! Layered (composite) backend
//!
//! Combines an ordered `read` list and an ordered `write` list of
//! underlying backends. Reads fall back past `not_found` results; writes
//! fan out sequentially and stop at the first failure. Listings either
//! delegate to the first read layer or merge across all of them.

use std::collections::HashSet;
use std::sync::Arc;

use corpus_core::backend::{
    Backend, DataHandle, DataPayload, DataStore, MetadataStore, ObservationsAdapter,
};
use corpus_core::errors::{data_not_found, not_found, Error, ErrorKind, Result};
use corpus_core::model::{ListOptions, ObservationQuery, ObservationRecord, SnapshotMeta};

/// How `list` behaves across read layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStrategy {
    /// Gather from every read layer, dedup by version, re-sort, then limit
    #[default]
    Merge,
    /// Delegate to the first read layer only (its own `list` honors limit)
    First,
}

/// Composite backend with read-fallback and write-fanout
pub struct LayeredBackend {
    meta: LayeredMetadata,
    data: LayeredData,
    observations: Option<LayeredObservations>,
}

impl LayeredBackend {
    pub fn new(
        read: Vec<Arc<dyn Backend>>,
        write: Vec<Arc<dyn Backend>>,
        list_strategy: ListStrategy,
    ) -> Self {
        let any_observations = read
            .iter()
            .chain(write.iter())
            .any(|b| b.observations().is_some());

        let observations = any_observations.then(|| LayeredObservations {
            read: read.clone(),
            write: write.clone(),
        });

        Self {
            meta: LayeredMetadata {
                read: read.clone(),
                write: write.clone(),
                list_strategy,
            },
            data: LayeredData { read, write },
            observations,
        }
    }
}

impl Backend for LayeredBackend {
    fn metadata(&self) -> &dyn MetadataStore {
        &self.meta
    }

    fn data(&self) -> &dyn DataStore {
        &self.data
    }

    fn observations(&self) -> Option<&dyn ObservationsAdapter> {
        self.observations
            .as_ref()
            .map(|o| o as &dyn ObservationsAdapter)
    }
}

/// Try each backend in order; `not_found` continues, anything else
/// short-circuits. All misses (or no backends) end in `miss()`.
fn read_fallback<T>(
    backends: &[Arc<dyn Backend>],
    mut op: impl FnMut(&dyn Backend) -> Result<T>,
    miss: impl FnOnce() -> Error,
) -> Result<T> {
    for backend in backends {
        match op(backend.as_ref()) {
            Ok(value) => return Ok(value),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        }
    }
    Err(miss())
}

/// Run the write against each backend in order; first failure wins.
fn write_fanout(
    backends: &[Arc<dyn Backend>],
    mut op: impl FnMut(&dyn Backend) -> Result<()>,
) -> Result<()> {
    for backend in backends {
        op(backend.as_ref())?;
    }
    Ok(())
}

struct LayeredMetadata {
    read: Vec<Arc<dyn Backend>>,
    write: Vec<Arc<dyn Backend>>,
    list_strategy: ListStrategy,
}

impl MetadataStore for LayeredMetadata {
    fn get(&self, store_id: &str, version: &str) -> Result<SnapshotMeta> {
        read_fallback(
            &self.read,
            |b| b.metadata().get(store_id, version),
            || not_found(store_id, version).with_op("meta_get"),
        )
    }

    fn put(&self, meta: &SnapshotMeta) -> Result<()> {
        write_fanout(&self.write, |b| b.metadata().put(meta))
    }

    fn delete(&self, store_id: &str, version: &str) -> Result<()> {
        // Per-layer misses are fine: the row may only exist in some layers.
        write_fanout(&self.write, |b| {
            match b.metadata().delete(store_id, version) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        })
    }

    fn list(&self, store_id: &str, opts: &ListOptions) -> Result<Vec<SnapshotMeta>> {
        match self.list_strategy {
            ListStrategy::First => match self.read.first() {
                Some(backend) => backend.metadata().list(store_id, opts),
                None => Ok(Vec::new()),
            },
            ListStrategy::Merge => {
                // Fan out without the limit; it applies after the merge.
                let inner_opts = ListOptions {
                    limit: None,
                    ..opts.clone()
                };

                let mut merged: Vec<SnapshotMeta> = Vec::new();
                let mut seen: HashSet<String> = HashSet::new();
                for backend in &self.read {
                    for meta in backend.metadata().list(store_id, &inner_opts)? {
                        if seen.insert(meta.version.clone()) {
                            merged.push(meta);
                        }
                    }
                }

                merged.sort_by(|a, b| a.cmp_listing(b));
                if let Some(limit) = opts.limit {
                    merged.truncate(limit);
                }
                Ok(merged)
            }
        }
    }

    fn get_latest(&self, store_id: &str) -> Result<SnapshotMeta> {
        let mut best: Option<SnapshotMeta> = None;
        for backend in &self.read {
            match backend.metadata().get_latest(store_id) {
                Ok(meta) => {
                    let better = match &best {
                        Some(current) => {
                            (meta.created_at, &meta.version)
                                > (current.created_at, &current.version)
                        }
                        None => true,
                    };
                    if better {
                        best = Some(meta);
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        best.ok_or_else(|| not_found(store_id, "<latest>").with_op("get_latest"))
    }

    fn get_children(
        &self,
        parent_store_id: &str,
        parent_version: &str,
    ) -> Result<Vec<SnapshotMeta>> {
        let mut merged: Vec<SnapshotMeta> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for backend in &self.read {
            for meta in backend
                .metadata()
                .get_children(parent_store_id, parent_version)?
            {
                if seen.insert((meta.store_id.clone(), meta.version.clone())) {
                    merged.push(meta);
                }
            }
        }
        merged.sort_by(|a, b| a.cmp_listing(b));
        Ok(merged)
    }

    fn find_by_hash(
        &self,
        store_id: &str,
        content_hash: &str,
    ) -> Result<Option<SnapshotMeta>> {
        for backend in &self.read {
            match backend.metadata().find_by_hash(store_id, content_hash) {
                Ok(Some(meta)) => return Ok(Some(meta)),
                Ok(None) => continue,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

struct LayeredData {
    read: Vec<Arc<dyn Backend>>,
    write: Vec<Arc<dyn Backend>>,
}

impl DataStore for LayeredData {
    fn get(&self, data_key: &str) -> Result<DataHandle> {
        read_fallback(
            &self.read,
            |b| b.data().get(data_key),
            || data_not_found(data_key).with_op("data_get"),
        )
    }

    fn put(&self, data_key: &str, payload: DataPayload) -> Result<()> {
        match self.write.len() {
            0 => Ok(()),
            1 => self.write[0].data().put(data_key, payload),
            _ => {
                // A stream has exactly one consumer; buffer it before
                // fanning out to more than one layer.
                let bytes = payload.into_bytes()?;
                write_fanout(&self.write, |b| {
                    b.data().put(data_key, DataPayload::Bytes(bytes.clone()))
                })
            }
        }
    }

    fn delete(&self, data_key: &str) -> Result<()> {
        write_fanout(&self.write, |b| match b.data().delete(data_key) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        })
    }

    fn exists(&self, data_key: &str) -> Result<bool> {
        for backend in &self.read {
            if backend.data().exists(data_key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

struct LayeredObservations {
    read: Vec<Arc<dyn Backend>>,
    write: Vec<Arc<dyn Backend>>,
}

impl LayeredObservations {
    /// First read layer that exposes observation storage
    fn read_adapter(&self) -> Option<&dyn ObservationsAdapter> {
        self.read.iter().find_map(|b| b.observations())
    }

    /// Write layers that expose observation storage, in order
    fn write_adapters(&self) -> impl Iterator<Item = &dyn ObservationsAdapter> {
        self.write.iter().filter_map(|b| b.observations())
    }
}

impl ObservationsAdapter for LayeredObservations {
    fn get_all(&self) -> Result<Vec<ObservationRecord>> {
        match self.read_adapter() {
            Some(adapter) => adapter.get_all(),
            None => Ok(Vec::new()),
        }
    }

    fn set_all(&self, rows: Vec<ObservationRecord>) -> Result<()> {
        for adapter in self.write_adapters() {
            adapter.set_all(rows.clone())?;
        }
        Ok(())
    }

    fn get_one(&self, id: &str) -> Result<Option<ObservationRecord>> {
        match self.read_adapter() {
            Some(adapter) => adapter.get_one(id),
            None => Ok(None),
        }
    }

    fn add_one(&self, row: &ObservationRecord) -> Result<()> {
        for adapter in self.write_adapters() {
            adapter.add_one(row)?;
        }
        Ok(())
    }

    fn remove_one(&self, id: &str) -> Result<bool> {
        let mut removed = false;
        for adapter in self.write_adapters() {
            removed |= adapter.remove_one(id)?;
        }
        Ok(removed)
    }

    fn query(&self, opts: &ObservationQuery) -> Result<Vec<ObservationRecord>> {
        match self.read_adapter() {
            Some(adapter) => adapter.query(opts),
            None => Ok(Vec::new()),
        }
    }

    fn delete_by_source(
        &self,
        store_id: &str,
        version: &str,
        path: Option<&str>,
    ) -> Result<usize> {
        // Layers are replicas under fan-out writes; report the largest
        // per-layer count.
        let mut removed = 0;
        for adapter in self.write_adapters() {
            removed = removed.max(adapter.delete_by_source(store_id, version, path)?);
        }
        Ok(removed)
    }
}
