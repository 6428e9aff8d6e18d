//! In-memory backend
//!
//! Two associative containers plus an observations table behind `RwLock`s.
//! Intended for tests, composition under a layered backend, and embedding.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::backend::{
    Backend, DataHandle, DataPayload, DataStore, MetadataStore, ObservationsAdapter,
};
use crate::errors::{data_not_found, not_found, Result};
use crate::filter::RowPipeline;
use crate::model::{ListOptions, ObservationRecord, SnapshotMeta};

/// HashMap-backed backend holding metadata, blobs, and observation rows
#[derive(Default)]
pub struct MemoryBackend {
    metas: RwLock<BTreeMap<(String, String), SnapshotMeta>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    observations: RwLock<Vec<ObservationRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of metadata rows across all stores
    pub fn meta_count(&self) -> usize {
        self.metas.read().expect("lock poisoned").len()
    }

    /// Number of physical blobs
    pub fn blob_count(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Number of observation rows
    pub fn observation_count(&self) -> usize {
        self.observations.read().expect("lock poisoned").len()
    }
}

impl MetadataStore for MemoryBackend {
    fn get(&self, store_id: &str, version: &str) -> Result<SnapshotMeta> {
        let metas = self.metas.read().expect("lock poisoned");
        metas
            .get(&(store_id.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| not_found(store_id, version).with_op("meta_get"))
    }

    fn put(&self, meta: &SnapshotMeta) -> Result<()> {
        let mut metas = self.metas.write().expect("lock poisoned");
        metas.insert(
            (meta.store_id.clone(), meta.version.clone()),
            meta.clone(),
        );
        Ok(())
    }

    fn delete(&self, store_id: &str, version: &str) -> Result<()> {
        let mut metas = self.metas.write().expect("lock poisoned");
        metas.remove(&(store_id.to_string(), version.to_string()));
        Ok(())
    }

    fn list(&self, store_id: &str, opts: &ListOptions) -> Result<Vec<SnapshotMeta>> {
        let metas = self.metas.read().expect("lock poisoned");
        let rows: Vec<SnapshotMeta> = metas
            .values()
            .filter(|m| m.store_id == store_id)
            .cloned()
            .collect();

        let tags = opts.tags.as_deref().filter(|t| !t.is_empty());
        let rows = RowPipeline::new(rows)
            .filter_when(opts.before.as_ref(), |m, before| m.created_at < *before)
            .filter_when(opts.after.as_ref(), |m, after| m.created_at > *after)
            .filter_when(tags, |m, wanted: &[String]| {
                m.tags
                    .as_ref()
                    .map_or(false, |own| wanted.iter().all(|t| own.contains(t)))
            })
            .sort_by(|a, b| a.cmp_listing(b))
            .limit(opts.limit)
            .into_vec();

        Ok(rows)
    }

    fn get_latest(&self, store_id: &str) -> Result<SnapshotMeta> {
        let metas = self.metas.read().expect("lock poisoned");
        metas
            .values()
            .filter(|m| m.store_id == store_id)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.version.cmp(&b.version))
            })
            .cloned()
            .ok_or_else(|| not_found(store_id, "<latest>").with_op("get_latest"))
    }

    fn get_children(
        &self,
        parent_store_id: &str,
        parent_version: &str,
    ) -> Result<Vec<SnapshotMeta>> {
        let metas = self.metas.read().expect("lock poisoned");
        let mut rows: Vec<SnapshotMeta> = metas
            .values()
            .filter(|m| m.has_parent(parent_store_id, parent_version))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.cmp_listing(b));
        Ok(rows)
    }

    fn find_by_hash(
        &self,
        store_id: &str,
        content_hash: &str,
    ) -> Result<Option<SnapshotMeta>> {
        let metas = self.metas.read().expect("lock poisoned");
        Ok(metas
            .values()
            .filter(|m| m.store_id == store_id && m.content_hash == content_hash)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.version.cmp(&b.version))
            })
            .cloned())
    }
}

impl DataStore for MemoryBackend {
    fn get(&self, data_key: &str) -> Result<DataHandle> {
        let blobs = self.blobs.read().expect("lock poisoned");
        blobs
            .get(data_key)
            .cloned()
            .map(DataHandle::Bytes)
            .ok_or_else(|| data_not_found(data_key).with_op("data_get"))
    }

    fn put(&self, data_key: &str, payload: DataPayload) -> Result<()> {
        let bytes = payload.into_bytes()?;
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.insert(data_key.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, data_key: &str) -> Result<()> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.remove(data_key);
        Ok(())
    }

    fn exists(&self, data_key: &str) -> Result<bool> {
        let blobs = self.blobs.read().expect("lock poisoned");
        Ok(blobs.contains_key(data_key))
    }
}

impl ObservationsAdapter for MemoryBackend {
    fn get_all(&self) -> Result<Vec<ObservationRecord>> {
        Ok(self.observations.read().expect("lock poisoned").clone())
    }

    fn set_all(&self, rows: Vec<ObservationRecord>) -> Result<()> {
        *self.observations.write().expect("lock poisoned") = rows;
        Ok(())
    }

    fn get_one(&self, id: &str) -> Result<Option<ObservationRecord>> {
        let rows = self.observations.read().expect("lock poisoned");
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }

    fn add_one(&self, row: &ObservationRecord) -> Result<()> {
        let mut rows = self.observations.write().expect("lock poisoned");
        rows.push(row.clone());
        Ok(())
    }

    fn remove_one(&self, id: &str) -> Result<bool> {
        let mut rows = self.observations.write().expect("lock poisoned");
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() < before)
    }
}

impl Backend for MemoryBackend {
    fn metadata(&self) -> &dyn MetadataStore {
        self
    }

    fn data(&self) -> &dyn DataStore {
        self
    }

    fn observations(&self) -> Option<&dyn ObservationsAdapter> {
        Some(self)
    }
}
