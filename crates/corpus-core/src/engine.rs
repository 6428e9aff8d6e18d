//! Snapshot engine
//!
//! Orchestrates encode → hash → dedup check → data put → metadata put for
//! writes, and the reverse pipeline for reads. Emits observability events
//! synchronously at each decision point.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::{Backend, DataPayload};
use crate::codec::Codec;
use crate::errors::{invalid_config, Error, ErrorKind, Result};
use crate::hash::content_hash;
use crate::model::{
    default_data_key, DataKeyInput, Event, EventSink, ListOptions, ParentRef, Snapshot,
    SnapshotMeta,
};
use crate::version::next_version;

/// Store-level data key policy
pub type DataKeyFn = Arc<dyn Fn(&DataKeyInput<'_>) -> String + Send + Sync>;

/// Options for a snapshot write
#[derive(Default)]
pub struct PutOptions {
    /// Lineage references recorded on the new snapshot
    pub parents: Vec<ParentRef>,
    /// Caller-supplied logical event time
    pub invoked_at: Option<DateTime<Utc>>,
    /// Ordered tags
    pub tags: Option<Vec<String>>,
}

/// A logical store of typed, versioned snapshots
///
/// Cheap to clone; clones share the backend, codec, and event sink.
pub struct SnapshotStore<T> {
    store_id: String,
    backend: Arc<dyn Backend>,
    codec: Arc<dyn Codec<T>>,
    data_key_fn: Option<DataKeyFn>,
    events: Option<EventSink>,
}

impl<T> std::fmt::Debug for SnapshotStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("store_id", &self.store_id)
            .finish_non_exhaustive()
    }
}

impl<T> Clone for SnapshotStore<T> {
    fn clone(&self) -> Self {
        Self {
            store_id: self.store_id.clone(),
            backend: Arc::clone(&self.backend),
            codec: Arc::clone(&self.codec),
            data_key_fn: self.data_key_fn.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T> SnapshotStore<T> {
    /// Start building a store over the given codec
    pub fn builder(
        store_id: impl Into<String>,
        codec: impl Codec<T> + 'static,
    ) -> SnapshotStoreBuilder<T> {
        SnapshotStoreBuilder {
            store_id: store_id.into(),
            codec: Arc::new(codec),
            backend: None,
            data_key_fn: None,
            events: None,
        }
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    fn emit(&self, event: Event) {
        if let Some(sink) = &self.events {
            sink(&event);
        }
    }

    /// Emit an error event and hand the error back unchanged
    fn fail(&self, op: &str, err: Error) -> Error {
        self.emit(Event::Error {
            op: op.to_string(),
            code: err.code(),
            message: err.to_string(),
        });
        err
    }

    fn data_key_for(&self, version: &str, content_hash: &str, tags: Option<&[String]>) -> String {
        match &self.data_key_fn {
            Some(f) => f(&DataKeyInput {
                store_id: &self.store_id,
                version,
                content_hash,
                tags,
            }),
            None => default_data_key(&self.store_id, content_hash),
        }
    }

    /// Store a new snapshot of `data`
    ///
    /// Content already present in this store (by hash) is not re-written;
    /// the new version's metadata points at the existing blob. Data lands
    /// strictly before metadata, so a metadata row can always dereference
    /// its `data_key`.
    pub fn put(&self, data: &T, opts: PutOptions) -> Result<SnapshotMeta> {
        let version = next_version();

        let bytes = self
            .codec
            .encode(data)
            .map_err(|e| self.fail("put", e))?;
        let content_hash = content_hash(&bytes);
        let size_bytes = bytes.len() as u64;

        let existing = self
            .backend
            .metadata()
            .find_by_hash(&self.store_id, &content_hash)
            .map_err(|e| self.fail("put", e))?;
        let deduplicated = existing.is_some();

        let data_key = match &existing {
            Some(prior) => prior.data_key.clone(),
            None => self.data_key_for(&version, &content_hash, opts.tags.as_deref()),
        };

        if !deduplicated {
            self.backend
                .data()
                .put(&data_key, DataPayload::Bytes(bytes))
                .map_err(|e| self.fail("put", e))?;
        }
        self.emit(Event::DataPut {
            data_key: data_key.clone(),
            deduplicated,
        });

        let meta = SnapshotMeta {
            store_id: self.store_id.clone(),
            version: version.clone(),
            content_hash: content_hash.clone(),
            content_type: self.codec.content_type().to_string(),
            size_bytes,
            data_key,
            created_at: Utc::now(),
            invoked_at: opts.invoked_at,
            parents: opts.parents,
            tags: opts.tags,
        };

        self.backend
            .metadata()
            .put(&meta)
            .map_err(|e| self.fail("put", e))?;
        self.emit(Event::MetaPut {
            store_id: self.store_id.clone(),
            version: version.clone(),
        });

        tracing::debug!(
            store_id = %self.store_id,
            version = %version,
            content_hash = %content_hash,
            size_bytes,
            deduplicated,
            "Stored snapshot"
        );

        self.emit(Event::SnapshotPut {
            store_id: self.store_id.clone(),
            version,
            content_hash,
            deduplicated,
        });
        Ok(meta)
    }

    /// Fetch and decode one snapshot
    pub fn get(&self, version: &str) -> Result<Snapshot<T>> {
        let meta = match self.backend.metadata().get(&self.store_id, version) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.emit(Event::SnapshotGet {
                    store_id: self.store_id.clone(),
                    version: version.to_string(),
                    found: false,
                });
                return Err(e);
            }
            Err(e) => return Err(self.fail("get", e)),
        };
        self.finish_get(meta)
    }

    /// Fetch and decode the most recent snapshot
    pub fn get_latest(&self) -> Result<Snapshot<T>> {
        let meta = match self.backend.metadata().get_latest(&self.store_id) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.emit(Event::SnapshotGet {
                    store_id: self.store_id.clone(),
                    version: "<latest>".to_string(),
                    found: false,
                });
                return Err(e);
            }
            Err(e) => return Err(self.fail("get_latest", e)),
        };
        self.finish_get(meta)
    }

    fn finish_get(&self, meta: SnapshotMeta) -> Result<Snapshot<T>> {
        let handle = self
            .backend
            .data()
            .get(&meta.data_key)
            .map_err(|e| self.fail("get", e))?;
        self.emit(Event::DataGet {
            data_key: meta.data_key.clone(),
            found: true,
        });

        let bytes = handle.into_bytes().map_err(|e| self.fail("get", e))?;
        let data = self
            .codec
            .decode(&bytes)
            .map_err(|e| self.fail("get", e))?;

        self.emit(Event::SnapshotGet {
            store_id: meta.store_id.clone(),
            version: meta.version.clone(),
            found: true,
        });
        Ok(Snapshot { meta, data })
    }

    /// Fetch metadata only
    pub fn get_meta(&self, version: &str) -> Result<SnapshotMeta> {
        match self.backend.metadata().get(&self.store_id, version) {
            Ok(meta) => {
                self.emit(Event::MetaGet {
                    store_id: self.store_id.clone(),
                    version: version.to_string(),
                    found: true,
                });
                Ok(meta)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.emit(Event::MetaGet {
                    store_id: self.store_id.clone(),
                    version: version.to_string(),
                    found: false,
                });
                Err(e)
            }
            Err(e) => Err(self.fail("get_meta", e)),
        }
    }

    /// Ordered, filtered metadata listing
    pub fn list(&self, opts: &ListOptions) -> Result<Vec<SnapshotMeta>> {
        let rows = self
            .backend
            .metadata()
            .list(&self.store_id, opts)
            .map_err(|e| self.fail("list", e))?;
        self.emit(Event::MetaList {
            store_id: self.store_id.clone(),
            count: rows.len(),
        });
        Ok(rows)
    }

    /// All snapshots recording the given version of this store as a parent
    pub fn get_children(&self, version: &str) -> Result<Vec<SnapshotMeta>> {
        self.backend
            .metadata()
            .get_children(&self.store_id, version)
            .map_err(|e| self.fail("get_children", e))
    }

    /// Remove one version's metadata
    ///
    /// Data blobs are left in place: they may be shared with other versions.
    pub fn delete(&self, version: &str) -> Result<()> {
        self.backend
            .metadata()
            .delete(&self.store_id, version)
            .map_err(|e| self.fail("delete", e))?;
        self.emit(Event::MetaDelete {
            store_id: self.store_id.clone(),
            version: version.to_string(),
        });
        Ok(())
    }
}

/// Builder for [`SnapshotStore`]
///
/// A backend is required; `build` fails eagerly with `invalid_config`
/// when none was configured.
pub struct SnapshotStoreBuilder<T> {
    store_id: String,
    codec: Arc<dyn Codec<T>>,
    backend: Option<Arc<dyn Backend>>,
    data_key_fn: Option<DataKeyFn>,
    events: Option<EventSink>,
}

impl<T> SnapshotStoreBuilder<T> {
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the default `<store_id>/<content_hash>` data key policy
    pub fn data_key_fn(
        mut self,
        f: impl Fn(&DataKeyInput<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.data_key_fn = Some(Arc::new(f));
        self
    }

    pub fn on_event(mut self, sink: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.events = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> Result<SnapshotStore<T>> {
        let backend = self.backend.ok_or_else(|| {
            invalid_config("no backend configured").with_store_id(self.store_id.clone())
        })?;
        Ok(SnapshotStore {
            store_id: self.store_id,
            backend,
            codec: self.codec,
            data_key_fn: self.data_key_fn,
            events: self.events,
        })
    }
}
