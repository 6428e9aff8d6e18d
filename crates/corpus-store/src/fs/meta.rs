//! Metadata persistence for the filesystem backend
//!
//! Each store keeps a `_meta.json` file holding `[version, SnapshotMeta]`
//! pairs; listings filter and sort in memory.

use corpus_core::backend::MetadataStore;
use corpus_core::errors::{not_found, Result};
use corpus_core::filter::RowPipeline;
use corpus_core::model::{ListOptions, SnapshotMeta};

use super::FsBackend;

impl MetadataStore for FsBackend {
    fn get(&self, store_id: &str, version: &str) -> Result<SnapshotMeta> {
        self.load_meta(store_id)?
            .into_iter()
            .find(|(v, _)| v == version)
            .map(|(_, meta)| meta)
            .ok_or_else(|| not_found(store_id, version).with_op("meta_get"))
    }

    fn put(&self, meta: &SnapshotMeta) -> Result<()> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let mut rows = self.load_meta(&meta.store_id)?;
        match rows.iter_mut().find(|(v, _)| *v == meta.version) {
            Some(row) => row.1 = meta.clone(),
            None => rows.push((meta.version.clone(), meta.clone())),
        }
        self.save_meta(&meta.store_id, &rows)
    }

    fn delete(&self, store_id: &str, version: &str) -> Result<()> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let mut rows = self.load_meta(store_id)?;
        let before = rows.len();
        rows.retain(|(v, _)| v != version);
        if rows.len() != before {
            self.save_meta(store_id, &rows)?;
        }
        Ok(())
    }

    fn list(&self, store_id: &str, opts: &ListOptions) -> Result<Vec<SnapshotMeta>> {
        let rows: Vec<SnapshotMeta> = self
            .load_meta(store_id)?
            .into_iter()
            .map(|(_, meta)| meta)
            .collect();

        let tags = opts.tags.as_deref().filter(|t| !t.is_empty());
        Ok(RowPipeline::new(rows)
            .filter_when(opts.before.as_ref(), |m, before| m.created_at < *before)
            .filter_when(opts.after.as_ref(), |m, after| m.created_at > *after)
            .filter_when(tags, |m, wanted: &[String]| {
                m.tags
                    .as_ref()
                    .map_or(false, |own| wanted.iter().all(|t| own.contains(t)))
            })
            .sort_by(|a, b| a.cmp_listing(b))
            .limit(opts.limit)
            .into_vec())
    }

    fn get_children(
        &self,
        parent_store_id: &str,
        parent_version: &str,
    ) -> Result<Vec<SnapshotMeta>> {
        let mut children = Vec::new();
        for store_id in self.store_ids()? {
            for (_, meta) in self.load_meta(&store_id)? {
                if meta.has_parent(parent_store_id, parent_version) {
                    children.push(meta);
                }
            }
        }
        children.sort_by(|a, b| a.cmp_listing(b));
        Ok(children)
    }

    fn find_by_hash(
        &self,
        store_id: &str,
        content_hash: &str,
    ) -> Result<Option<SnapshotMeta>> {
        Ok(self
            .load_meta(store_id)?
            .into_iter()
            .map(|(_, meta)| meta)
            .filter(|m| m.content_hash == content_hash)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.version.cmp(&b.version))
            }))
    }
}
