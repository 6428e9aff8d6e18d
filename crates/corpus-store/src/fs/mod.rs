//! Local filesystem backend
//!
//! On-disk layout under the base directory:
//!
//! ```text
//! <base>/<store_id>/_meta.json        JSON array of [version, SnapshotMeta] pairs
//! <base>/_data/<escaped_data_key>.bin raw bytes; `/` in the key becomes `_`
//! <base>/_observations.json           JSON array of observation rows
//! ```
//!
//! Every file replacement goes through a uniquely named scratch file in
//! the target directory followed by a rename, so readers only ever see a
//! complete document. A backend-level mutex serializes the
//! read-modify-write cycles on the JSON documents.

mod data;
mod meta;
mod observations;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use corpus_core::backend::{Backend, DataStore, MetadataStore, ObservationsAdapter};
use corpus_core::model::{ObservationRecord, SnapshotMeta};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{corrupt_file, io_error, Result};

const META_FILE: &str = "_meta.json";
const DATA_DIR: &str = "_data";
const OBSERVATIONS_FILE: &str = "_observations.json";

/// Distinguishes concurrent scratch files aimed at the same target.
static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Swap `bytes` into place at `target` without exposing partial writes
///
/// The content lands in a `.{name}.{seq}.part` sibling first; the rename
/// is the only transition a reader can observe. Each call gets its own
/// scratch name, so two writers racing on one target cannot clobber each
/// other's half-written scratch file.
fn replace_file(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| io_error("create_dir", e))?;

    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let scratch = dir.join(format!(".{}.{}.part", name, seq));

    let mut out = fs::File::create(&scratch).map_err(|e| io_error("create_scratch", e))?;
    out.write_all(bytes).map_err(|e| io_error("write_scratch", e))?;
    drop(out);

    fs::rename(&scratch, target).map_err(|e| io_error("publish_file", e))
}

/// Filesystem-backed snapshot backend
pub struct FsBackend {
    base: PathBuf,
    write_lock: Mutex<()>,
}

impl FsBackend {
    /// Create a backend rooted at the given directory
    ///
    /// The directory is created lazily on first write.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn meta_path(&self, store_id: &str) -> PathBuf {
        self.base.join(store_id).join(META_FILE)
    }

    fn data_path(&self, data_key: &str) -> PathBuf {
        let escaped = data_key.replace('/', "_");
        self.base.join(DATA_DIR).join(format!("{}.bin", escaped))
    }

    fn observations_path(&self) -> PathBuf {
        self.base.join(OBSERVATIONS_FILE)
    }

    /// Read one of the backend's JSON documents; absence is an empty
    /// default, a present-but-unparsable file is a storage error
    fn read_document<T>(&self, path: &Path, op: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| corrupt_file(op, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(io_error(op, e)),
        }
    }

    fn write_document<T: Serialize>(&self, path: &Path, value: &T, op: &str) -> Result<()> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| corrupt_file(op, e))?;
        replace_file(path, &json)
    }

    /// Load one store's metadata rows
    fn load_meta(&self, store_id: &str) -> Result<Vec<(String, SnapshotMeta)>> {
        self.read_document(&self.meta_path(store_id), "read_meta")
    }

    fn save_meta(&self, store_id: &str, rows: &[(String, SnapshotMeta)]) -> Result<()> {
        self.write_document(&self.meta_path(store_id), &rows, "write_meta")
    }

    fn load_observations(&self) -> Result<Vec<ObservationRecord>> {
        self.read_document(&self.observations_path(), "read_observations")
    }

    fn save_observations(&self, rows: &[ObservationRecord]) -> Result<()> {
        self.write_document(&self.observations_path(), &rows, "write_observations")
    }

    /// Store directories currently present under the base
    fn store_ids(&self) -> Result<Vec<String>> {
        if !self.base.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let entries = fs::read_dir(&self.base).map_err(|e| io_error("read_base_dir", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_error("read_base_dir", e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == DATA_DIR {
                continue;
            }
            if path.join(META_FILE).exists() {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl Backend for FsBackend {
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
