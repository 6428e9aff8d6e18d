//! Blob persistence for the filesystem backend
//!
//! One file per data key under `_data/`, published via scratch-file
//! rename. Reads hand back a file stream so callers choose between
//! buffering and streaming.

use std::fs::{self, File};

use corpus_core::backend::{DataHandle, DataPayload, DataStore};
use corpus_core::errors::{data_not_found, io_error, Result};

use super::{replace_file, FsBackend};

impl DataStore for FsBackend {
    fn get(&self, data_key: &str) -> Result<DataHandle> {
        let path = self.data_path(data_key);
        match File::open(&path) {
            Ok(file) => Ok(DataHandle::Stream(Box::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(data_not_found(data_key).with_op("data_get"))
            }
            Err(e) => Err(io_error("data_get", e)),
        }
    }

    fn put(&self, data_key: &str, payload: DataPayload) -> Result<()> {
        // Single pass over the payload; the write itself is buffered.
        let bytes = payload.into_bytes()?;
        replace_file(&self.data_path(data_key), &bytes)?;
        tracing::debug!(data_key = %data_key, size_bytes = bytes.len(), "Wrote data blob");
        Ok(())
    }

    fn delete(&self, data_key: &str) -> Result<()> {
        match fs::remove_file(self.data_path(data_key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("data_delete", e)),
        }
    }

    fn exists(&self, data_key: &str) -> Result<bool> {
        Ok(self.data_path(data_key).exists())
    }
}
