//! Error helpers for corpus-store
//!
//! Wraps corpus-core's error facility with store-specific constructors.

use corpus_core::errors::{storage_error, Error};

pub use corpus_core::errors::{io_error, Result};

/// Create a storage error from a rusqlite error
pub fn from_rusqlite(op: &str, err: rusqlite::Error) -> Error {
    storage_error(op, err)
}

/// Create a storage error from a serialization failure at a storage boundary
pub fn corrupt_file(op: &str, err: serde_json::Error) -> Error {
    storage_error(op, err)
}
