//! corpus-store - Persistence layer for the corpus snapshot store
//!
//! Provides:
//! - Local filesystem backend (per-store metadata file, per-content data
//!   file, observations file) with atomic writes
//! - Embedded SQLite backend (metadata and observation rows in SQL, blobs
//!   in a composed data store) with a migrations framework
//! - Layered backend combining read-fallback and write-fanout over an
//!   ordered list of backends

pub mod errors;
pub mod fs;
pub mod layered;
pub mod sqlite;

pub use fs::FsBackend;
pub use layered::{LayeredBackend, ListStrategy};
pub use sqlite::SqliteBackend;
