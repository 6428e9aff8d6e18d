//! corpus-core - Versioned, content-addressed snapshot store
//!
//! Domain kernel for the corpus workspace:
//! - Snapshot metadata model with lineage and content-addressed dedup
//! - Codec pipeline (JSON + schema validation, text, raw bytes)
//! - Backend traits for metadata, data, and observation storage, plus the
//!   in-memory backend
//! - Snapshot engine orchestrating encode → hash → dedup → persist
//! - Observations: typed facts pointing into snapshot locations, with
//!   staleness tracking
//! - Filter pipeline, fallible pipe combinator, and concurrency utilities
//!
//! Persistent backends (filesystem, SQLite, layered) live in corpus-store.

pub mod backend;
pub mod codec;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod hash;
pub mod logging;
pub mod model;
pub mod observations;
pub mod parallel;
pub mod pipe;
pub mod version;

// Re-export commonly used types
pub use backend::{
    Backend, DataHandle, DataPayload, DataStore, MetadataStore, ObservationsAdapter,
};
pub use backend::memory::MemoryBackend;
pub use codec::{BytesCodec, Codec, JsonCodec, Schema, SerdeSchema, TextCodec};
pub use engine::{PutOptions, SnapshotStore, SnapshotStoreBuilder};
pub use errors::{Error, ErrorKind, Result, ResultExt};
pub use hash::content_hash;
pub use model::{
    Event, EventSink, ListOptions, NewObservation, Observation, ObservationMeta,
    ObservationQuery, ObservationRecord, ObservationTypeDef, ParentRef, Snapshot,
    SnapshotMeta, SnapshotPointer, Span, VersionResolver,
};
pub use observations::{ObservationsClient, PointerResolver, SnapshotSource};
pub use version::next_version;
