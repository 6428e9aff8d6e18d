//! Domain model
//!
//! Snapshot metadata and lineage, pointers into snapshot content,
//! observation records, and the observability event vocabulary.

mod event;
mod meta;
mod observation;
mod pointer;

pub use event::{Event, EventSink};
pub use meta::{
    default_data_key, DataKeyInput, ListOptions, ParentRef, Snapshot, SnapshotMeta,
};
pub use observation::{
    new_observation_id, NewObservation, Observation, ObservationMeta, ObservationQuery,
    ObservationRecord, ObservationTypeDef, VersionResolver,
};
pub use pointer::{
    key_to_pointer, parse_path, pointer_to_key, PathParseError, PathSegment, SnapshotPointer,
    Span,
};
