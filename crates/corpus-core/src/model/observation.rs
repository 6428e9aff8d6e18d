use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Schema;
use crate::errors::Result;
use crate::model::pointer::SnapshotPointer;

/// Persisted observation row: content held as raw JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Unique identifier (`obs_<timestamp36>_<random36>`; opaque to consumers)
    pub id: String,

    /// Name of the observation type this row was validated against
    #[serde(rename = "type")]
    pub kind: String,

    /// Location in an existing snapshot this observation is about
    pub source: SnapshotPointer,

    /// Schema-validated payload
    pub content: serde_json::Value,

    /// Caller-asserted confidence in `[0, 1]` (policy, not enforced)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// When the fact was observed (logical time)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,

    /// Stamped on write
    pub created_at: DateTime<Utc>,

    /// Provenance chain; not lineage-linked through snapshot parents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<Vec<SnapshotPointer>>,
}

impl ObservationRecord {
    /// Descending `(created_at, id)` comparison used for query ordering
    pub fn cmp_query(&self, other: &Self) -> std::cmp::Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A typed observation: the decoded view of an [`ObservationRecord`]
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T> {
    pub id: String,
    pub kind: String,
    pub source: SnapshotPointer,
    pub content: T,
    pub confidence: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub derived_from: Option<Vec<SnapshotPointer>>,
}

impl From<ObservationRecord> for Observation<serde_json::Value> {
    fn from(record: ObservationRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            source: record.source,
            content: record.content,
            confidence: record.confidence,
            observed_at: record.observed_at,
            created_at: record.created_at,
            derived_from: record.derived_from,
        }
    }
}

impl Observation<serde_json::Value> {
    /// Decode the raw content through an observation type's schema
    pub fn decode<S: Schema>(self, def: &ObservationTypeDef<S>) -> Result<Observation<S::Output>> {
        let content = def.schema.parse(self.content)?;
        Ok(Observation {
            id: self.id,
            kind: self.kind,
            source: self.source,
            content,
            confidence: self.confidence,
            observed_at: self.observed_at,
            created_at: self.created_at,
            derived_from: self.derived_from,
        })
    }
}

/// Observation fields without the content payload (`query_meta` view)
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMeta {
    pub id: String,
    pub kind: String,
    pub source: SnapshotPointer,
    pub confidence: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub derived_from: Option<Vec<SnapshotPointer>>,
}

impl From<ObservationRecord> for ObservationMeta {
    fn from(record: ObservationRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            source: record.source,
            confidence: record.confidence,
            observed_at: record.observed_at,
            created_at: record.created_at,
            derived_from: record.derived_from,
        }
    }
}

/// Input for recording a new observation
#[derive(Debug, Clone)]
pub struct NewObservation<T> {
    pub source: SnapshotPointer,
    pub content: T,
    pub confidence: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
    pub derived_from: Option<Vec<SnapshotPointer>>,
}

impl<T> NewObservation<T> {
    pub fn new(source: SnapshotPointer, content: T) -> Self {
        Self {
            source,
            content,
            confidence: None,
            observed_at: None,
            derived_from: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = Some(observed_at);
        self
    }

    pub fn with_derived_from(mut self, derived_from: Vec<SnapshotPointer>) -> Self {
        self.derived_from = Some(derived_from);
        self
    }
}

/// Named observation type with its content schema
pub struct ObservationTypeDef<S> {
    pub name: String,
    pub schema: S,
}

impl<S: Schema> ObservationTypeDef<S> {
    pub fn new(name: impl Into<String>, schema: S) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// How the canonical version of a store is determined during staleness
/// filtering
#[derive(Clone, Default)]
pub enum VersionResolver {
    /// Canonical version is the store's latest (looked up via metadata,
    /// memoized per store within a single query)
    #[default]
    Latest,
    /// Canonical versions are exactly this set
    Pinned(BTreeSet<String>),
    /// Callback per store; `None` falls back to the latest-version rule
    Resolve(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>),
}

impl std::fmt::Debug for VersionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionResolver::Latest => write!(f, "Latest"),
            VersionResolver::Pinned(set) => f.debug_tuple("Pinned").field(set).finish(),
            VersionResolver::Resolve(_) => write!(f, "Resolve(..)"),
        }
    }
}

/// Query options for observations
///
/// The row-level predicates are applied by the storage adapter; staleness
/// filtering (`include_stale`, `resolver`) is applied by the client on the
/// rows the adapter yields.
#[derive(Debug, Clone, Default)]
pub struct ObservationQuery {
    /// Row `type` must equal one of these
    pub kinds: Option<Vec<String>>,
    /// Row source store equals
    pub source_store: Option<String>,
    /// Row source version equals
    pub source_version: Option<String>,
    /// Row source version starts with
    pub source_prefix: Option<String>,
    /// Strict `created_at > after`
    pub created_after: Option<DateTime<Utc>>,
    /// Strict `created_at < before`
    pub created_before: Option<DateTime<Utc>>,
    /// Strict `observed_at > after`; rows without `observed_at` are excluded
    pub observed_after: Option<DateTime<Utc>>,
    /// Strict `observed_at < before`; rows without `observed_at` are excluded
    pub observed_before: Option<DateTime<Utc>>,
    /// Maximum number of rows
    pub limit: Option<usize>,
    /// Yield rows pointing at non-canonical versions too
    pub include_stale: bool,
    /// Canonical-version policy for staleness filtering
    pub resolver: VersionResolver,
}

/// Allocate a new observation identifier
///
/// `obs_<timestamp36>_<random36>`: millisecond timestamp plus 64 bits of
/// entropy, both rendered base36.
pub fn new_observation_id() -> String {
    let ts = Utc::now().timestamp_millis().max(0) as u128;
    let uuid = uuid::Uuid::new_v4();
    let entropy = u128::from_be_bytes(*uuid.as_bytes()) as u64;
    format!("obs_{}_{}", to_base36(ts), to_base36(entropy as u128))
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}
