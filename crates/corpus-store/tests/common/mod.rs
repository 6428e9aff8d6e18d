// Shared fixtures for backend integration tests.

use chrono::{Duration, Utc};
use corpus_core::model::{ObservationRecord, SnapshotMeta, SnapshotPointer};

/// Build a metadata row created `minutes_ago` minutes in the past
pub fn meta(store_id: &str, version: &str, minutes_ago: i64) -> SnapshotMeta {
    let content_hash = corpus_core::content_hash(version.as_bytes());
    SnapshotMeta {
        store_id: store_id.to_string(),
        version: version.to_string(),
        data_key: format!("{}/{}", store_id, content_hash),
        content_hash,
        content_type: "application/json".to_string(),
        size_bytes: 2,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        invoked_at: None,
        parents: Vec::new(),
        tags: None,
    }
}

/// Build an observation row created `minutes_ago` minutes in the past
pub fn observation(id: &str, kind: &str, version: &str, minutes_ago: i64) -> ObservationRecord {
    ObservationRecord {
        id: id.to_string(),
        kind: kind.to_string(),
        source: SnapshotPointer::new("docs", version),
        content: serde_json::json!({"id": id}),
        confidence: None,
        observed_at: None,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        derived_from: None,
    }
}
