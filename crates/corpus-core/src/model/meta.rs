use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lineage reference to a parent snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
    pub store_id: String,
    pub version: String,
    /// Optional role label (e.g. "input", "baseline"); not used for matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ParentRef {
    pub fn new(store_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            version: version.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// The unit of versioning: immutable metadata for one snapshot
///
/// `(store_id, version)` is unique; identical content within a store shares
/// a `data_key`, so deleting one metadata entry never deletes the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Stable identifier of the logical store
    pub store_id: String,

    /// Unique, time-sortable version string (immutable once assigned)
    pub version: String,

    /// Lowercase hex SHA-256 of the encoded payload
    pub content_hash: String,

    /// MIME label declared by the codec
    pub content_type: String,

    /// Length of the encoded payload at put time
    pub size_bytes: u64,

    /// Opaque key of the physical blob in the data store
    pub data_key: String,

    /// Wall-clock instant when this metadata was assembled
    pub created_at: DateTime<Utc>,

    /// Optional caller-supplied logical event time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoked_at: Option<DateTime<Utc>>,

    /// Ordered lineage references; forms a DAG by convention
    #[serde(default)]
    pub parents: Vec<ParentRef>,

    /// Optional ordered list of short tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl SnapshotMeta {
    /// True if `parents` contains the given `(store_id, version)` pair
    ///
    /// The `role` field does not participate in the match.
    pub fn has_parent(&self, store_id: &str, version: &str) -> bool {
        self.parents
            .iter()
            .any(|p| p.store_id == store_id && p.version == version)
    }

    /// Descending `(created_at, version)` comparison used for listings
    pub fn cmp_listing(&self, other: &Self) -> std::cmp::Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.version.cmp(&self.version))
    }
}

/// A decoded snapshot: metadata plus a transient decoded view of the data
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub meta: SnapshotMeta,
    pub data: T,
}

/// Filtering options for metadata listings
///
/// Ordering is always `created_at` descending with `version` descending as
/// the tie-break; `limit` caps the result after filtering and sorting.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Strict `created_at < before`
    pub before: Option<DateTime<Utc>>,
    /// Strict `created_at > after`
    pub after: Option<DateTime<Utc>>,
    /// Every listed tag must be present on the meta (AND semantics)
    pub tags: Option<Vec<String>>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

/// Inputs available to a store-level data key policy
#[derive(Debug, Clone, Copy)]
pub struct DataKeyInput<'a> {
    pub store_id: &'a str,
    pub version: &'a str,
    pub content_hash: &'a str,
    pub tags: Option<&'a [String]>,
}

/// Default data key policy: `<store_id>/<content_hash>`
pub fn default_data_key(store_id: &str, content_hash: &str) -> String {
    format!("{}/{}", store_id, content_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(version: &str, created_at: DateTime<Utc>) -> SnapshotMeta {
        SnapshotMeta {
            store_id: "s".to_string(),
            version: version.to_string(),
            content_hash: "h".repeat(64),
            content_type: "application/json".to_string(),
            size_bytes: 2,
            data_key: default_data_key("s", &"h".repeat(64)),
            created_at,
            invoked_at: None,
            parents: Vec::new(),
            tags: None,
        }
    }

    #[test]
    fn test_has_parent_ignores_role() {
        let mut m = meta("v2", Utc::now());
        m.parents = vec![ParentRef::new("s", "v1").with_role("baseline")];
        assert!(m.has_parent("s", "v1"));
        assert!(!m.has_parent("s", "v2"));
        assert!(!m.has_parent("other", "v1"));
    }

    #[test]
    fn test_cmp_listing_orders_created_desc_then_version_desc() {
        let now = Utc::now();
        let older = meta("a", now - chrono::Duration::seconds(5));
        let newer = meta("b", now);
        assert_eq!(newer.cmp_listing(&older), std::cmp::Ordering::Less);

        let tie_low = meta("a", now);
        let tie_high = meta("b", now);
        assert_eq!(tie_high.cmp_listing(&tie_low), std::cmp::Ordering::Less);
    }

    #[test]
    fn test_default_data_key_policy() {
        assert_eq!(default_data_key("speeches", "abc"), "speeches/abc");
    }

    #[test]
    fn test_meta_serde_round_trip() {
        let mut m = meta("v1", Utc::now());
        m.tags = Some(vec!["a".to_string(), "b".to_string()]);
        m.parents = vec![ParentRef::new("s", "v0")];
        let json = serde_json::to_string(&m).unwrap();
        let back: SnapshotMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
