use std::sync::Arc;

/// Observability events emitted synchronously at backend boundaries
///
/// Plain tagged records carrying the identifying keys; puts also say
/// whether deduplication occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    MetaGet {
        store_id: String,
        version: String,
        found: bool,
    },
    MetaPut {
        store_id: String,
        version: String,
    },
    MetaDelete {
        store_id: String,
        version: String,
    },
    MetaList {
        store_id: String,
        count: usize,
    },
    DataGet {
        data_key: String,
        found: bool,
    },
    DataPut {
        data_key: String,
        deduplicated: bool,
    },
    DataDelete {
        data_key: String,
    },
    SnapshotGet {
        store_id: String,
        version: String,
        found: bool,
    },
    SnapshotPut {
        store_id: String,
        version: String,
        content_hash: String,
        deduplicated: bool,
    },
    Error {
        op: String,
        code: &'static str,
        message: String,
    },
}

/// Synchronous event callback shared across clones of a store handle
pub type EventSink = Arc<dyn Fn(&Event) + Send + Sync>;
