// Integration tests for the filesystem backend: on-disk layout, metadata
// filtering, blob handling, and observation rows.

mod common;

use std::sync::Arc;

use corpus_core::backend::{
    Backend, DataPayload, DataStore, MetadataStore, ObservationsAdapter,
};
use corpus_core::model::{ListOptions, ObservationQuery, ParentRef};
use corpus_core::ErrorKind;
use corpus_store::FsBackend;
use tempfile::TempDir;

use common::{meta, observation};

fn setup() -> (Arc<FsBackend>, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let backend = Arc::new(FsBackend::new(dir.path()));
    (backend, dir)
}

#[test]
fn test_meta_round_trip_and_layout() {
    let (backend, dir) = setup();
    let m = meta("docs", "v1", 0);
    backend.metadata().put(&m).unwrap();

    // Per-store metadata file.
    assert!(dir.path().join("docs").join("_meta.json").exists());

    let fetched = backend.metadata().get("docs", "v1").unwrap();
    assert_eq!(fetched, m);
}

#[test]
fn test_meta_upsert_overwrites() {
    let (backend, _dir) = setup();
    let mut m = meta("docs", "v1", 0);
    backend.metadata().put(&m).unwrap();

    m.tags = Some(vec!["revised".to_string()]);
    backend.metadata().put(&m).unwrap();

    let rows = backend.metadata().list("docs", &ListOptions::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tags, Some(vec!["revised".to_string()]));
}

#[test]
fn test_meta_delete_round_trip() {
    let (backend, _dir) = setup();
    backend.metadata().put(&meta("docs", "v1", 0)).unwrap();
    backend.metadata().delete("docs", "v1").unwrap();
    assert_eq!(
        backend.metadata().get("docs", "v1").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    backend.metadata().delete("docs", "v1").unwrap();
}

#[test]
fn test_list_filters_and_order() {
    let (backend, _dir) = setup();
    let mut tagged = meta("docs", "tagged", 2);
    tagged.tags = Some(vec!["a".to_string(), "b".to_string()]);
    backend.metadata().put(&tagged).unwrap();
    backend.metadata().put(&meta("docs", "newest", 0)).unwrap();
    backend.metadata().put(&meta("docs", "oldest", 10)).unwrap();

    let rows = backend.metadata().list("docs", &ListOptions::default()).unwrap();
    let versions: Vec<&str> = rows.iter().map(|m| m.version.as_str()).collect();
    assert_eq!(versions, vec!["newest", "tagged", "oldest"]);

    let rows = backend
        .metadata()
        .list(
            "docs",
            &ListOptions {
                tags: Some(vec!["a".to_string(), "b".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].version, "tagged");

    let rows = backend
        .metadata()
        .list(
            "docs",
            &ListOptions {
                limit: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].version, "newest");
}

#[test]
fn test_get_latest() {
    let (backend, _dir) = setup();
    backend.metadata().put(&meta("docs", "old", 5)).unwrap();
    backend.metadata().put(&meta("docs", "new", 0)).unwrap();
    assert_eq!(backend.metadata().get_latest("docs").unwrap().version, "new");
}

#[test]
fn test_get_children_scans_all_stores() {
    let (backend, _dir) = setup();
    backend.metadata().put(&meta("docs", "v1", 5)).unwrap();

    // Child in a different store still references the docs parent.
    let mut child = meta("derived", "d1", 1);
    child.parents = vec![ParentRef::new("docs", "v1")];
    backend.metadata().put(&child).unwrap();

    let children = backend.metadata().get_children("docs", "v1").unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].store_id, "derived");
}

#[test]
fn test_find_by_hash() {
    let (backend, _dir) = setup();
    let m = meta("docs", "v1", 0);
    backend.metadata().put(&m).unwrap();

    let hit = backend
        .metadata()
        .find_by_hash("docs", &m.content_hash)
        .unwrap();
    assert_eq!(hit.unwrap().version, "v1");

    let miss = backend
        .metadata()
        .find_by_hash("docs", &"0".repeat(64))
        .unwrap();
    assert!(miss.is_none());
}

#[test]
fn test_data_layout_and_round_trip() {
    let (backend, dir) = setup();
    backend
        .data()
        .put("docs/abc123", DataPayload::Bytes(b"payload".to_vec()))
        .unwrap();

    // Slashes in the key are escaped in the file name.
    assert!(dir.path().join("_data").join("docs_abc123.bin").exists());

    let bytes = backend.data().get("docs/abc123").unwrap().into_bytes().unwrap();
    assert_eq!(bytes, b"payload");
    assert!(backend.data().exists("docs/abc123").unwrap());
}

#[test]
fn test_data_put_is_idempotent() {
    let (backend, _dir) = setup();
    backend
        .data()
        .put("k", DataPayload::Bytes(b"same".to_vec()))
        .unwrap();
    backend
        .data()
        .put("k", DataPayload::Bytes(b"same".to_vec()))
        .unwrap();
    let bytes = backend.data().get("k").unwrap().into_bytes().unwrap();
    assert_eq!(bytes, b"same");
}

#[test]
fn test_data_stream_write_and_read() {
    let (backend, _dir) = setup();
    let stream = Box::new(std::io::Cursor::new(b"streamed bytes".to_vec()));
    backend.data().put("k", DataPayload::Stream(stream)).unwrap();

    // Reads come back as a stream over the file.
    let mut reader = backend.data().get("k").unwrap().into_reader();
    let mut buf = Vec::new();
    std::io::Read::read_to_end(&mut reader, &mut buf).unwrap();
    assert_eq!(buf, b"streamed bytes");
}

#[test]
fn test_data_missing_and_delete() {
    let (backend, _dir) = setup();
    assert_eq!(
        backend.data().get("missing").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    backend.data().delete("missing").unwrap();

    backend
        .data()
        .put("k", DataPayload::Bytes(b"x".to_vec()))
        .unwrap();
    backend.data().delete("k").unwrap();
    assert!(!backend.data().exists("k").unwrap());
}

#[test]
fn test_observations_file_round_trip() {
    let (backend, dir) = setup();
    let adapter = backend.observations().unwrap();

    let row = observation("obs_1", "note", "v1", 0);
    adapter.add_one(&row).unwrap();
    assert!(dir.path().join("_observations.json").exists());

    assert_eq!(adapter.get_one("obs_1").unwrap().unwrap(), row);
    assert!(adapter.get_one("obs_2").unwrap().is_none());

    assert!(adapter.remove_one("obs_1").unwrap());
    assert!(!adapter.remove_one("obs_1").unwrap());
}

#[test]
fn test_observations_query_uses_scan_defaults() {
    let (backend, _dir) = setup();
    let adapter = backend.observations().unwrap();
    adapter.add_one(&observation("obs_a", "note", "v1", 5)).unwrap();
    adapter.add_one(&observation("obs_b", "score", "v1", 1)).unwrap();
    adapter.add_one(&observation("obs_c", "note", "v2", 0)).unwrap();

    let rows = adapter
        .query(&ObservationQuery {
            kinds: Some(vec!["note".to_string()]),
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    // created_at descending.
    assert_eq!(ids, vec!["obs_c", "obs_a"]);
}

#[test]
fn test_observations_delete_by_source() {
    let (backend, _dir) = setup();
    let adapter = backend.observations().unwrap();

    let mut with_path = observation("obs_a", "note", "v1", 0);
    with_path.source.path = Some("$.text".to_string());
    adapter.add_one(&with_path).unwrap();
    adapter.add_one(&observation("obs_b", "note", "v1", 0)).unwrap();
    adapter.add_one(&observation("obs_c", "note", "v2", 0)).unwrap();

    // Path given: exact matches only.
    let removed = adapter.delete_by_source("docs", "v1", Some("$.text")).unwrap();
    assert_eq!(removed, 1);

    // No path: everything for the version.
    let removed = adapter.delete_by_source("docs", "v1", None).unwrap();
    assert_eq!(removed, 1);

    assert_eq!(adapter.get_all().unwrap().len(), 1);
}

#[test]
fn test_backend_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let backend = FsBackend::new(dir.path());
        backend.metadata().put(&meta("docs", "v1", 0)).unwrap();
        backend
            .data()
            .put("docs/blob", DataPayload::Bytes(b"persisted".to_vec()))
            .unwrap();
    }

    let backend = FsBackend::new(dir.path());
    assert_eq!(backend.metadata().get("docs", "v1").unwrap().version, "v1");
    let bytes = backend.data().get("docs/blob").unwrap().into_bytes().unwrap();
    assert_eq!(bytes, b"persisted");
}
