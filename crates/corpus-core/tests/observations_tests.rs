// Observations integration tests over the in-memory backend: typed puts,
// queries with staleness filtering, source deletion, and pointer resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use corpus_core::{
    Backend, ErrorKind, JsonCodec, MemoryBackend, NewObservation, ObservationQuery,
    ObservationTypeDef, ObservationsClient, PointerResolver, PutOptions, SerdeSchema,
    SnapshotPointer, SnapshotStore, VersionResolver,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    text: String,
}

fn note_type() -> ObservationTypeDef<SerdeSchema<Note>> {
    ObservationTypeDef::new("note", SerdeSchema::new())
}

fn setup() -> (
    Arc<MemoryBackend>,
    SnapshotStore<serde_json::Value>,
    ObservationsClient,
) {
    let backend = Arc::new(MemoryBackend::new());
    let backend_dyn: Arc<dyn Backend> = backend.clone();
    let store = SnapshotStore::builder("docs", JsonCodec::<SerdeSchema<serde_json::Value>>::of())
        .backend(Arc::clone(&backend_dyn))
        .build()
        .unwrap();
    let client = ObservationsClient::new(backend_dyn).unwrap();
    (backend, store, client)
}

#[test]
fn test_put_then_get_round_trip() {
    let (_, store, client) = setup();
    let meta = store.put(&json!({"n": 1}), PutOptions::default()).unwrap();

    let source = SnapshotPointer::new("docs", meta.version.clone());
    let observation = client
        .put(
            &note_type(),
            NewObservation::new(source.clone(), Note {
                text: "looks right".to_string(),
            })
            .with_confidence(0.8),
        )
        .unwrap();

    assert!(observation.id.starts_with("obs_"));
    assert_eq!(observation.kind, "note");
    assert_eq!(observation.content.text, "looks right");

    let fetched = client.get(&observation.id).unwrap();
    assert_eq!(fetched.content, json!({"text": "looks right"}));
    assert_eq!(fetched.source, source);
    assert_eq!(fetched.confidence, Some(0.8));

    let typed = fetched.decode(&note_type()).unwrap();
    assert_eq!(typed.content.text, "looks right");
}

#[test]
fn test_put_rejects_content_failing_the_schema() {
    struct NonEmptyNote;

    impl corpus_core::Schema for NonEmptyNote {
        type Output = Note;

        fn parse(&self, value: serde_json::Value) -> corpus_core::Result<Note> {
            let note: Note = serde_json::from_value(value)
                .map_err(|e| corpus_core::errors::validation_error(e.to_string()))?;
            if note.text.is_empty() {
                return Err(corpus_core::errors::validation_error(
                    "note text must not be empty",
                ));
            }
            Ok(note)
        }
    }

    let (backend, store, client) = setup();
    let meta = store.put(&json!({"n": 1}), PutOptions::default()).unwrap();
    let def = ObservationTypeDef::new("note", NonEmptyNote);

    let err = client
        .put(
            &def,
            NewObservation::new(
                SnapshotPointer::new("docs", meta.version.clone()),
                Note {
                    text: String::new(),
                },
            ),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    // Nothing was written.
    assert_eq!(backend.observation_count(), 0);

    client
        .put(
            &def,
            NewObservation::new(
                SnapshotPointer::new("docs", meta.version),
                Note {
                    text: "fine".to_string(),
                },
            ),
        )
        .unwrap();
    assert_eq!(backend.observation_count(), 1);
}

#[test]
fn test_get_missing_is_observation_not_found() {
    let (_, _, client) = setup();
    let err = client.get("obs_missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObservationNotFound);
}

#[test]
fn test_delete() {
    let (_, store, client) = setup();
    let meta = store.put(&json!({"n": 1}), PutOptions::default()).unwrap();
    let observation = client
        .put(
            &note_type(),
            NewObservation::new(
                SnapshotPointer::new("docs", meta.version),
                Note {
                    text: "x".to_string(),
                },
            ),
        )
        .unwrap();

    client.delete(&observation.id).unwrap();
    let err = client.delete(&observation.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObservationNotFound);
}

#[test]
fn test_default_query_filters_stale_rows() {
    let (_, store, client) = setup();
    let v1 = store.put(&json!({"rev": 1}), PutOptions::default()).unwrap();
    let v2 = store.put(&json!({"rev": 2}), PutOptions::default()).unwrap();

    let _on_v1 = client
        .put(
            &note_type(),
            NewObservation::new(
                SnapshotPointer::new("docs", v1.version.clone()),
                Note {
                    text: "old".to_string(),
                },
            ),
        )
        .unwrap();
    let on_v2 = client
        .put(
            &note_type(),
            NewObservation::new(
                SnapshotPointer::new("docs", v2.version.clone()),
                Note {
                    text: "new".to_string(),
                },
            ),
        )
        .unwrap();

    // Default query: only the observation on the latest version survives.
    let fresh = client.query(&ObservationQuery::default()).unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].id, on_v2.id);

    // include_stale yields both.
    let all = client
        .query(&ObservationQuery {
            include_stale: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(all.len(), 2);

    // Staleness checks per pointer.
    assert!(client
        .is_stale(&SnapshotPointer::new("docs", v1.version.clone()))
        .unwrap());
    assert!(!client
        .is_stale(&SnapshotPointer::new("docs", v2.version.clone()))
        .unwrap());
    // A store with no snapshots has no canonical version.
    assert!(!client
        .is_stale(&SnapshotPointer::new("elsewhere", "v9"))
        .unwrap());
}

#[test]
fn test_pinned_resolver_overrides_latest() {
    let (_, store, client) = setup();
    let v1 = store.put(&json!({"rev": 1}), PutOptions::default()).unwrap();
    let _v2 = store.put(&json!({"rev": 2}), PutOptions::default()).unwrap();

    let on_v1 = client
        .put(
            &note_type(),
            NewObservation::new(
                SnapshotPointer::new("docs", v1.version.clone()),
                Note {
                    text: "pinned".to_string(),
                },
            ),
        )
        .unwrap();

    let mut pinned = BTreeSet::new();
    pinned.insert(v1.version.clone());
    let rows = client
        .query(&ObservationQuery {
            resolver: VersionResolver::Pinned(pinned),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, on_v1.id);
}

#[test]
fn test_callback_resolver_with_fallback() {
    let (_, store, client) = setup();
    let v1 = store.put(&json!({"rev": 1}), PutOptions::default()).unwrap();
    let _v2 = store.put(&json!({"rev": 2}), PutOptions::default()).unwrap();

    client
        .put(
            &note_type(),
            NewObservation::new(
                SnapshotPointer::new("docs", v1.version.clone()),
                Note {
                    text: "old".to_string(),
                },
            ),
        )
        .unwrap();

    // Callback pins docs to v1: the v1 observation is canonical.
    let pin = v1.version.clone();
    let rows = client
        .query(&ObservationQuery {
            resolver: VersionResolver::Resolve(Arc::new(move |store_id| {
                (store_id == "docs").then(|| pin.clone())
            })),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rows.len(), 1);

    // Callback declines: falls back to latest, which is v2, so nothing
    // survives.
    let rows = client
        .query(&ObservationQuery {
            resolver: VersionResolver::Resolve(Arc::new(|_| None)),
            ..Default::default()
        })
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_query_kind_filter_and_meta_projection() {
    let (_, store, client) = setup();
    let meta = store.put(&json!({"n": 1}), PutOptions::default()).unwrap();
    let pointer = SnapshotPointer::new("docs", meta.version.clone());

    client
        .put(
            &note_type(),
            NewObservation::new(pointer.clone(), Note {
                text: "a".to_string(),
            }),
        )
        .unwrap();

    #[derive(Debug, Serialize, Deserialize)]
    struct Score {
        value: f64,
    }
    client
        .put(
            &ObservationTypeDef::<SerdeSchema<Score>>::new("score", SerdeSchema::new()),
            NewObservation::new(pointer.clone(), Score { value: 0.4 }),
        )
        .unwrap();

    let notes = client
        .query(&ObservationQuery {
            kinds: Some(vec!["note".to_string()]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, "note");

    let metas = client.query_meta(&ObservationQuery::default()).unwrap();
    assert_eq!(metas.len(), 2);
    // query_meta carries no content; both rows keep their source pointer.
    assert!(metas.iter().all(|m| m.source == pointer));
}

#[test]
fn test_delete_by_source_path_semantics() {
    let (_, store, client) = setup();
    let meta = store
        .put(&json!({"a": "x", "b": "y"}), PutOptions::default())
        .unwrap();

    let whole = SnapshotPointer::new("docs", meta.version.clone());
    let at_a = whole.clone().with_path("$.a");
    let at_b = whole.clone().with_path("$.b");

    for pointer in [&whole, &at_a, &at_b] {
        client
            .put(
                &note_type(),
                NewObservation::new((*pointer).clone(), Note {
                    text: "x".to_string(),
                }),
            )
            .unwrap();
    }

    // Exact path match removes only that row.
    let removed = client.delete_by_source(&at_a).unwrap();
    assert_eq!(removed, 1);

    // No path removes everything left for the version, paths included.
    let removed = client.delete_by_source(&whole).unwrap();
    assert_eq!(removed, 2);

    let rows = client
        .query(&ObservationQuery {
            include_stale: true,
            ..Default::default()
        })
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_resolve_pointer_through_store() {
    let (_, store, _) = setup();
    let meta = store
        .put(
            &json!({"speeches": [{"text": "Hello, world!"}]}),
            PutOptions::default(),
        )
        .unwrap();

    let mut resolver = PointerResolver::new();
    resolver.register("docs", Arc::new(store.clone()));

    let full = resolver
        .resolve(&SnapshotPointer::new("docs", meta.version.clone()))
        .unwrap();
    assert_eq!(full, json!({"speeches": [{"text": "Hello, world!"}]}));

    let hello = resolver
        .resolve(
            &SnapshotPointer::new("docs", meta.version.clone())
                .with_path("$.speeches[0].text")
                .with_span(0, 5),
        )
        .unwrap();
    assert_eq!(hello, json!("Hello"));

    let err = resolver
        .resolve(&SnapshotPointer::new("docs", "no-such-version"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
