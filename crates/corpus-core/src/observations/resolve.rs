//! Pointer resolution
//!
//! Resolves a pointer to the value it addresses: the whole decoded
//! document, the value at a restricted JSON path, or a character span of a
//! string reached by that path.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::SnapshotStore;
use crate::errors::{validation_error, Error, ErrorKind, Result};
use crate::model::{parse_path, PathSegment, SnapshotPointer, Span};

/// A store that can produce the decoded JSON value of one of its versions
pub trait SnapshotSource: Send + Sync {
    fn fetch_value(&self, version: &str) -> Result<Value>;
}

impl<T: serde::Serialize> SnapshotSource for SnapshotStore<T> {
    fn fetch_value(&self, version: &str) -> Result<Value> {
        let snapshot = self.get(version)?;
        serde_json::to_value(&snapshot.data).map_err(|e| {
            Error::new(ErrorKind::DecodeError)
                .with_op("fetch_value")
                .with_store_id(self.store_id())
                .with_version(version)
                .with_message(e.to_string())
        })
    }
}

/// Registry of stores, resolving pointers against any of them
#[derive(Default)]
pub struct PointerResolver {
    sources: HashMap<String, Arc<dyn SnapshotSource>>,
}

impl PointerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under its ID
    pub fn register(&mut self, store_id: impl Into<String>, source: Arc<dyn SnapshotSource>) {
        self.sources.insert(store_id.into(), source);
    }

    /// Resolve a pointer to the value it addresses
    ///
    /// Unknown stores are `not_found`. A path that traverses through a
    /// null or scalar value is `not_found`; a missing terminal property
    /// resolves to `Null`. A span applies only when the resolved value is
    /// a string; on other values it is ignored.
    pub fn resolve(&self, pointer: &SnapshotPointer) -> Result<Value> {
        let source = self.sources.get(&pointer.store_id).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_op("resolve_pointer")
                .with_store_id(pointer.store_id.clone())
                .with_message("unknown store")
        })?;

        let mut value = source.fetch_value(&pointer.version)?;

        if let Some(path) = &pointer.path {
            value = resolve_path(&value, path)?;
        }

        if let Some(span) = &pointer.span {
            if let Value::String(s) = &value {
                value = Value::String(apply_span(s, span)?);
            }
        }

        Ok(value)
    }
}

/// Walk a restricted JSON path through a value
pub fn resolve_path(value: &Value, path: &str) -> Result<Value> {
    let segments = parse_path(path)?;
    let mut current = value;

    for segment in &segments {
        match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => match map.get(key) {
                Some(next) => current = next,
                None => return Ok(Value::Null),
            },
            (PathSegment::Index(index), Value::Array(items)) => match items.get(*index) {
                Some(next) => current = next,
                None => return Ok(Value::Null),
            },
            (segment, _) => {
                return Err(Error::new(ErrorKind::NotFound)
                    .with_op("resolve_path")
                    .with_message(format!(
                        "path segment {:?} traverses through a non-container value",
                        segment
                    )))
            }
        }
    }

    Ok(current.clone())
}

/// Cut a character span out of a string
///
/// `start` and `end` are character offsets; `start <= end <= length`.
pub fn apply_span(s: &str, span: &Span) -> Result<String> {
    let length = s.chars().count();
    if span.start > span.end {
        return Err(validation_error(format!(
            "span start {} exceeds end {}",
            span.start, span.end
        ))
        .with_op("apply_span"));
    }
    if span.end > length {
        return Err(validation_error(format!(
            "span end {} exceeds string length {}",
            span.end, length
        ))
        .with_op("apply_span"));
    }
    Ok(s.chars().skip(span.start).take(span.end - span.start).collect())
}
