use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{validation_error, Error};

/// Character span into a resolved string value
///
/// `start` and `end` are character offsets; `start <= end <= length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Pointer into a specific location of an existing snapshot
///
/// Addresses a whole document, a JSON path within it, or a character span
/// of a string reached by that path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPointer {
    pub store_id: String,
    pub version: String,
    /// Restricted JSON-path: root `$`, dot property access, bracketed index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Applies only when the resolved value is a string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl SnapshotPointer {
    pub fn new(store_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            version: version.into(),
            path: None,
            span: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some(Span::new(start, end));
        self
    }
}

/// One step of a parsed pointer path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Dot property access
    Key(String),
    /// Bracketed array index
    Index(usize),
}

/// Parse failure for the restricted JSON-path grammar
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathParseError {
    #[error("empty path segment at byte {0}")]
    EmptySegment(usize),
    #[error("unterminated index at byte {0}")]
    UnterminatedIndex(usize),
    #[error("invalid index '{0}'")]
    InvalidIndex(String),
    #[error("unexpected character '{0}' at byte {1}")]
    UnexpectedChar(char, usize),
}

impl From<PathParseError> for Error {
    fn from(err: PathParseError) -> Self {
        validation_error(err.to_string()).with_op("parse_path")
    }
}

/// Parse a restricted JSON-path expression into segments
///
/// Grammar: `('$' ('.')? | '')? (segment ('.' segment | '[' digits ']')*)?`
/// where `segment` is a non-empty identifier. `$`, `$.` and the empty path
/// all address the whole document.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathParseError> {
    let mut rest = path;
    let mut offset = 0;

    if let Some(stripped) = rest.strip_prefix('$') {
        rest = stripped;
        offset += 1;
        if let Some(stripped) = rest.strip_prefix('.') {
            rest = stripped;
            offset += 1;
        }
    }

    let mut segments = Vec::new();
    let bytes = rest.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                let close = rest[i..]
                    .find(']')
                    .map(|p| i + p)
                    .ok_or(PathParseError::UnterminatedIndex(offset + i))?;
                let digits = &rest[i + 1..close];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(PathParseError::InvalidIndex(digits.to_string()));
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| PathParseError::InvalidIndex(digits.to_string()))?;
                segments.push(PathSegment::Index(index));
                i = close + 1;
                // After an index: another index, a dot, or the end.
                if i < bytes.len() {
                    match bytes[i] {
                        b'.' => i += 1,
                        b'[' => {}
                        other => {
                            return Err(PathParseError::UnexpectedChar(
                                other as char,
                                offset + i,
                            ))
                        }
                    }
                }
            }
            b'.' => return Err(PathParseError::EmptySegment(offset + i)),
            _ => {
                let end = rest[i..]
                    .find(['.', '['])
                    .map(|p| i + p)
                    .unwrap_or(rest.len());
                let segment = &rest[i..end];
                if segment.is_empty() {
                    return Err(PathParseError::EmptySegment(offset + i));
                }
                segments.push(PathSegment::Key(segment.to_string()));
                i = end;
                if i < bytes.len() && bytes[i] == b'.' {
                    i += 1;
                    if i >= bytes.len() {
                        return Err(PathParseError::EmptySegment(offset + i));
                    }
                }
            }
        }
    }

    Ok(segments)
}

/// Render a pointer as a stable colon-joined text key
///
/// `store_id:version`, extended with `:path` and `:start-end` when present.
/// Round-trips through [`key_to_pointer`] for paths without colons.
pub fn pointer_to_key(pointer: &SnapshotPointer) -> String {
    let mut key = format!("{}:{}", pointer.store_id, pointer.version);
    if pointer.path.is_some() || pointer.span.is_some() {
        key.push(':');
        if let Some(path) = &pointer.path {
            key.push_str(path);
        }
    }
    if let Some(span) = &pointer.span {
        key.push_str(&format!(":{}-{}", span.start, span.end));
    }
    key
}

/// Parse a pointer key produced by [`pointer_to_key`]
pub fn key_to_pointer(key: &str) -> crate::errors::Result<SnapshotPointer> {
    let parts: Vec<&str> = key.split(':').collect();
    if parts.len() < 2 || parts.len() > 4 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(validation_error(format!("malformed pointer key '{}'", key))
            .with_op("key_to_pointer"));
    }

    let mut pointer = SnapshotPointer::new(parts[0], parts[1]);
    if parts.len() >= 3 && !parts[2].is_empty() {
        pointer.path = Some(parts[2].to_string());
    }
    if parts.len() == 4 {
        let (start, end) = parts[3]
            .split_once('-')
            .ok_or_else(|| {
                validation_error(format!("malformed span in pointer key '{}'", key))
                    .with_op("key_to_pointer")
            })?;
        let start = start.parse::<usize>().map_err(|_| {
            validation_error(format!("malformed span in pointer key '{}'", key))
                .with_op("key_to_pointer")
        })?;
        let end = end.parse::<usize>().map_err(|_| {
            validation_error(format!("malformed span in pointer key '{}'", key))
                .with_op("key_to_pointer")
        })?;
        pointer.span = Some(Span::new(start, end));
    }

    Ok(pointer)
}
