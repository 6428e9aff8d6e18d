//! Error facility for the corpus workspace
//!
//! Single structured error type with a stable kind taxonomy. Each kind maps
//! to a wire-stable code usable for programmatic handling, testing, and
//! external API responses.

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error kind taxonomy
///
/// Domain misses (`NotFound`, `ObservationNotFound`) are expected and are
/// recovered via fallbacks; composite backends treat them as "try the next
/// backend". Everything else surfaces to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    StorageError,
    DecodeError,
    EncodeError,
    HashMismatch,
    InvalidConfig,
    ValidationError,
    ObservationNotFound,
}

impl ErrorKind {
    /// Get the stable wire code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::EncodeError => "encode_error",
            ErrorKind::HashMismatch => "hash_mismatch",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ObservationNotFound => "observation_not_found",
        }
    }

    /// True for domain misses that composites recover from
    pub fn is_miss(&self) -> bool {
        matches!(self, ErrorKind::NotFound | ErrorKind::ObservationNotFound)
    }
}

/// Canonical structured error type
///
/// Carries a kind plus optional context fields for debugging. Context is
/// attached with builder-style methods; the underlying cause (if any) is
/// preserved through `std::error::Error::source`.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    op: Option<String>,
    store_id: Option<String>,
    version: Option<String>,
    data_key: Option<String>,
    observation_id: Option<String>,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the specified kind
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            op: None,
            store_id: None,
            version: None,
            data_key: None,
            observation_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add store ID context
    pub fn with_store_id(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    /// Add version context
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add data key context
    pub fn with_data_key(mut self, data_key: impl Into<String>) -> Self {
        self.data_key = Some(data_key.into());
        self
    }

    /// Add observation ID context
    pub fn with_observation_id(mut self, id: impl Into<String>) -> Self {
        self.observation_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add the underlying cause
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the stable wire code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the store ID context, if any
    pub fn store_id(&self) -> Option<&str> {
        self.store_id.as_deref()
    }

    /// Get the version context, if any
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Get the data key context, if any
    pub fn data_key(&self) -> Option<&str> {
        self.data_key.as_deref()
    }

    /// Get the observation ID context, if any
    pub fn observation_id(&self) -> Option<&str> {
        self.observation_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(store_id) = &self.store_id {
            write!(f, " (store_id: {})", store_id)?;
        }
        if let Some(version) = &self.version {
            write!(f, " (version: {})", version)?;
        }
        if let Some(data_key) = &self.data_key {
            write!(f, " (data_key: {})", data_key)?;
        }
        if let Some(id) = &self.observation_id {
            write!(f, " (observation_id: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|s| {
            let cause: &(dyn std::error::Error + 'static) = s.as_ref();
            cause
        })
    }
}

/// Create a snapshot-not-found error
pub fn not_found(store_id: &str, version: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_store_id(store_id)
        .with_version(version)
        .with_message("snapshot not found")
}

/// Create a data-blob-not-found error
pub fn data_not_found(data_key: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_data_key(data_key)
        .with_message("data blob not found")
}

/// Create an observation-not-found error
pub fn observation_not_found(id: &str) -> Error {
    Error::new(ErrorKind::ObservationNotFound)
        .with_observation_id(id)
        .with_message("observation not found")
}

/// Create a storage error wrapping a cause and an operation tag
pub fn storage_error(
    op: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> Error {
    let message = source.to_string();
    Error::new(ErrorKind::StorageError)
        .with_op(op)
        .with_message(message)
        .with_source(source)
}

/// Create an IO storage error
pub fn io_error(op: &str, err: std::io::Error) -> Error {
    storage_error(op, err)
}

/// Create an encode error
pub fn encode_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::EncodeError).with_message(message)
}

/// Create a decode error
pub fn decode_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::DecodeError).with_message(message)
}

/// Create a validation error
pub fn validation_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::ValidationError).with_message(message)
}

/// Create a configuration error
pub fn invalid_config(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidConfig).with_message(message)
}

/// Miss-recovery helpers for result chains
pub trait ResultExt<T> {
    /// Convert domain misses into `Ok(None)`; other errors pass through
    fn to_nullable(self) -> Result<Option<T>>;

    /// Recover from a specific kind with a fallback computation
    fn fallback_on(self, kind: ErrorKind, f: impl FnOnce(Error) -> Result<T>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn to_nullable(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind().is_miss() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn fallback_on(self, kind: ErrorKind, f: impl FnOnce(Error) -> Result<T>) -> Result<T> {
        match self {
            Err(e) if e.kind() == kind => f(e),
            other => other,
        }
    }
}
