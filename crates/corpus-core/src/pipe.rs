//! Fallible pipeline combinator
//!
//! A thin monadic wrapper over [`Result`] that composes maps and recoveries
//! without nested branching at call sites.

use crate::errors::{Error, ErrorKind, Result};

/// Result pipeline
pub struct Pipe<T>(Result<T>);

impl<T> Pipe<T> {
    /// Start a pipeline from a value
    pub fn start(value: T) -> Self {
        Pipe(Ok(value))
    }

    /// Start a pipeline from an existing result
    pub fn from_result(result: Result<T>) -> Self {
        Pipe(result)
    }

    /// Transform the success value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Pipe<U> {
        Pipe(self.0.map(f))
    }

    /// Chain a fallible step
    pub fn flat_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Pipe<U> {
        Pipe(self.0.and_then(f))
    }

    /// Transform the error
    pub fn map_err(self, f: impl FnOnce(Error) -> Error) -> Pipe<T> {
        Pipe(self.0.map_err(f))
    }

    /// Observe the success value without consuming it
    pub fn tap(self, f: impl FnOnce(&T)) -> Pipe<T> {
        if let Ok(value) = &self.0 {
            f(value);
        }
        self
    }

    /// Observe the error without consuming it
    pub fn tap_err(self, f: impl FnOnce(&Error)) -> Pipe<T> {
        if let Err(err) = &self.0 {
            f(err);
        }
        self
    }

    /// Recover from a specific error kind with a fallback computation
    pub fn recover(self, kind: ErrorKind, f: impl FnOnce(Error) -> Result<T>) -> Pipe<T> {
        match self.0 {
            Err(err) if err.kind() == kind => Pipe(f(err)),
            other => Pipe(other),
        }
    }

    /// Terminal: the success value or a default
    pub fn unwrap_or(self, default: T) -> T {
        self.0.unwrap_or(default)
    }

    /// Terminal: back to a plain result
    pub fn finish(self) -> Result<T> {
        self.0
    }
}
