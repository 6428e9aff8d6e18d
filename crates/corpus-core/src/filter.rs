//! Declarative filter + sort + limit pipeline
//!
//! Shared by the in-memory metadata listing and the default observation
//! query path. Each predicate is applied only when its keyed option is
//! present; the limit applies after sorting.

use std::cmp::Ordering;

/// In-memory row pipeline
pub struct RowPipeline<T> {
    rows: Vec<T>,
}

impl<T> RowPipeline<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows }
    }

    /// Retain rows satisfying `pred`, but only when `key` is present
    pub fn filter_when<K>(mut self, key: Option<&K>, pred: impl Fn(&T, &K) -> bool) -> Self
    where
        K: ?Sized,
    {
        if let Some(key) = key {
            self.rows.retain(|row| pred(row, key));
        }
        self
    }

    /// Sort rows by the given total order
    pub fn sort_by(mut self, cmp: impl FnMut(&T, &T) -> Ordering) -> Self {
        self.rows.sort_by(cmp);
        self
    }

    /// Truncate to at most `limit` rows, when a limit is given
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.rows.truncate(limit);
        }
        self
    }

    pub fn into_vec(self) -> Vec<T> {
        self.rows
    }
}
