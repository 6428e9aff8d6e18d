//! Observations client
//!
//! Validates content against a type's schema, persists rows through the
//! backend's storage adapter, and filters stale rows against the store's
//! canonical versions on the way out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::backend::{Backend, ObservationsAdapter};
use crate::codec::Schema;
use crate::errors::{invalid_config, observation_not_found, ErrorKind, Result};
use crate::model::{
    new_observation_id, NewObservation, Observation, ObservationMeta, ObservationQuery,
    ObservationRecord, ObservationTypeDef, SnapshotPointer, VersionResolver,
};

/// Client over a backend's observation storage
///
/// The backend must expose an observations adapter; construction fails
/// eagerly when it does not.
pub struct ObservationsClient {
    backend: Arc<dyn Backend>,
}

impl ObservationsClient {
    pub fn new(backend: Arc<dyn Backend>) -> Result<Self> {
        if backend.observations().is_none() {
            return Err(invalid_config(
                "backend exposes no observations adapter",
            ));
        }
        Ok(Self { backend })
    }

    fn adapter(&self) -> &dyn ObservationsAdapter {
        self.backend
            .observations()
            .expect("adapter checked at construction")
    }

    /// Record a typed observation
    ///
    /// Content is validated against the type's schema before the row is
    /// written; the returned observation carries the validated content.
    pub fn put<S: Schema>(
        &self,
        def: &ObservationTypeDef<S>,
        input: NewObservation<S::Output>,
    ) -> Result<Observation<S::Output>>
    where
        S::Output: Serialize,
    {
        let raw = serde_json::to_value(&input.content)
            .map_err(|e| crate::errors::encode_error(e.to_string()))?;
        let validated = def.schema.parse(raw.clone())?;

        let id = new_observation_id();
        let created_at = Utc::now();
        let record = ObservationRecord {
            id: id.clone(),
            kind: def.name.clone(),
            source: input.source.clone(),
            content: raw,
            confidence: input.confidence,
            observed_at: input.observed_at,
            created_at,
            derived_from: input.derived_from.clone(),
        };
        self.adapter().add_one(&record)?;

        tracing::debug!(
            observation_id = %id,
            kind = %def.name,
            source_store = %input.source.store_id,
            source_version = %input.source.version,
            "Recorded observation"
        );

        Ok(Observation {
            id,
            kind: def.name.clone(),
            source: input.source,
            content: validated,
            confidence: input.confidence,
            observed_at: input.observed_at,
            created_at,
            derived_from: input.derived_from,
        })
    }

    /// Fetch one observation with its raw content
    pub fn get(&self, id: &str) -> Result<Observation<serde_json::Value>> {
        self.adapter()
            .get_one(id)?
            .map(Observation::from)
            .ok_or_else(|| observation_not_found(id))
    }

    /// Query observations, raw content included
    pub fn query(&self, opts: &ObservationQuery) -> Result<Vec<Observation<serde_json::Value>>> {
        let rows = self.query_rows(opts)?;
        Ok(rows.into_iter().map(Observation::from).collect())
    }

    /// Query observations without their content payloads
    pub fn query_meta(&self, opts: &ObservationQuery) -> Result<Vec<ObservationMeta>> {
        let rows = self.query_rows(opts)?;
        Ok(rows.into_iter().map(ObservationMeta::from).collect())
    }

    fn query_rows(&self, opts: &ObservationQuery) -> Result<Vec<ObservationRecord>> {
        let rows = self.adapter().query(opts)?;
        if opts.include_stale {
            return Ok(rows);
        }
        self.retain_canonical(rows, &opts.resolver)
    }

    /// Remove one observation
    pub fn delete(&self, id: &str) -> Result<()> {
        if !self.adapter().remove_one(id)? {
            return Err(observation_not_found(id));
        }
        Ok(())
    }

    /// Remove every observation whose source matches the pointer
    ///
    /// With no path on the pointer, all rows for `(store_id, version)` are
    /// removed regardless of their path; with a path, only exact matches.
    /// Returns the count removed.
    pub fn delete_by_source(&self, pointer: &SnapshotPointer) -> Result<usize> {
        self.adapter().delete_by_source(
            &pointer.store_id,
            &pointer.version,
            pointer.path.as_deref(),
        )
    }

    /// Whether a pointer's version is no longer canonical for its store
    ///
    /// Default policy: a pointer is stale iff it is not the latest version
    /// of its store. A store with no snapshots has no canonical version,
    /// so nothing pointing at it is stale.
    pub fn is_stale(&self, pointer: &SnapshotPointer) -> Result<bool> {
        match self.backend.metadata().get_latest(&pointer.store_id) {
            Ok(latest) => Ok(latest.version != pointer.version),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Keep rows whose source version is canonical under the resolver
    ///
    /// Latest-version lookups are memoized per store for the duration of
    /// one query.
    fn retain_canonical(
        &self,
        rows: Vec<ObservationRecord>,
        resolver: &VersionResolver,
    ) -> Result<Vec<ObservationRecord>> {
        let mut latest_by_store: HashMap<String, Option<String>> = HashMap::new();
        let mut kept = Vec::with_capacity(rows.len());

        for row in rows {
            let keep = match resolver {
                VersionResolver::Pinned(versions) => versions.contains(&row.source.version),
                VersionResolver::Resolve(resolve) => match resolve(&row.source.store_id) {
                    Some(version) => row.source.version == version,
                    None => self.matches_latest(&row, &mut latest_by_store)?,
                },
                VersionResolver::Latest => self.matches_latest(&row, &mut latest_by_store)?,
            };
            if keep {
                kept.push(row);
            }
        }

        Ok(kept)
    }

    fn matches_latest(
        &self,
        row: &ObservationRecord,
        cache: &mut HashMap<String, Option<String>>,
    ) -> Result<bool> {
        let store_id = &row.source.store_id;
        if !cache.contains_key(store_id) {
            let latest = match self.backend.metadata().get_latest(store_id) {
                Ok(meta) => Some(meta.version),
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => return Err(e),
            };
            cache.insert(store_id.clone(), latest);
        }
        Ok(match cache.get(store_id).and_then(|v| v.as_ref()) {
            Some(latest) => row.source.version == *latest,
            // No canonical version: nothing to be stale against.
            None => true,
        })
    }
}
