//! Observation persistence for the filesystem backend
//!
//! A single `_observations.json` file; queries use the adapter's
//! scan-and-filter defaults.

use corpus_core::backend::ObservationsAdapter;
use corpus_core::errors::Result;
use corpus_core::model::ObservationRecord;

use super::FsBackend;

impl ObservationsAdapter for FsBackend {
    fn get_all(&self) -> Result<Vec<ObservationRecord>> {
        self.load_observations()
    }

    fn set_all(&self, rows: Vec<ObservationRecord>) -> Result<()> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        self.save_observations(&rows)
    }

    fn get_one(&self, id: &str) -> Result<Option<ObservationRecord>> {
        Ok(self
            .load_observations()?
            .into_iter()
            .find(|row| row.id == id))
    }

    fn add_one(&self, row: &ObservationRecord) -> Result<()> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let mut rows = self.load_observations()?;
        rows.push(row.clone());
        self.save_observations(&rows)
    }

    fn remove_one(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let mut rows = self.load_observations()?;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        let removed = rows.len() < before;
        if removed {
            self.save_observations(&rows)?;
        }
        Ok(removed)
    }
}
