//! In-memory capture store using `DashMap`.
//!
//! Each collection is keyed by its natural key, so uniqueness is enforced
//! atomically by the map's entry API. Contents can be snapshotted to JSON
//! and reloaded; otherwise data is lost on process restart.

use std::path::Path;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use super::collections::{EXPERIMENTS, MEASUREMENTS, PROCESSING_RESULTS};
use super::CaptureStore;
use crate::experiment::{
    Experiment, ExperimentId, ExperimentKey, Measurement, MeasurementKey, ProcessingResult,
};
use crate::{Error, Result, StoreError, StoreResult};

type FxDashMap<K, V> = DashMap<K, V, FxBuildHasher>;

/// In-memory capture store.
///
/// Thread-safe; share it between services with `Arc<MemoryStore>`.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use lidar_db::experiment::Experiment;
/// use lidar_db::store::{CaptureStore, MemoryStore};
///
/// # async fn example() -> lidar_db::StoreResult<()> {
/// let store = MemoryStore::new();
/// let now = Utc::now();
///
/// store.insert_experiment(Experiment::new(now, "site-A", "")).await?;
/// let again = store.insert_experiment(Experiment::new(now, "site-A", "")).await;
/// assert!(again.unwrap_err().is_duplicate_key());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    experiments: FxDashMap<ExperimentKey, Experiment>,
    measurements: FxDashMap<MeasurementKey, Measurement>,
    results: FxDashMap<ExperimentId, ProcessingResult>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            experiments: DashMap::with_hasher(FxBuildHasher),
            measurements: DashMap::with_hasher(FxBuildHasher),
            results: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Number of stored experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of stored measurements.
    #[must_use]
    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    /// Number of stored processing results.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Whether all three collections are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.measurements.is_empty() && self.results.is_empty()
    }

    /// Remove every record.
    pub fn clear(&self) {
        self.experiments.clear();
        self.measurements.clear();
        self.results.clear();
    }

    /// Copy the store contents into a serializable snapshot.
    ///
    /// Records are ordered by natural key so snapshots of equal stores
    /// serialize identically.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut experiments: Vec<Experiment> =
            self.experiments.iter().map(|e| e.value().clone()).collect();
        experiments.sort_by(|a, b| {
            (a.start_time(), a.title()).cmp(&(b.start_time(), b.title()))
        });

        let mut measurements: Vec<Measurement> =
            self.measurements.iter().map(|m| m.value().clone()).collect();
        measurements.sort_by_key(|m| {
            (
                m.experiment_id(),
                m.capture().start_time(),
                m.capture().stop_time(),
            )
        });

        let mut results: Vec<ProcessingResult> =
            self.results.iter().map(|r| r.value().clone()).collect();
        results.sort_by_key(ProcessingResult::experiment_id);

        StoreSnapshot {
            experiments,
            measurements,
            results,
        }
    }

    /// Rebuild a store from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the snapshot holds two records with
    /// the same natural key.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let store = Self::new();
        let reject = |e: StoreError| Error::InvalidInput(format!("corrupt snapshot: {e}"));

        for experiment in snapshot.experiments {
            store.put_experiment(experiment).map_err(reject)?;
        }
        for measurement in snapshot.measurements {
            store.put_measurement(measurement).map_err(reject)?;
        }
        for result in snapshot.results {
            store.put_processing_result(result).map_err(reject)?;
        }
        Ok(store)
    }

    /// Write a JSON snapshot to `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.snapshot().to_json()?)?;
        Ok(())
    }

    /// Load a store from a JSON snapshot at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not a valid snapshot,
    /// or violates a natural key.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_snapshot(StoreSnapshot::from_json(&json)?)
    }

    fn put_experiment(&self, experiment: Experiment) -> StoreResult<Experiment> {
        let key = experiment.natural_key();
        match self.experiments.entry(key) {
            Entry::Occupied(slot) => Err(StoreError::DuplicateKey {
                collection: EXPERIMENTS,
                key: slot.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(experiment.clone());
                Ok(experiment)
            }
        }
    }

    fn put_measurement(&self, measurement: Measurement) -> StoreResult<Measurement> {
        let key = measurement.natural_key();
        match self.measurements.entry(key) {
            Entry::Occupied(slot) => Err(StoreError::DuplicateKey {
                collection: MEASUREMENTS,
                key: slot.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(measurement.clone());
                Ok(measurement)
            }
        }
    }

    fn put_processing_result(&self, result: ProcessingResult) -> StoreResult<ProcessingResult> {
        match self.results.entry(result.experiment_id()) {
            Entry::Occupied(slot) => Err(StoreError::DuplicateKey {
                collection: PROCESSING_RESULTS,
                key: format!("experiment={}", slot.key()),
            }),
            Entry::Vacant(slot) => {
                slot.insert(result.clone());
                Ok(result)
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStore for MemoryStore {
    async fn find_experiment(
        &self,
        start_time: DateTime<Utc>,
        title: &str,
    ) -> StoreResult<Option<Experiment>> {
        let key = ExperimentKey::new(start_time, title);
        Ok(self.experiments.get(&key).map(|e| e.value().clone()))
    }

    async fn find_experiments_by_start(
        &self,
        start_time: DateTime<Utc>,
    ) -> StoreResult<Vec<Experiment>> {
        Ok(self
            .experiments
            .iter()
            .filter(|e| e.key().start_time == start_time)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_experiment(&self, experiment: Experiment) -> StoreResult<Experiment> {
        self.put_experiment(experiment)
    }

    async fn find_measurement(
        &self,
        experiment_id: ExperimentId,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
    ) -> StoreResult<Option<Measurement>> {
        let key = MeasurementKey::new(experiment_id, start_time, stop_time);
        Ok(self.measurements.get(&key).map(|m| m.value().clone()))
    }

    async fn insert_measurement(&self, measurement: Measurement) -> StoreResult<Measurement> {
        self.put_measurement(measurement)
    }

    // Linear scan over every stored measurement; called once per aggregation.
    async fn find_all_measurements(
        &self,
        experiment_id: ExperimentId,
    ) -> StoreResult<Vec<Measurement>> {
        Ok(self
            .measurements
            .iter()
            .filter(|m| m.key().experiment_id == experiment_id)
            .map(|m| m.value().clone())
            .collect())
    }

    async fn find_processing_result(
        &self,
        experiment_id: ExperimentId,
    ) -> StoreResult<Option<ProcessingResult>> {
        Ok(self.results.get(&experiment_id).map(|r| r.value().clone()))
    }

    async fn insert_processing_result(
        &self,
        result: ProcessingResult,
    ) -> StoreResult<ProcessingResult> {
        self.put_processing_result(result)
    }
}

/// Serializable copy of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Experiments
    pub experiments: Vec<Experiment>,
    /// Measurements
    pub measurements: Vec<Measurement>,
    /// Processing results
    pub results: Vec<ProcessingResult>,
}

impl StoreSnapshot {
    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if `json` is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
