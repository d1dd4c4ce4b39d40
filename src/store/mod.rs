//! Persistence port for capture sessions
//!
//! [`CaptureStore`] is the contract the aggregation service depends on:
//! keyed lookups and inserts over three collections (experiments,
//! measurements, processing results).
//!
//! - Lookups return `Ok(None)` when nothing matches. `Err` is reserved for
//!   genuine store failures.
//! - Inserts must enforce uniqueness of each record's natural key and report
//!   a violation as [`StoreError::DuplicateKey`]. That constraint is what
//!   makes concurrent find-or-create safe.
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use lidar_db::experiment::Experiment;
//! use lidar_db::store::{CaptureStore, MemoryStore};
//!
//! # async fn example() -> lidar_db::StoreResult<()> {
//! let store = MemoryStore::new();
//! let now = Utc::now();
//!
//! store.insert_experiment(Experiment::new(now, "site-A", "")).await?;
//! assert!(store.find_experiment(now, "site-A").await?.is_some());
//! assert!(store.find_experiment(now, "site-B").await?.is_none());
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::{MemoryStore, StoreSnapshot};

use crate::experiment::{Experiment, ExperimentId, Measurement, ProcessingResult};
use crate::StoreResult;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;

/// Collection names, used when reporting key conflicts.
pub mod collections {
    /// Experiments, unique on (start time, title)
    pub const EXPERIMENTS: &str = "experiments";
    /// Measurements, unique on (experiment, capture start, capture stop)
    pub const MEASUREMENTS: &str = "measurements";
    /// Processing results, unique on experiment
    pub const PROCESSING_RESULTS: &str = "processing_results";
}

/// Storage contract for experiments, measurements and processing results.
pub trait CaptureStore: Send + Sync {
    /// Find an experiment by its natural key.
    fn find_experiment(
        &self,
        start_time: DateTime<Utc>,
        title: &str,
    ) -> impl Future<Output = StoreResult<Option<Experiment>>> + Send;

    /// Find every experiment that started at `start_time`, whatever its title.
    fn find_experiments_by_start(
        &self,
        start_time: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Vec<Experiment>>> + Send;

    /// Insert a new experiment.
    ///
    /// Fails with [`StoreError::DuplicateKey`](crate::StoreError::DuplicateKey)
    /// if the natural key is taken.
    fn insert_experiment(
        &self,
        experiment: Experiment,
    ) -> impl Future<Output = StoreResult<Experiment>> + Send;

    /// Find a measurement of an experiment by its capture window.
    fn find_measurement(
        &self,
        experiment_id: ExperimentId,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<Measurement>>> + Send;

    /// Insert a new measurement.
    fn insert_measurement(
        &self,
        measurement: Measurement,
    ) -> impl Future<Output = StoreResult<Measurement>> + Send;

    /// All measurements of an experiment, in no particular order.
    fn find_all_measurements(
        &self,
        experiment_id: ExperimentId,
    ) -> impl Future<Output = StoreResult<Vec<Measurement>>> + Send;

    /// Find the processing result of an experiment.
    fn find_processing_result(
        &self,
        experiment_id: ExperimentId,
    ) -> impl Future<Output = StoreResult<Option<ProcessingResult>>> + Send;

    /// Insert a processing result; at most one per experiment.
    fn insert_processing_result(
        &self,
        result: ProcessingResult,
    ) -> impl Future<Output = StoreResult<ProcessingResult>> + Send;
}

impl<S: CaptureStore> CaptureStore for Arc<S> {
    fn find_experiment(
        &self,
        start_time: DateTime<Utc>,
        title: &str,
    ) -> impl Future<Output = StoreResult<Option<Experiment>>> + Send {
        (**self).find_experiment(start_time, title)
    }

    fn find_experiments_by_start(
        &self,
        start_time: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Vec<Experiment>>> + Send {
        (**self).find_experiments_by_start(start_time)
    }

    fn insert_experiment(
        &self,
        experiment: Experiment,
    ) -> impl Future<Output = StoreResult<Experiment>> + Send {
        (**self).insert_experiment(experiment)
    }

    fn find_measurement(
        &self,
        experiment_id: ExperimentId,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<Measurement>>> + Send {
        (**self).find_measurement(experiment_id, start_time, stop_time)
    }

    fn insert_measurement(
        &self,
        measurement: Measurement,
    ) -> impl Future<Output = StoreResult<Measurement>> + Send {
        (**self).insert_measurement(measurement)
    }

    fn find_all_measurements(
        &self,
        experiment_id: ExperimentId,
    ) -> impl Future<Output = StoreResult<Vec<Measurement>>> + Send {
        (**self).find_all_measurements(experiment_id)
    }

    fn find_processing_result(
        &self,
        experiment_id: ExperimentId,
    ) -> impl Future<Output = StoreResult<Option<ProcessingResult>>> + Send {
        (**self).find_processing_result(experiment_id)
    }

    fn insert_processing_result(
        &self,
        result: ProcessingResult,
    ) -> impl Future<Output = StoreResult<ProcessingResult>> + Send {
        (**self).insert_processing_result(result)
    }
}
