//! Aggregation service
//!
//! Idempotent registration of experiments and measurements, and
//! computation of the single aggregated [`ProcessingResult`] per experiment.
//!
//! Every operation is find-or-create against a [`CaptureStore`]:
//! 1. look the record up by its natural key; return it if present
//! 2. otherwise build a new record and insert it
//! 3. if the insert loses a natural-key race, re-query once and return the
//!    winner's record
//!
//! Each store call is bounded by [`ServiceConfig::store_timeout`]. No locks
//! are held between lookup and insert; the store's uniqueness constraint is
//! the only backstop.
//!
//! Known limitations:
//! - re-submitting an experiment with different comments returns the
//!   stored experiment unchanged
//! - `register_measurement` does not check that the experiment exists
//! - a stored processing result is never recomputed, so measurements added
//!   later do not reach it

use std::fmt::Display;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::capture::{Capture, CapturePack};
use crate::config::ServiceConfig;
use crate::events::{EventSink, ServiceEvent, TracingSink};
use crate::experiment::{
    canonical_order, reduce_in_order, Experiment, ExperimentId, ExperimentKey, Measurement,
    MeasurementId, MeasurementKey, ProcessingResult,
};
use crate::store::CaptureStore;
use crate::{Error, Result, StoreError, StoreResult};

/// Outcome of a full capture-pack ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Experiment the pack was registered under
    pub experiment: Experiment,
    /// Measurement ids in pack order
    pub measurement_ids: Vec<MeasurementId>,
    /// Captures stored by this run
    pub created: usize,
    /// Captures that were already stored
    pub existing: usize,
}

/// Orchestrates ingestion and aggregation over a [`CaptureStore`].
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use lidar_db::capture::{Capture, ChannelProfile};
/// use lidar_db::service::AggregationService;
/// use lidar_db::store::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() -> lidar_db::Result<()> {
/// let service = AggregationService::new(MemoryStore::new());
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
///
/// let experiment = service.register_experiment(start, "site-A", "").await?;
/// for (minute, samples) in [(0, vec![1.0, 2.0, 3.0]), (1, vec![4.0, 5.0, 6.0])] {
///     let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
///     let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 59).unwrap();
///     let capture = Capture::builder(from, to)
///         .profile(ChannelProfile::new("BT0", 600, samples))
///         .build();
///     service.register_measurement(experiment.id(), capture).await?;
/// }
///
/// let result = service.create_processing_result(experiment.id()).await?;
/// assert_eq!(result.aggregated().profiles()[0].samples(), &[5.0, 7.0, 9.0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AggregationService<S, E = TracingSink> {
    store: S,
    events: E,
    config: ServiceConfig,
}

impl<S: CaptureStore> AggregationService<S> {
    /// Create a service with default configuration that logs through `tracing`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, TracingSink, ServiceConfig::default())
    }
}

impl<S: CaptureStore, E: EventSink> AggregationService<S, E> {
    /// Create a service with default configuration and a custom event sink.
    #[must_use]
    pub fn with_events(store: S, events: E) -> Self {
        Self::with_config(store, events, ServiceConfig::default())
    }

    /// Create a fully configured service.
    #[must_use]
    pub const fn with_config(store: S, events: E, config: ServiceConfig) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The event sink.
    #[must_use]
    pub const fn events(&self) -> &E {
        &self.events
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Find the experiment with this (start time, title) or create it.
    ///
    /// `comments` are only stored when the experiment is created.
    ///
    /// # Errors
    ///
    /// - [`Error::Lookup`] if the store cannot be queried
    /// - [`Error::Persist`] if the insert fails
    /// - [`Error::Duplicate`] if a concurrent insert won and its record
    ///   cannot be re-read
    pub async fn register_experiment(
        &self,
        start_time: DateTime<Utc>,
        title: &str,
        comments: &str,
    ) -> Result<Experiment> {
        const OP: &str = "register_experiment";
        let key = ExperimentKey::new(start_time, title);

        let existing = self
            .lookup(OP, &key, self.store.find_experiment(start_time, title))
            .await?;
        if let Some(found) = existing {
            self.events
                .emit(ServiceEvent::ExperimentFound { id: found.id() });
            return Ok(found);
        }

        let experiment = Experiment::new(start_time, title, comments);
        match self.bounded(self.store.insert_experiment(experiment)).await {
            Ok(created) => {
                self.events.emit(ServiceEvent::ExperimentCreated {
                    id: created.id(),
                    title: created.title().to_string(),
                });
                Ok(created)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                self.conflict("experiment", &key);
                let winner = self
                    .lookup(OP, &key, self.store.find_experiment(start_time, title))
                    .await?;
                let found = winner.ok_or_else(|| Error::Duplicate {
                    record: "experiment",
                    key: key.to_string(),
                })?;
                self.events
                    .emit(ServiceEvent::ExperimentFound { id: found.id() });
                Ok(found)
            }
            Err(source) => Err(self.persist_failure(OP, &key, source)),
        }
    }

    /// Find the measurement of `experiment_id` with this capture window or
    /// store `capture` as a new one.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register_experiment`].
    pub async fn register_measurement(
        &self,
        experiment_id: ExperimentId,
        capture: Capture,
    ) -> Result<Measurement> {
        self.resolve_measurement(experiment_id, capture)
            .await
            .map(|(measurement, _)| measurement)
    }

    /// Return the experiment's processing result, computing and storing it
    /// on first request.
    ///
    /// # Errors
    ///
    /// - [`Error::Lookup`] if the result or the measurements cannot be read
    /// - [`Error::Aggregation`] if the experiment has no measurements or
    ///   their shapes differ
    /// - [`Error::Persist`] / [`Error::Duplicate`] as for registration
    pub async fn create_processing_result(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<ProcessingResult> {
        const OP: &str = "create_processing_result";
        let key = format!("experiment={experiment_id}");

        let existing = self
            .lookup(OP, &key, self.store.find_processing_result(experiment_id))
            .await?;
        if let Some(found) = existing {
            self.events.emit(ServiceEvent::ProcessingResultFound {
                experiment_id,
                id: found.id(),
            });
            return Ok(found);
        }

        let measurements = self
            .lookup(OP, &key, self.store.find_all_measurements(experiment_id))
            .await?;
        if measurements.is_empty() {
            return Err(self.rejected(
                experiment_id,
                Error::Aggregation(format!("experiment {experiment_id} has no measurements")),
            ));
        }
        let ordered = canonical_order(&measurements);
        let aggregated = reduce_in_order(&ordered, self.config.averaging)
            .map_err(|e| self.rejected(experiment_id, e))?;
        let measurement_ids = ordered.iter().map(|m| m.id()).collect();
        let result =
            ProcessingResult::new(experiment_id, measurement_ids, self.config.averaging, aggregated);

        match self.bounded(self.store.insert_processing_result(result)).await {
            Ok(created) => {
                self.events.emit(ServiceEvent::ProcessingResultCreated {
                    experiment_id,
                    id: created.id(),
                    measurements: created.measurement_ids().len(),
                });
                Ok(created)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                self.conflict("processing result", &key);
                let winner = self
                    .lookup(OP, &key, self.store.find_processing_result(experiment_id))
                    .await?;
                let found = winner.ok_or_else(|| Error::Duplicate {
                    record: "processing result",
                    key: key.clone(),
                })?;
                self.events.emit(ServiceEvent::ProcessingResultFound {
                    experiment_id,
                    id: found.id(),
                });
                Ok(found)
            }
            Err(source) => Err(self.persist_failure(OP, &key, source)),
        }
    }

    /// Register a whole capture pack: the experiment starts at the pack's
    /// earliest capture, and every capture becomes a measurement.
    ///
    /// Safe to re-run after a partial failure; already stored captures are
    /// counted as `existing`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty pack, otherwise the
    /// first registration error encountered.
    pub async fn ingest_pack(
        &self,
        title: &str,
        comments: &str,
        pack: &CapturePack,
    ) -> Result<IngestReport> {
        let Some(start_time) = pack.start_time() else {
            return Err(Error::InvalidInput(format!(
                "capture pack for {title:?} is empty"
            )));
        };

        let experiment = self.register_experiment(start_time, title, comments).await?;
        let mut report = IngestReport {
            measurement_ids: Vec::with_capacity(pack.len()),
            created: 0,
            existing: 0,
            experiment,
        };

        for capture in pack.captures() {
            let (measurement, created) = self
                .resolve_measurement(report.experiment.id(), capture.clone())
                .await?;
            report.measurement_ids.push(measurement.id());
            if created {
                report.created += 1;
            } else {
                report.existing += 1;
            }
        }

        Ok(report)
    }

    /// All experiments that started at `start_time`, ordered by title.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lookup`] if the store cannot be queried.
    pub async fn experiments_started_at(
        &self,
        start_time: DateTime<Utc>,
    ) -> Result<Vec<Experiment>> {
        let key = format!("start={}", start_time.to_rfc3339());
        let mut experiments = self
            .lookup(
                "experiments_started_at",
                &key,
                self.store.find_experiments_by_start(start_time),
            )
            .await?;
        experiments.sort_by(|a, b| a.title().cmp(b.title()));
        Ok(experiments)
    }

    /// Find-or-create a measurement; the flag is `true` when it was created.
    async fn resolve_measurement(
        &self,
        experiment_id: ExperimentId,
        capture: Capture,
    ) -> Result<(Measurement, bool)> {
        const OP: &str = "register_measurement";
        let (start_time, stop_time) = (capture.start_time(), capture.stop_time());
        let key = MeasurementKey::new(experiment_id, start_time, stop_time);

        let existing = self
            .lookup(
                OP,
                &key,
                self.store
                    .find_measurement(experiment_id, start_time, stop_time),
            )
            .await?;
        if let Some(found) = existing {
            self.events.emit(ServiceEvent::MeasurementFound {
                experiment_id,
                id: found.id(),
            });
            return Ok((found, false));
        }

        let measurement = Measurement::new(experiment_id, capture);
        match self.bounded(self.store.insert_measurement(measurement)).await {
            Ok(created) => {
                self.events.emit(ServiceEvent::MeasurementCreated {
                    experiment_id,
                    id: created.id(),
                });
                Ok((created, true))
            }
            Err(StoreError::DuplicateKey { .. }) => {
                self.conflict("measurement", &key);
                let winner = self
                    .lookup(
                        OP,
                        &key,
                        self.store
                            .find_measurement(experiment_id, start_time, stop_time),
                    )
                    .await?;
                let found = winner.ok_or_else(|| Error::Duplicate {
                    record: "measurement",
                    key: key.to_string(),
                })?;
                self.events.emit(ServiceEvent::MeasurementFound {
                    experiment_id,
                    id: found.id(),
                });
                Ok((found, false))
            }
            Err(source) => Err(self.persist_failure(OP, &key, source)),
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        let limit = self.config.store_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StoreError::Timeout(limit)),
        }
    }

    async fn lookup<T>(
        &self,
        operation: &'static str,
        key: &(impl Display + Sync),
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T> {
        self.bounded(call).await.map_err(|source| {
            self.events.emit(ServiceEvent::StoreFailure {
                operation,
                error: source.to_string(),
            });
            Error::Lookup {
                operation,
                key: key.to_string(),
                source,
            }
        })
    }

    fn persist_failure(
        &self,
        operation: &'static str,
        key: &impl Display,
        source: StoreError,
    ) -> Error {
        self.events.emit(ServiceEvent::StoreFailure {
            operation,
            error: source.to_string(),
        });
        Error::Persist {
            operation,
            key: key.to_string(),
            source,
        }
    }

    fn conflict(&self, record: &'static str, key: &impl Display) {
        self.events.emit(ServiceEvent::InsertConflict {
            record,
            key: key.to_string(),
        });
    }

    fn rejected(&self, experiment_id: ExperimentId, error: Error) -> Error {
        self.events.emit(ServiceEvent::AggregationRejected {
            experiment_id,
            reason: error.to_string(),
        });
        error
    }
}
