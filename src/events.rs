//! Service events
//!
//! The aggregation service reports what it does through an injected
//! [`EventSink`] instead of a process-wide logger:
//! - [`TracingSink`] forwards events to `tracing` (production default)
//! - [`MemorySink`] records events so tests can assert on them

use std::sync::{Arc, Mutex, PoisonError};

use crate::experiment::{ExperimentId, MeasurementId, ResultId};

/// Something the aggregation service did or observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// An experiment with the requested natural key already existed
    ExperimentFound {
        /// Existing experiment
        id: ExperimentId,
    },
    /// A new experiment was stored
    ExperimentCreated {
        /// New experiment
        id: ExperimentId,
        /// Its title
        title: String,
    },
    /// A measurement with the requested capture window already existed
    MeasurementFound {
        /// Owning experiment
        experiment_id: ExperimentId,
        /// Existing measurement
        id: MeasurementId,
    },
    /// A new measurement was stored
    MeasurementCreated {
        /// Owning experiment
        experiment_id: ExperimentId,
        /// New measurement
        id: MeasurementId,
    },
    /// The experiment already had a processing result
    ProcessingResultFound {
        /// Owning experiment
        experiment_id: ExperimentId,
        /// Existing result
        id: ResultId,
    },
    /// A processing result was computed and stored
    ProcessingResultCreated {
        /// Owning experiment
        experiment_id: ExperimentId,
        /// New result
        id: ResultId,
        /// Number of contributing measurements
        measurements: usize,
    },
    /// An insert lost a natural-key race; the winner is re-queried
    InsertConflict {
        /// Record kind
        record: &'static str,
        /// Rendered natural key
        key: String,
    },
    /// A store call failed
    StoreFailure {
        /// Service operation
        operation: &'static str,
        /// Failure description
        error: String,
    },
    /// Measurements could not be aggregated
    AggregationRejected {
        /// Owning experiment
        experiment_id: ExperimentId,
        /// Reason
        reason: String,
    },
}

/// Receiver of service events.
pub trait EventSink: Send + Sync {
    /// Handle one event.
    fn emit(&self, event: ServiceEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: ServiceEvent) {
        (**self).emit(event);
    }
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ServiceEvent) {
        match event {
            ServiceEvent::ExperimentFound { id } => {
                tracing::debug!(experiment_id = %id, "experiment found");
            }
            ServiceEvent::ExperimentCreated { id, title } => {
                tracing::info!(experiment_id = %id, %title, "experiment created");
            }
            ServiceEvent::MeasurementFound { experiment_id, id } => {
                tracing::debug!(%experiment_id, measurement_id = %id, "measurement found");
            }
            ServiceEvent::MeasurementCreated { experiment_id, id } => {
                tracing::info!(%experiment_id, measurement_id = %id, "measurement created");
            }
            ServiceEvent::ProcessingResultFound { experiment_id, id } => {
                tracing::debug!(%experiment_id, result_id = %id, "processing result found");
            }
            ServiceEvent::ProcessingResultCreated {
                experiment_id,
                id,
                measurements,
            } => {
                tracing::info!(
                    %experiment_id,
                    result_id = %id,
                    measurements,
                    "processing result created"
                );
            }
            ServiceEvent::InsertConflict { record, key } => {
                tracing::warn!(record, %key, "insert lost natural-key race, re-querying");
            }
            ServiceEvent::StoreFailure { operation, error } => {
                tracing::error!(operation, %error, "store call failed");
            }
            ServiceEvent::AggregationRejected {
                experiment_id,
                reason,
            } => {
                tracing::error!(%experiment_id, %reason, "aggregation rejected");
            }
        }
    }
}

/// Records every event in memory.
///
/// ```rust
/// use lidar_db::events::{EventSink, MemorySink, ServiceEvent};
///
/// let sink = MemorySink::new();
/// sink.emit(ServiceEvent::StoreFailure { operation: "test", error: "boom".into() });
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ServiceEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<ServiceEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ServiceEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
