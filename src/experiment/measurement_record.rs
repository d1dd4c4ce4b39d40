//! Measurement Record - one raw capture of an experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ExperimentId, MeasurementId};
use crate::capture::Capture;

/// Measurement represents one raw capture belonging to an experiment.
///
/// Within one experiment, the capture window (start, stop) is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    id: MeasurementId,
    experiment_id: ExperimentId,
    capture: Capture,
}

impl Measurement {
    /// Create a new measurement with a freshly assigned identifier.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - ID of the owning experiment
    /// * `capture` - Decoded capture payload
    #[must_use]
    pub fn new(experiment_id: ExperimentId, capture: Capture) -> Self {
        Self::with_id(MeasurementId::new(), experiment_id, capture)
    }

    /// Create a measurement with an explicit identifier.
    #[must_use]
    pub const fn with_id(id: MeasurementId, experiment_id: ExperimentId, capture: Capture) -> Self {
        Self {
            id,
            experiment_id,
            capture,
        }
    }

    /// Get the measurement ID.
    #[must_use]
    pub const fn id(&self) -> MeasurementId {
        self.id
    }

    /// Get the owning experiment ID.
    #[must_use]
    pub const fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    /// Get the decoded capture.
    #[must_use]
    pub const fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Natural key of this measurement.
    #[must_use]
    pub fn natural_key(&self) -> MeasurementKey {
        MeasurementKey::new(
            self.experiment_id,
            self.capture.start_time(),
            self.capture.stop_time(),
        )
    }
}

/// Natural key of a measurement: (experiment, capture start, capture stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasurementKey {
    /// Owning experiment
    pub experiment_id: ExperimentId,
    /// Capture start
    pub start_time: DateTime<Utc>,
    /// Capture stop
    pub stop_time: DateTime<Utc>,
}

impl MeasurementKey {
    /// Create a key.
    #[must_use]
    pub const fn new(
        experiment_id: ExperimentId,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
    ) -> Self {
        Self {
            experiment_id,
            start_time,
            stop_time,
        }
    }
}

impl std::fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "experiment={} window={}..{}",
            self.experiment_id,
            self.start_time.to_rfc3339(),
            self.stop_time.to_rfc3339()
        )
    }
}
