//! Processing Result Record - the aggregated outcome of an experiment

use serde::{Deserialize, Serialize};

use super::{AveragingMode, ExperimentId, MeasurementId, ResultId};
use crate::capture::Capture;

/// Processing result holds the single aggregated capture of one experiment.
///
/// At most one exists per experiment. Once stored it is never recomputed,
/// so measurements registered afterwards do not change it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingResult {
    id: ResultId,
    experiment_id: ExperimentId,
    measurement_ids: Vec<MeasurementId>,
    mode: AveragingMode,
    aggregated: Capture,
}

impl ProcessingResult {
    /// Create a new processing result with a freshly assigned identifier.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - ID of the owning experiment
    /// * `measurement_ids` - Measurements that contributed to `aggregated`
    /// * `mode` - How samples were combined
    /// * `aggregated` - The combined capture
    #[must_use]
    pub fn new(
        experiment_id: ExperimentId,
        measurement_ids: Vec<MeasurementId>,
        mode: AveragingMode,
        aggregated: Capture,
    ) -> Self {
        Self {
            id: ResultId::new(),
            experiment_id,
            measurement_ids,
            mode,
            aggregated,
        }
    }

    /// Get the result ID.
    #[must_use]
    pub const fn id(&self) -> ResultId {
        self.id
    }

    /// Get the owning experiment ID.
    #[must_use]
    pub const fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    /// Get the contributing measurement IDs.
    #[must_use]
    pub fn measurement_ids(&self) -> &[MeasurementId] {
        &self.measurement_ids
    }

    /// Get the averaging mode used.
    #[must_use]
    pub const fn mode(&self) -> AveragingMode {
        self.mode
    }

    /// Get the aggregated capture.
    #[must_use]
    pub const fn aggregated(&self) -> &Capture {
        &self.aggregated
    }
}
