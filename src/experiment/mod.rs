//! Experiment Schema
//!
//! Records for capture sessions and the algorithm that aggregates them.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Measurement (N) [raw captures]
//!        │
//!        └──── ProcessingResult (0..1) [aggregated capture]
//! ```
//!
//! Children reference their experiment by [`ExperimentId`]; nothing is
//! embedded, so each record kind lives in its own collection.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use lidar_db::capture::Capture;
//! use lidar_db::experiment::{Experiment, Measurement};
//!
//! let now = Utc::now();
//! let experiment = Experiment::new(now, "site-A", "");
//! let measurement = Measurement::new(experiment.id(), Capture::builder(now, now).build());
//!
//! assert_eq!(measurement.experiment_id(), experiment.id());
//! ```

mod averaging;
mod experiment_record;
mod ids;
mod measurement_record;
mod processing_record;

pub use averaging::{average_measurements, canonical_order, AveragingMode};
pub(crate) use averaging::reduce_in_order;
pub use experiment_record::{Experiment, ExperimentBuilder, ExperimentKey};
pub use ids::{ExperimentId, MeasurementId, ResultId};
pub use measurement_record::{Measurement, MeasurementKey};
pub use processing_record::ProcessingResult;
