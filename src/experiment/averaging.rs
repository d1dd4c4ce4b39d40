//! Shot-weighted combination of raw captures
//!
//! Merges N captures of identical shape into one:
//! - capture window spans the earliest start to the latest stop
//! - laser and channel shot counters are summed
//! - samples are summed elementwise, optionally divided by N
//!
//! Site, laser frequencies and channel labels come from the first capture
//! in accumulation order; instrument configuration is fixed within one
//! experiment.

use serde::{Deserialize, Serialize};

use super::Measurement;
use crate::capture::Capture;
use crate::{Error, Result};

/// How channel samples are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AveragingMode {
    /// Elementwise sum; samples scale with the summed shot counters (default)
    #[default]
    Accumulate,
    /// Elementwise sum divided by the number of measurements
    Mean,
}

impl AveragingMode {
    /// Get mode name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accumulate => "accumulate",
            Self::Mean => "mean",
        }
    }
}

impl std::fmt::Display for AveragingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine measurements into one aggregated capture.
///
/// Inputs are reduced in a canonical order (capture start, capture stop,
/// measurement id), so any permutation of the same set yields a
/// bit-identical result.
///
/// # Errors
///
/// Returns [`Error::Aggregation`] if `measurements` is empty or if any two
/// captures differ in laser count, channel count or per-channel sample
/// length. Shapes are checked before anything is accumulated.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use lidar_db::capture::{Capture, ChannelProfile};
/// use lidar_db::experiment::{average_measurements, AveragingMode, ExperimentId, Measurement};
///
/// let experiment = ExperimentId::new();
/// let capture = |minute, samples: Vec<f64>| {
///     let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
///     let stop = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 30).unwrap();
///     Capture::builder(start, stop)
///         .profile(ChannelProfile::new("BT0", 100, samples))
///         .build()
/// };
///
/// let measurements = vec![
///     Measurement::new(experiment, capture(0, vec![1.0, 2.0, 3.0])),
///     Measurement::new(experiment, capture(1, vec![4.0, 5.0, 6.0])),
/// ];
///
/// let merged = average_measurements(&measurements, AveragingMode::Accumulate)?;
/// assert_eq!(merged.profiles()[0].samples(), &[5.0, 7.0, 9.0]);
/// assert_eq!(merged.profiles()[0].shots(), 200);
/// # Ok::<(), lidar_db::Error>(())
/// ```
pub fn average_measurements(measurements: &[Measurement], mode: AveragingMode) -> Result<Capture> {
    reduce_in_order(&canonical_order(measurements), mode)
}

/// Measurements sorted by (capture start, capture stop, measurement id).
///
/// This is the order [`average_measurements`] accumulates in.
#[must_use]
pub fn canonical_order(measurements: &[Measurement]) -> Vec<&Measurement> {
    let mut ordered: Vec<&Measurement> = measurements.iter().collect();
    ordered.sort_by_key(|m| {
        let capture = m.capture();
        (capture.start_time(), capture.stop_time(), m.id())
    });
    ordered
}

/// Reduce measurements already in [`canonical_order`].
pub(crate) fn reduce_in_order(ordered: &[&Measurement], mode: AveragingMode) -> Result<Capture> {
    let Some((first, rest)) = ordered.split_first() else {
        return Err(Error::Aggregation(
            "cannot aggregate an empty measurement set".to_string(),
        ));
    };

    let shape = first.capture().shape();
    for measurement in rest {
        let other = measurement.capture().shape();
        if other != shape {
            return Err(Error::Aggregation(format!(
                "measurement {} has shape ({other}), expected ({shape})",
                measurement.id()
            )));
        }
    }

    let mut merged = first.capture().clone();
    let mut start_time = merged.start_time();
    let mut stop_time = merged.stop_time();

    for measurement in rest {
        let capture = measurement.capture();
        start_time = start_time.min(capture.start_time());
        stop_time = stop_time.max(capture.stop_time());

        for (acc, laser) in merged.lasers_mut().iter_mut().zip(capture.lasers()) {
            acc.shots = acc.shots.saturating_add(laser.shots);
        }

        for (acc, profile) in merged.profiles_mut().iter_mut().zip(capture.profiles()) {
            acc.add_shots(profile.shots());
            for (sum, sample) in acc.samples_mut().iter_mut().zip(profile.samples()) {
                *sum += sample;
            }
        }
    }

    merged.set_window(start_time, stop_time);

    if mode == AveragingMode::Mean {
        #[allow(clippy::cast_precision_loss)]
        let count = ordered.len() as f64;
        for profile in merged.profiles_mut() {
            for sample in profile.samples_mut() {
                *sample /= count;
            }
        }
    }

    Ok(merged)
}
