//! Decoded instrument captures
//!
//! A [`Capture`] is one raw lidar acquisition after the binary Licel file
//! has been decoded: a capture window, the laser shot counters, and one
//! sampled profile per detection channel.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use lidar_db::capture::{Capture, ChannelProfile};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let stop = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
//!
//! let capture = Capture::builder(start, stop)
//!     .site("Tomsk")
//!     .laser(600, 10)
//!     .profile(ChannelProfile::new("BT0", 600, vec![1.0, 2.0, 3.0]))
//!     .build();
//!
//! assert_eq!(capture.shape().sample_lengths(), &[3]);
//! ```

mod pack;

pub use pack::CapturePack;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shot counter and repetition rate of one laser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Laser {
    /// Number of shots fired during the capture
    pub shots: u64,
    /// Pulse repetition frequency in Hz
    pub frequency_hz: u32,
}

/// Ordered samples from one detection channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    label: String,
    shots: u64,
    samples: Vec<f64>,
}

impl ChannelProfile {
    /// Create a channel profile.
    #[must_use]
    pub fn new(label: impl Into<String>, shots: u64, samples: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            shots,
            samples,
        }
    }

    /// Channel label as written by the acquisition software (e.g. `BT0`).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shots accumulated into this channel.
    #[must_use]
    pub const fn shots(&self) -> u64 {
        self.shots
    }

    /// Profile samples, ordered by range bin.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub(crate) fn add_shots(&mut self, shots: u64) {
        self.shots = self.shots.saturating_add(shots);
    }
}

/// Fixed shape of a capture: laser count and per-channel sample lengths.
///
/// Two captures can only be combined when their shapes are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureShape {
    lasers: usize,
    sample_lengths: Vec<usize>,
}

impl CaptureShape {
    /// Number of lasers.
    #[must_use]
    pub const fn lasers(&self) -> usize {
        self.lasers
    }

    /// Number of channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.sample_lengths.len()
    }

    /// Sample count of each channel, in channel order.
    #[must_use]
    pub fn sample_lengths(&self) -> &[usize] {
        &self.sample_lengths
    }
}

impl std::fmt::Display for CaptureShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} lasers, channels {:?}", self.lasers, self.sample_lengths)
    }
}

/// One decoded raw capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    site: String,
    start_time: DateTime<Utc>,
    stop_time: DateTime<Utc>,
    lasers: Vec<Laser>,
    profiles: Vec<ChannelProfile>,
}

impl Capture {
    /// Create a builder for a capture spanning `start_time..stop_time`.
    #[must_use]
    pub fn builder(start_time: DateTime<Utc>, stop_time: DateTime<Utc>) -> CaptureBuilder {
        CaptureBuilder::new(start_time, stop_time)
    }

    /// Measurement site name.
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Capture start timestamp.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Capture stop timestamp.
    #[must_use]
    pub const fn stop_time(&self) -> DateTime<Utc> {
        self.stop_time
    }

    /// Laser shot counters.
    #[must_use]
    pub fn lasers(&self) -> &[Laser] {
        &self.lasers
    }

    /// Channel profiles.
    #[must_use]
    pub fn profiles(&self) -> &[ChannelProfile] {
        &self.profiles
    }

    /// Shape used to decide whether captures can be combined.
    #[must_use]
    pub fn shape(&self) -> CaptureShape {
        CaptureShape {
            lasers: self.lasers.len(),
            sample_lengths: self.profiles.iter().map(|p| p.samples.len()).collect(),
        }
    }

    pub(crate) fn set_window(&mut self, start_time: DateTime<Utc>, stop_time: DateTime<Utc>) {
        self.start_time = start_time;
        self.stop_time = stop_time;
    }

    pub(crate) fn lasers_mut(&mut self) -> &mut [Laser] {
        &mut self.lasers
    }

    pub(crate) fn profiles_mut(&mut self) -> &mut [ChannelProfile] {
        &mut self.profiles
    }
}

/// Builder for `Capture`.
#[derive(Debug)]
pub struct CaptureBuilder {
    site: String,
    start_time: DateTime<Utc>,
    stop_time: DateTime<Utc>,
    lasers: Vec<Laser>,
    profiles: Vec<ChannelProfile>,
}

impl CaptureBuilder {
    /// Create a new builder with the capture window.
    #[must_use]
    pub const fn new(start_time: DateTime<Utc>, stop_time: DateTime<Utc>) -> Self {
        Self {
            site: String::new(),
            start_time,
            stop_time,
            lasers: Vec::new(),
            profiles: Vec::new(),
        }
    }

    /// Set the measurement site.
    #[must_use]
    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    /// Append a laser with its shot count and repetition frequency.
    #[must_use]
    pub fn laser(mut self, shots: u64, frequency_hz: u32) -> Self {
        self.lasers.push(Laser {
            shots,
            frequency_hz,
        });
        self
    }

    /// Append a channel profile.
    #[must_use]
    pub fn profile(mut self, profile: ChannelProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Build the `Capture`.
    #[must_use]
    pub fn build(self) -> Capture {
        Capture {
            site: self.site,
            start_time: self.start_time,
            stop_time: self.stop_time,
            lasers: self.lasers,
            profiles: self.profiles,
        }
    }
}
