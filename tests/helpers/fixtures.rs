//! Test fixtures: timestamps and single-channel captures

use chrono::{DateTime, TimeZone, Utc};
use lidar_db::capture::{Capture, ChannelProfile};

/// 2024-01-01T00:MM:00Z
pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
}

/// A one-laser, one-channel capture spanning `start..stop` minutes.
pub fn capture_between(start: u32, stop: u32, shots: u64, samples: Vec<f64>) -> Capture {
    Capture::builder(at(start), at(stop))
        .site("site-A")
        .laser(shots, 10)
        .profile(ChannelProfile::new("BT0", shots, samples))
        .build()
}

/// A one-minute capture starting at `minute`.
pub fn capture(minute: u32, shots: u64, samples: Vec<f64>) -> Capture {
    capture_between(minute, minute + 1, shots, samples)
}
