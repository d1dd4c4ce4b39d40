//! Capture pack - all captures read from one session directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Capture;

/// The set of captures that make up one acquisition session.
///
/// Captures keep the order in which the decoder produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapturePack {
    captures: Vec<Capture>,
}

impl CapturePack {
    /// Create an empty pack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a capture.
    pub fn push(&mut self, capture: Capture) {
        self.captures.push(capture);
    }

    /// Number of captures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.captures.len()
    }

    /// Whether the pack holds no captures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    /// Captures in decoder order.
    #[must_use]
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// Session start: the earliest capture start, `None` for an empty pack.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.captures.iter().map(Capture::start_time).min()
    }
}

impl FromIterator<Capture> for CapturePack {
    fn from_iter<I: IntoIterator<Item = Capture>>(iter: I) -> Self {
        Self {
            captures: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CapturePack {
    type Item = Capture;
    type IntoIter = std::vec::IntoIter<Capture>;

    fn into_iter(self) -> Self::IntoIter {
        self.captures.into_iter()
    }
}
