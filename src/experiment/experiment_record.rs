//! Experiment Record - root entity of a capture session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExperimentId;

/// Experiment represents one logical measurement session.
///
/// This is the root entity of the schema. Measurements and processing
/// results point back to it by [`ExperimentId`]; an experiment can be
/// loaded without its children.
///
/// The pair (`start_time`, `title`) is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    id: ExperimentId,
    start_time: DateTime<Utc>,
    title: String,
    comments: String,
}

impl Experiment {
    /// Create a new experiment with a freshly assigned identifier.
    ///
    /// # Arguments
    ///
    /// * `start_time` - Session start
    /// * `title` - Human-readable title
    /// * `comments` - Free-text operator comments
    #[must_use]
    pub fn new(
        start_time: DateTime<Utc>,
        title: impl Into<String>,
        comments: impl Into<String>,
    ) -> Self {
        Self::builder(start_time, title).comments(comments).build()
    }

    /// Create a builder for constructing an experiment with optional fields.
    #[must_use]
    pub fn builder(start_time: DateTime<Utc>, title: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(start_time, title)
    }

    /// Get the experiment ID.
    #[must_use]
    pub const fn id(&self) -> ExperimentId {
        self.id
    }

    /// Get the session start timestamp.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Get the experiment title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Get the operator comments.
    #[must_use]
    pub fn comments(&self) -> &str {
        &self.comments
    }

    /// Natural key of this experiment.
    #[must_use]
    pub fn natural_key(&self) -> ExperimentKey {
        ExperimentKey::new(self.start_time, self.title.clone())
    }
}

/// Natural key of an experiment: (start time, title).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentKey {
    /// Session start
    pub start_time: DateTime<Utc>,
    /// Experiment title
    pub title: String,
}

impl ExperimentKey {
    /// Create a key.
    #[must_use]
    pub fn new(start_time: DateTime<Utc>, title: impl Into<String>) -> Self {
        Self {
            start_time,
            title: title.into(),
        }
    }
}

impl std::fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start={} title={:?}", self.start_time.to_rfc3339(), self.title)
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    id: ExperimentId,
    start_time: DateTime<Utc>,
    title: String,
    comments: String,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(start_time: DateTime<Utc>, title: impl Into<String>) -> Self {
        Self {
            id: ExperimentId::new(),
            start_time,
            title: title.into(),
            comments: String::new(),
        }
    }

    /// Set the operator comments.
    #[must_use]
    pub fn comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    /// Set an explicit identifier (useful for deserialization/testing).
    #[must_use]
    pub const fn id(mut self, id: ExperimentId) -> Self {
        self.id = id;
        self
    }

    /// Build the `Experiment`.
    #[must_use]
    pub fn build(self) -> Experiment {
        Experiment {
            id: self.id,
            start_time: self.start_time,
            title: self.title,
            comments: self.comments,
        }
    }
}
