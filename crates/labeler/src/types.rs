use serde::{Deserialize, Serialize};
use std::fmt;

/// One stored text eligible for labeling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub identifier: String,
    pub body: String,
}

impl Record {
    pub fn new(identifier: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            body: body.into(),
        }
    }
}

/// A phrase together with the definition it is scored against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTask {
    pub phrase: String,
    pub definition: String,
}

impl LabelTask {
    pub fn new(phrase: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            definition: definition.into(),
        }
    }
}

impl fmt::Display for LabelTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phrase)
    }
}

/// Probability that a record uses the phrase in the defined sense
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub identifier: String,
    /// Always within `[0.0, 1.0]`
    pub probability: f64,
}

/// Label counts for one phrase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhraseSummary {
    /// Eligible records without a label
    pub pending: u64,
    /// Records carrying any label
    pub labeled: u64,
    /// Records labeled exactly 1.0
    pub accepted: u64,
}

/// Outcome of one task within a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub phrase: String,
    pub pending: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub labeled: usize,
}

impl TaskReport {
    pub fn new(phrase: impl Into<String>, pending: usize) -> Self {
        Self {
            phrase: phrase.into(),
            pending,
            ..Default::default()
        }
    }
}
