//! Video analysis run models.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::verdict::Verdict;

/// Unique identifier for one analysis run.
///
/// Names the directory the run's face crops are written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub String);

impl AnalysisId {
    /// Generate a new random analysis ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnalysisId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Outcome of running the full pipeline on one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub analysis_id: AnalysisId,
    pub verdict: Verdict,
    /// Frames handed to the face detector
    pub frames_sampled: u64,
    /// Face crops written to disk
    pub faces_extracted: usize,
    pub elapsed_ms: u64,
}
