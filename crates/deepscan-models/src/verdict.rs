//! Video-level verdict aggregation.
//!
//! A video is labelled `Deepfake` when the number of faces classified as
//! `Deepfake` reaches a fixed threshold, `Real` otherwise, and `Unknown`
//! when there was nothing to classify.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prediction::Label;

/// Default number of deepfake faces needed to flag a video.
pub const DEFAULT_DEEPFAKE_THRESHOLD: usize = 50;

/// Invalid verdict policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerdictPolicyError {
    #[error("deepfake threshold must be at least 1")]
    ZeroThreshold,
}

/// Threshold rule applied to per-face labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerdictPolicy {
    /// Minimum count of `Deepfake` faces for a `Deepfake` verdict
    min_deepfake_faces: usize,
}

impl VerdictPolicy {
    /// Create a policy. A zero threshold would flag every video with at
    /// least one face, so it is rejected.
    pub fn new(min_deepfake_faces: usize) -> Result<Self, VerdictPolicyError> {
        if min_deepfake_faces == 0 {
            return Err(VerdictPolicyError::ZeroThreshold);
        }
        Ok(Self { min_deepfake_faces })
    }

    pub fn min_deepfake_faces(&self) -> usize {
        self.min_deepfake_faces
    }
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            min_deepfake_faces: DEFAULT_DEEPFAKE_THRESHOLD,
        }
    }
}

/// Aggregate label for a whole video plus the counts it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    pub total_faces: usize,
    pub deepfake_faces: usize,
    pub real_faces: usize,
    pub unknown_faces: usize,
    pub threshold: usize,
}

impl Verdict {
    /// Verdict for a video in which no face was found.
    pub fn no_faces(policy: &VerdictPolicy) -> Self {
        Self {
            label: Label::Unknown,
            total_faces: 0,
            deepfake_faces: 0,
            real_faces: 0,
            unknown_faces: 0,
            threshold: policy.min_deepfake_faces,
        }
    }
}

/// Count per-face labels against the policy threshold.
///
/// `Unknown` labels are tallied but never count toward the threshold.
pub fn aggregate_labels<I>(labels: I, policy: &VerdictPolicy) -> Verdict
where
    I: IntoIterator<Item = Label>,
{
    let mut verdict = Verdict::no_faces(policy);

    for label in labels {
        verdict.total_faces += 1;
        match label {
            Label::Deepfake => verdict.deepfake_faces += 1,
            Label::Real => verdict.real_faces += 1,
            Label::Unknown => verdict.unknown_faces += 1,
        }
    }

    if verdict.total_faces == 0 {
        return verdict;
    }

    verdict.label = if verdict.deepfake_faces >= policy.min_deepfake_faces {
        Label::Deepfake
    } else {
        Label::Real
    };

    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(deepfake: usize, real: usize, unknown: usize) -> Vec<Label> {
        let mut out = vec![Label::Deepfake; deepfake];
        out.extend(vec![Label::Real; real]);
        out.extend(vec![Label::Unknown; unknown]);
        out
    }

    #[test]
    fn test_no_faces_is_unknown() {
        let verdict = aggregate_labels(Vec::new(), &VerdictPolicy::default());
        assert_eq!(verdict.label, Label::Unknown);
        assert_eq!(verdict.total_faces, 0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = VerdictPolicy::new(3).unwrap();

        let below = aggregate_labels(labels(2, 10, 0), &policy);
        assert_eq!(below.label, Label::Real);

        let at = aggregate_labels(labels(3, 10, 0), &policy);
        assert_eq!(at.label, Label::Deepfake);
        assert_eq!(at.deepfake_faces, 3);
        assert_eq!(at.real_faces, 10);
        assert_eq!(at.total_faces, 13);
    }

    #[test]
    fn test_default_threshold_is_fifty() {
        let policy = VerdictPolicy::default();
        assert_eq!(policy.min_deepfake_faces(), 50);
        assert_eq!(aggregate_labels(labels(49, 0, 0), &policy).label, Label::Real);
        assert_eq!(aggregate_labels(labels(50, 0, 0), &policy).label, Label::Deepfake);
    }

    #[test]
    fn test_unknown_faces_do_not_count() {
        let policy = VerdictPolicy::new(2).unwrap();
        let verdict = aggregate_labels(labels(1, 0, 5), &policy);
        assert_eq!(verdict.label, Label::Real);
        assert_eq!(verdict.unknown_faces, 5);
    }

    #[test]
    fn test_only_unknown_faces_is_real() {
        // Faces were found, so the video is classified; none reached the threshold.
        let verdict = aggregate_labels(labels(0, 0, 3), &VerdictPolicy::new(1).unwrap());
        assert_eq!(verdict.label, Label::Real);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert_eq!(VerdictPolicy::new(0), Err(VerdictPolicyError::ZeroThreshold));
    }
}
