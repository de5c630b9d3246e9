//! Match diagnostics.
//!
//! Collects the intermediate values of a comparison into [`MatchDetails`]
//! so callers can audit why a decision was made. Nothing here influences
//! the decision itself.

use crate::features::FeatureKind;
use crate::types::MatchResult;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Rationale for a match decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AcceptedHighConfidence,
    /// Score in the borderline band and both corroborating checks held.
    AcceptedBorderline,
    BelowThreshold,
    /// Borderline score with left-eye openness differing beyond tolerance.
    BorderlineEyeOpenness,
    /// Borderline score with the eye-nose-eye angle among the failed features.
    BorderlineAngleFailed,
    MissingLandmarks,
    YawMismatch,
    RollMismatch,
    ScaleMismatch,
    InsufficientFeatures,
    TooManyFailedFeatures,
    /// Arithmetic fault (degenerate or non-finite geometry).
    #[default]
    GeometricFault,
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::AcceptedHighConfidence | Decision::AcceptedBorderline)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub decision: Decision,
    /// |reference yaw - probe yaw|, when both faces report yaw.
    pub y_rotation_diff: Option<f32>,
    /// |reference roll - probe roll|, when both faces report roll.
    pub z_rotation_diff: Option<f32>,
    /// Probe eye distance over reference eye distance.
    pub eye_ratio: Option<f32>,
    /// Similarity of every valid (non-NaN) feature.
    pub similarities: BTreeMap<FeatureKind, f32>,
    pub valid_feature_count: usize,
    pub effective_threshold: Option<f32>,
    pub left_eye_open_diff: Option<f32>,
    /// Recorded for auditing only; the borderline check reads the left eye.
    pub right_eye_open_diff: Option<f32>,
}

/// Weighted aggregate over the valid features of one comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub score: f32,
    pub similarities: BTreeMap<FeatureKind, f32>,
    pub failed: BTreeSet<FeatureKind>,
}

impl Aggregate {
    pub fn valid_count(&self) -> usize {
        self.similarities.len()
    }
}

/// Accumulates diagnostics over the course of one comparison.
#[derive(Debug, Default)]
pub(crate) struct Reporter {
    details: MatchDetails,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn details_mut(&mut self) -> &mut MatchDetails {
        &mut self.details
    }

    /// Fast-path rejection: score 0.0, no similarities.
    pub fn reject(mut self, decision: Decision) -> MatchResult {
        self.details.decision = decision;
        self.details.similarities.clear();
        self.details.valid_feature_count = 0;
        MatchResult {
            is_match: false,
            similarity_score: 0.0,
            failed_features: BTreeSet::new(),
            details: self.details,
        }
    }

    pub fn conclude(
        mut self,
        aggregate: Aggregate,
        effective_threshold: f32,
        decision: Decision,
    ) -> MatchResult {
        tracing::debug!(
            score = aggregate.score,
            threshold = effective_threshold,
            valid = aggregate.valid_count(),
            failed = ?aggregate.failed,
            ?decision,
            "face comparison decided"
        );

        self.details.decision = decision;
        self.details.valid_feature_count = aggregate.valid_count();
        self.details.effective_threshold = Some(effective_threshold);
        self.details.similarities = aggregate.similarities;
        MatchResult {
            is_match: decision.is_accept(),
            similarity_score: aggregate.score,
            failed_features: aggregate.failed,
            details: self.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_clears_similarities_but_keeps_rotation() {
        let mut reporter = Reporter::new();
        reporter.details_mut().y_rotation_diff = Some(9.0);
        reporter
            .details_mut()
            .similarities
            .insert(FeatureKind::EyeToEyeRatio, 1.0);

        let result = reporter.reject(Decision::YawMismatch);
        assert!(!result.is_match);
        assert_eq!(result.similarity_score, 0.0);
        assert!(result.details.similarities.is_empty());
        assert_eq!(result.details.y_rotation_diff, Some(9.0));
        assert_eq!(result.details.decision, Decision::YawMismatch);
    }

    #[test]
    fn test_conclude_passes_decision_through() {
        let mut aggregate = Aggregate { score: 0.97, ..Default::default() };
        aggregate.similarities.insert(FeatureKind::MouthWidthRatio, 0.97);

        let result = Reporter::new().conclude(aggregate.clone(), 0.92, Decision::BelowThreshold);
        assert!(!result.is_match);
        assert_eq!(result.similarity_score, 0.97);
        assert_eq!(result.details.valid_feature_count, 1);
        assert_eq!(result.details.effective_threshold, Some(0.92));

        let result = Reporter::new().conclude(aggregate, 0.92, Decision::AcceptedHighConfidence);
        assert!(result.is_match);
    }

    #[test]
    fn test_details_serialize_camel_case() {
        let mut details = MatchDetails {
            decision: Decision::ScaleMismatch,
            eye_ratio: Some(1.25),
            ..Default::default()
        };
        details.similarities.insert(FeatureKind::LeftEyeAngle, 1.0);

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["decision"], "scale_mismatch");
        assert_eq!(json["eyeRatio"], 1.25);
        assert_eq!(json["similarities"]["leftEyeAngle"], 1.0);
        assert!(json["yRotationDiff"].is_null());
    }
}
