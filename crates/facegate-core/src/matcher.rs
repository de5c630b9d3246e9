//! Geometric face matcher.
//!
//! Compares a reference face with a probe face through structural
//! pre-checks, a weighted geometric feature score and a two-tier
//! acceptance threshold biased against false accepts.

use crate::features::{self, FeatureKind, FeatureScore};
use crate::geometry::{FaceGeometry, GeometryError};
use crate::policy::Policy;
use crate::report::{Aggregate, Decision, Reporter};
use crate::types::{DetectedFace, MatchResult};
use serde::{Deserialize, Serialize};

/// Thresholds applied by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Maximum yaw/roll difference (degrees) before a fast reject; also the
    /// eye-nose-eye angle difference that triggers the soft penalty.
    pub angle_threshold: f32,
    pub angle_penalty_similarity: f32,
    pub min_eye_ratio: f32,
    pub max_eye_ratio: f32,
    /// Features scoring below this are recorded as failed.
    pub feature_floor: f32,
    pub min_valid_features: usize,
    pub max_failed_features: usize,
    pub similarity_threshold: f32,
    pub high_confidence_threshold: f32,
    /// Added to `similarity_threshold` when the probe is potentially too close.
    pub close_face_margin: f32,
    /// Maximum left-eye openness difference accepted in the borderline band.
    pub eye_open_tolerance: f32,
    /// Clamp each similarity to [0, 1] before aggregation.
    pub clamp_similarities: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            angle_threshold: 8.0,
            angle_penalty_similarity: 0.5,
            min_eye_ratio: 0.85,
            max_eye_ratio: 1.15,
            feature_floor: 0.75,
            min_valid_features: 5,
            max_failed_features: 3,
            similarity_threshold: 0.92,
            high_confidence_threshold: 0.95,
            close_face_margin: 0.02,
            eye_open_tolerance: 0.35,
            clamp_similarities: false,
        }
    }
}

/// Strategy for deciding whether a probe face matches a reference face.
pub trait Matcher {
    fn compare(&self, reference: &DetectedFace, probe: &DetectedFace) -> MatchResult;
}

/// Landmark-geometry matcher.
///
/// Stateless: the reference face is supplied on every call, so a cached
/// reference is owned (and invalidated) by the caller.
#[derive(Debug, Clone, Default)]
pub struct GeometricMatcher {
    policy: Policy,
}

impl GeometricMatcher {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn evaluate(
        &self,
        reference: &DetectedFace,
        probe: &DetectedFace,
        reporter: &mut Reporter,
    ) -> Result<Option<(Aggregate, f32, Decision)>, GeometryError> {
        let policy = &self.policy.matcher;

        if !reference.landmarks.has_required() || !probe.landmarks.has_required() {
            reporter.details_mut().decision = Decision::MissingLandmarks;
            return Ok(None);
        }

        let details = reporter.details_mut();
        details.left_eye_open_diff =
            abs_diff(reference.left_eye_open_probability, probe.left_eye_open_probability);
        details.right_eye_open_diff =
            abs_diff(reference.right_eye_open_probability, probe.right_eye_open_probability);

        details.y_rotation_diff = abs_diff(reference.head_euler_angle_y, probe.head_euler_angle_y);
        details.z_rotation_diff = abs_diff(reference.head_euler_angle_z, probe.head_euler_angle_z);
        if details.y_rotation_diff.is_some_and(|d| d > policy.angle_threshold) {
            details.decision = Decision::YawMismatch;
            return Ok(None);
        }
        if details.z_rotation_diff.is_some_and(|d| d > policy.angle_threshold) {
            details.decision = Decision::RollMismatch;
            return Ok(None);
        }

        let ref_geometry = FaceGeometry::from_face(reference)?;
        let probe_geometry = FaceGeometry::from_face(probe)?;

        let eye_ratio = probe_geometry.eye_distance / ref_geometry.eye_distance;
        details.eye_ratio = Some(eye_ratio);
        if !(policy.min_eye_ratio..=policy.max_eye_ratio).contains(&eye_ratio) {
            details.decision = Decision::ScaleMismatch;
            return Ok(None);
        }

        let scores = features::score_features(&ref_geometry, &probe_geometry, policy);
        let aggregate = aggregate(&scores, policy);
        if !aggregate.score.is_finite() {
            return Err(GeometryError::NonFiniteScore(aggregate.score));
        }

        let close = self.policy.quality.is_potentially_close(probe);
        let threshold = effective_threshold(policy, close);
        let decision = decide(&aggregate, threshold, reference, probe, policy);
        Ok(Some((aggregate, threshold, decision)))
    }
}

impl Matcher for GeometricMatcher {
    fn compare(&self, reference: &DetectedFace, probe: &DetectedFace) -> MatchResult {
        let mut reporter = Reporter::new();
        match self.evaluate(reference, probe, &mut reporter) {
            Ok(Some((aggregate, threshold, decision))) => {
                reporter.conclude(aggregate, threshold, decision)
            }
            Ok(None) => {
                let decision = reporter.details_mut().decision;
                tracing::debug!(?decision, "face comparison rejected by pre-check");
                reporter.reject(decision)
            }
            Err(e) => {
                tracing::warn!(error = %e, "geometric fault during face comparison");
                reporter.reject(Decision::GeometricFault)
            }
        }
    }
}

/// Compare two faces with the default policy.
pub fn match_faces(reference: &DetectedFace, probe: &DetectedFace) -> MatchResult {
    GeometricMatcher::default().compare(reference, probe)
}

fn abs_diff(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    Some((a? - b?).abs())
}

/// Weighted mean over non-NaN features, with the failed-feature set.
pub(crate) fn aggregate(scores: &[FeatureScore], policy: &MatchPolicy) -> Aggregate {
    let mut result = Aggregate::default();
    let mut weighted = 0.0f32;
    let mut total_weight = 0.0f32;

    for score in scores {
        if score.similarity.is_nan() {
            tracing::debug!(feature = %score.kind, "skipping feature with NaN similarity");
            continue;
        }
        let similarity = if policy.clamp_similarities {
            score.similarity.clamp(0.0, 1.0)
        } else {
            score.similarity
        };

        if similarity < policy.feature_floor {
            result.failed.insert(score.kind);
        }
        weighted += similarity * score.weight;
        total_weight += score.weight;
        result.similarities.insert(score.kind, similarity);
    }

    result.score = if total_weight > 0.0 { weighted / total_weight } else { 0.0 };
    result
}

pub(crate) fn effective_threshold(policy: &MatchPolicy, probe_potentially_close: bool) -> f32 {
    if probe_potentially_close {
        policy.similarity_threshold + policy.close_face_margin
    } else {
        policy.similarity_threshold
    }
}

pub(crate) fn decide(
    aggregate: &Aggregate,
    threshold: f32,
    reference: &DetectedFace,
    probe: &DetectedFace,
    policy: &MatchPolicy,
) -> Decision {
    if aggregate.valid_count() < policy.min_valid_features {
        return Decision::InsufficientFeatures;
    }
    if aggregate.failed.len() > policy.max_failed_features {
        return Decision::TooManyFailedFeatures;
    }
    if aggregate.score < threshold {
        return Decision::BelowThreshold;
    }
    if aggregate.score >= policy.high_confidence_threshold {
        return Decision::AcceptedHighConfidence;
    }

    // Borderline band. Only the left eye is compared here; the right-eye
    // difference is reported in the details but does not affect the result.
    let left_eye_diff =
        abs_diff(reference.left_eye_open_probability, probe.left_eye_open_probability);
    if left_eye_diff.is_some_and(|d| d > policy.eye_open_tolerance) {
        Decision::BorderlineEyeOpenness
    } else if aggregate.failed.contains(&FeatureKind::EyeNoseEyeAngle) {
        Decision::BorderlineAngleFailed
    } else {
        Decision::AcceptedBorderline
    }
}
