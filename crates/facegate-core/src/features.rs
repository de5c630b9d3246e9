//! Declarative geometric feature table.
//!
//! Each row pairs a feature with its aggregation weight, a per-face
//! extractor and a comparator turning the reference/probe values into a
//! similarity. Similarities are nominally in [0, 1] but are not clamped
//! here.

use crate::geometry::{self, FaceGeometry};
use crate::matcher::MatchPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKind {
    LeftEyeToNoseRatio,
    RightEyeToNoseRatio,
    EyeToEyeRatio,
    EyeNoseEyeAngle,
    LeftEyeAngle,
    MouthWidthRatio,
    EyeToMouthRatio,
    NoseToMouthRatio,
    EyeMouthSymmetryRatio,
    LeftEyeToRightMouthRatio,
    RightEyeToLeftMouthRatio,
}

impl FeatureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::LeftEyeToNoseRatio => "leftEyeToNoseRatio",
            FeatureKind::RightEyeToNoseRatio => "rightEyeToNoseRatio",
            FeatureKind::EyeToEyeRatio => "eyeToEyeRatio",
            FeatureKind::EyeNoseEyeAngle => "eyeNoseEyeAngle",
            FeatureKind::LeftEyeAngle => "leftEyeAngle",
            FeatureKind::MouthWidthRatio => "mouthWidthRatio",
            FeatureKind::EyeToMouthRatio => "eyeToMouthRatio",
            FeatureKind::NoseToMouthRatio => "noseToMouthRatio",
            FeatureKind::EyeMouthSymmetryRatio => "eyeMouthSymmetryRatio",
            FeatureKind::LeftEyeToRightMouthRatio => "leftEyeToRightMouthRatio",
            FeatureKind::RightEyeToLeftMouthRatio => "rightEyeToLeftMouthRatio",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a pair of per-face values becomes a similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    /// `1 - min(|probe - reference| / scale, cap)`
    Difference { scale: f32, cap: f32 },
    /// `1 - min(|probe / reference - 1|, cap)`
    Ratio { cap: f32 },
    /// `1 - diff / 180`, or the policy's flat penalty once the angle
    /// difference exceeds the policy's angle threshold.
    AngleWithPenalty,
}

impl Comparator {
    /// NaN when either value (or their ratio) is NaN; `f32::min` would
    /// otherwise turn a NaN difference into the cap.
    pub fn similarity(&self, reference: f32, probe: f32, policy: &MatchPolicy) -> f32 {
        let diff = match *self {
            Comparator::Ratio { .. } => (probe / reference - 1.0).abs(),
            _ => (probe - reference).abs(),
        };
        if diff.is_nan() {
            return f32::NAN;
        }

        match *self {
            Comparator::Difference { scale, cap } => 1.0 - (diff / scale).min(cap),
            Comparator::Ratio { cap } => 1.0 - diff.min(cap),
            Comparator::AngleWithPenalty => {
                if diff > policy.angle_threshold {
                    policy.angle_penalty_similarity
                } else {
                    1.0 - diff / 180.0
                }
            }
        }
    }
}

/// One row of the feature table.
#[derive(Clone, Copy)]
pub struct Feature {
    pub kind: FeatureKind,
    pub weight: f32,
    /// Per-face measurement; `None` when the face lacks an optional landmark.
    pub extract: fn(&FaceGeometry) -> Option<f32>,
    pub compare: Comparator,
}

const UNCAPPED: f32 = f32::INFINITY;

pub const FEATURES: [Feature; 11] = [
    Feature {
        kind: FeatureKind::LeftEyeToNoseRatio,
        weight: 1.5,
        extract: |g| Some(g.normalized(g.left_eye, g.nose)),
        compare: Comparator::Difference { scale: 1.0, cap: UNCAPPED },
    },
    Feature {
        kind: FeatureKind::RightEyeToNoseRatio,
        weight: 1.5,
        extract: |g| Some(g.normalized(g.right_eye, g.nose)),
        compare: Comparator::Difference { scale: 1.0, cap: UNCAPPED },
    },
    Feature {
        kind: FeatureKind::EyeToEyeRatio,
        weight: 0.7,
        extract: |g| Some(g.eye_distance),
        compare: Comparator::Ratio { cap: 0.3 },
    },
    Feature {
        kind: FeatureKind::EyeNoseEyeAngle,
        weight: 2.0,
        extract: |g| Some(geometry::vertex_angle(g.nose, g.left_eye, g.right_eye)),
        compare: Comparator::AngleWithPenalty,
    },
    Feature {
        kind: FeatureKind::LeftEyeAngle,
        weight: 1.2,
        extract: |g| Some(geometry::line_angle(g.left_eye, g.right_eye)),
        compare: Comparator::Difference { scale: 90.0, cap: 0.5 },
    },
    Feature {
        kind: FeatureKind::MouthWidthRatio,
        weight: 1.0,
        extract: |g| Some(g.normalized(g.left_mouth, g.right_mouth)),
        compare: Comparator::Difference { scale: 1.0, cap: 0.3 },
    },
    Feature {
        kind: FeatureKind::EyeToMouthRatio,
        weight: 1.8,
        extract: |g| Some(g.normalized(g.eye_center(), g.mouth_center())),
        compare: Comparator::Difference { scale: 1.0, cap: 0.3 },
    },
    Feature {
        kind: FeatureKind::NoseToMouthRatio,
        weight: 1.5,
        extract: |g| g.bottom_mouth.map(|bottom| g.normalized(g.nose, bottom)),
        compare: Comparator::Difference { scale: 1.0, cap: 0.3 },
    },
    Feature {
        kind: FeatureKind::EyeMouthSymmetryRatio,
        weight: 1.6,
        extract: |g| {
            let right = g.right_eye.distance(&g.right_mouth);
            if right == 0.0 {
                return Some(f32::NAN);
            }
            Some(g.left_eye.distance(&g.left_mouth) / right)
        },
        compare: Comparator::Difference { scale: 1.0, cap: 0.5 },
    },
    Feature {
        kind: FeatureKind::LeftEyeToRightMouthRatio,
        weight: 1.4,
        extract: |g| Some(g.normalized(g.left_eye, g.right_mouth)),
        compare: Comparator::Difference { scale: 1.0, cap: 0.3 },
    },
    Feature {
        kind: FeatureKind::RightEyeToLeftMouthRatio,
        weight: 1.4,
        extract: |g| Some(g.normalized(g.right_eye, g.left_mouth)),
        compare: Comparator::Difference { scale: 1.0, cap: 0.3 },
    },
];

/// Raw similarity of one feature for a reference/probe pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScore {
    pub kind: FeatureKind,
    pub weight: f32,
    /// May be NaN; aggregation skips such features.
    pub similarity: f32,
}

/// Evaluate every table row for which both faces yield a measurement.
pub fn score_features(
    reference: &FaceGeometry,
    probe: &FaceGeometry,
    policy: &MatchPolicy,
) -> Vec<FeatureScore> {
    FEATURES
        .iter()
        .filter_map(|feature| {
            let r = (feature.extract)(reference)?;
            let p = (feature.extract)(probe)?;
            Some(FeatureScore {
                kind: feature.kind,
                weight: feature.weight,
                similarity: feature.compare.similarity(r, p, policy),
            })
        })
        .collect()
}
