use crate::features::FeatureKind;
use crate::quality::QualityIssue;
use crate::report::MatchDetails;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Pixel coordinate in the detector's image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point2D) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Anatomical landmark kinds reported by the external detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    NoseBase,
    LeftMouth,
    RightMouth,
    BottomMouth,
    LeftCheek,
    RightCheek,
}

impl LandmarkKind {
    /// Landmarks every face must carry before it can be compared.
    pub const REQUIRED: [LandmarkKind; 5] = [
        LandmarkKind::LeftEye,
        LandmarkKind::RightEye,
        LandmarkKind::NoseBase,
        LandmarkKind::LeftMouth,
        LandmarkKind::RightMouth,
    ];
}

/// Landmarks resolved by the detector. A missing kind means the detector
/// could not place that landmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(BTreeMap<LandmarkKind, Point2D>);

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, kind: LandmarkKind, point: Point2D) -> Self {
        self.0.insert(kind, point);
        self
    }

    pub fn insert(&mut self, kind: LandmarkKind, point: Point2D) -> Option<Point2D> {
        self.0.insert(kind, point)
    }

    pub fn remove(&mut self, kind: LandmarkKind) -> Option<Point2D> {
        self.0.remove(&kind)
    }

    pub fn get(&self, kind: LandmarkKind) -> Option<Point2D> {
        self.0.get(&kind).copied()
    }

    pub fn contains(&self, kind: LandmarkKind) -> bool {
        self.0.contains_key(&kind)
    }

    /// Number of [`LandmarkKind::REQUIRED`] kinds present.
    pub fn required_count(&self) -> usize {
        LandmarkKind::REQUIRED
            .iter()
            .filter(|kind| self.contains(**kind))
            .count()
    }

    pub fn has_required(&self) -> bool {
        self.required_count() == LandmarkKind::REQUIRED.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LandmarkKind, Point2D)> + '_ {
        self.0.iter().map(|(kind, point)| (*kind, *point))
    }
}

impl FromIterator<(LandmarkKind, Point2D)> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = (LandmarkKind, Point2D)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Size of the detected face's bounding box, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// One face as produced by the external detector.
///
/// Landmark coordinates share the pixel space of `bounding_box`; the
/// probabilities are in [0, 1] or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub landmarks: LandmarkSet,
    pub bounding_box: FaceBox,
    /// Yaw in degrees.
    #[serde(default)]
    pub head_euler_angle_y: Option<f32>,
    /// Roll in degrees.
    #[serde(default)]
    pub head_euler_angle_z: Option<f32>,
    #[serde(default)]
    pub left_eye_open_probability: Option<f32>,
    #[serde(default)]
    pub right_eye_open_probability: Option<f32>,
}

impl DetectedFace {
    pub fn new(landmarks: LandmarkSet, bounding_box: FaceBox) -> Self {
        Self {
            landmarks,
            bounding_box,
            head_euler_angle_y: None,
            head_euler_angle_z: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
        }
    }

    pub fn with_pose(mut self, yaw: f32, roll: f32) -> Self {
        self.head_euler_angle_y = Some(yaw);
        self.head_euler_angle_z = Some(roll);
        self
    }

    pub fn with_eye_openness(mut self, left: f32, right: f32) -> Self {
        self.left_eye_open_probability = Some(left);
        self.right_eye_open_probability = Some(right);
        self
    }

    /// Load a face from the detector's JSON encoding.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Outcome of the quality gate for a single face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityVerdict {
    pub passed: bool,
    pub reason: Option<QualityIssue>,
}

impl QualityVerdict {
    pub fn pass() -> Self {
        Self { passed: true, reason: None }
    }

    pub fn fail(issue: QualityIssue) -> Self {
        Self { passed: false, reason: Some(issue) }
    }
}

/// Result of comparing a reference face with a probe face.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// The sole authorization signal.
    pub is_match: bool,
    /// Weighted aggregate of the per-feature similarities.
    pub similarity_score: f32,
    /// Features whose similarity fell below the per-feature floor.
    pub failed_features: BTreeSet<FeatureKind>,
    pub details: MatchDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
        assert!((b.distance(&a) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_point_midpoint() {
        let m = Point2D::new(120.0, 180.0).midpoint(&Point2D::new(180.0, 180.0));
        assert_eq!(m, Point2D::new(150.0, 180.0));
    }

    #[test]
    fn test_required_count() {
        let set = LandmarkSet::new()
            .with(LandmarkKind::LeftEye, Point2D::new(1.0, 1.0))
            .with(LandmarkKind::RightEye, Point2D::new(2.0, 1.0))
            .with(LandmarkKind::LeftCheek, Point2D::new(0.0, 2.0));
        assert_eq!(set.required_count(), 2);
        assert!(!set.has_required());
    }

    #[test]
    fn test_detected_face_from_json() {
        let json = r#"{
            "landmarks": {
                "leftEye": {"x": 100, "y": 100},
                "rightEye": {"x": 200, "y": 100},
                "noseBase": {"x": 150, "y": 140},
                "leftMouth": {"x": 120, "y": 180},
                "rightMouth": {"x": 180, "y": 180}
            },
            "boundingBox": {"width": 300, "height": 320},
            "headEulerAngleY": -3.5,
            "leftEyeOpenProbability": 0.97
        }"#;

        let face = DetectedFace::from_json(json).unwrap();
        assert!(face.landmarks.has_required());
        assert_eq!(face.landmarks.get(LandmarkKind::NoseBase), Some(Point2D::new(150.0, 140.0)));
        assert_eq!(face.bounding_box, FaceBox::new(300.0, 320.0));
        assert_eq!(face.head_euler_angle_y, Some(-3.5));
        assert_eq!(face.head_euler_angle_z, None);
        assert_eq!(face.left_eye_open_probability, Some(0.97));
        assert_eq!(face.right_eye_open_probability, None);
    }

    #[test]
    fn test_detected_face_rejects_unknown_landmark() {
        let json = r#"{
            "landmarks": {"leftEar": {"x": 1, "y": 1}},
            "boundingBox": {"width": 300, "height": 300}
        }"#;
        assert!(DetectedFace::from_json(json).is_err());
    }
}
