//! Quality gate for a single detected face.
//!
//! A face must pass before it is stored as a reference or used as a probe.
//! Checks run in a fixed order and the first failure is reported.

use crate::types::{DetectedFace, LandmarkKind, QualityVerdict};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Thresholds applied by the quality gate and the closeness helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    /// Required landmarks that must be present (all five by default).
    pub min_landmarks: usize,
    /// Maximum |yaw| in degrees.
    pub max_yaw: f32,
    /// Maximum |roll| in degrees.
    pub max_roll: f32,
    pub min_eye_open_probability: f32,
    /// Minimum bounding box width and height in pixels.
    pub min_face_size: f32,
    /// Bounding box side above which a capture is rejected as too close.
    pub too_close_size: f32,
    /// Bounding box side above which the match threshold is tightened.
    pub potentially_close_size: f32,
    /// Bounding box area (px²) above which the match threshold is tightened.
    pub potentially_close_area: f32,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            min_landmarks: LandmarkKind::REQUIRED.len(),
            max_yaw: 15.0,
            max_roll: 15.0,
            min_eye_open_probability: 0.6,
            min_face_size: 150.0,
            too_close_size: 900.0,
            potentially_close_size: 800.0,
            potentially_close_area: 400_000.0,
        }
    }
}

/// Reason a face failed the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityIssue {
    #[serde(rename = "insufficient landmarks")]
    InsufficientLandmarks,
    #[serde(rename = "yaw too large")]
    YawTooLarge,
    #[serde(rename = "roll too large")]
    RollTooLarge,
    #[serde(rename = "eye(s) not open")]
    EyesNotOpen,
    #[serde(rename = "face too small")]
    FaceTooSmall,
}

impl QualityIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityIssue::InsufficientLandmarks => "insufficient landmarks",
            QualityIssue::YawTooLarge => "yaw too large",
            QualityIssue::RollTooLarge => "roll too large",
            QualityIssue::EyesNotOpen => "eye(s) not open",
            QualityIssue::FaceTooSmall => "face too small",
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QualityPolicy {
    /// Run the quality gate. Absent pose and eye-openness values are not
    /// penalized.
    pub fn assess(&self, face: &DetectedFace) -> QualityVerdict {
        let present = face.landmarks.required_count();
        let issue = if present < self.min_landmarks {
            Some(QualityIssue::InsufficientLandmarks)
        } else if exceeds(face.head_euler_angle_y, self.max_yaw) {
            Some(QualityIssue::YawTooLarge)
        } else if exceeds(face.head_euler_angle_z, self.max_roll) {
            Some(QualityIssue::RollTooLarge)
        } else if [face.left_eye_open_probability, face.right_eye_open_probability]
            .iter()
            .flatten()
            .any(|&p| p < self.min_eye_open_probability)
        {
            Some(QualityIssue::EyesNotOpen)
        } else if face.bounding_box.width < self.min_face_size
            || face.bounding_box.height < self.min_face_size
        {
            Some(QualityIssue::FaceTooSmall)
        } else {
            None
        };

        match issue {
            Some(issue) => {
                tracing::debug!(
                    reason = %issue,
                    landmarks = present,
                    yaw = ?face.head_euler_angle_y,
                    roll = ?face.head_euler_angle_z,
                    width = face.bounding_box.width,
                    height = face.bounding_box.height,
                    "face rejected by quality gate"
                );
                QualityVerdict::fail(issue)
            }
            None => QualityVerdict::pass(),
        }
    }

    /// Whether the capture is close enough to the camera to be rejected outright.
    pub fn is_too_close(&self, face: &DetectedFace) -> bool {
        face.bounding_box.width > self.too_close_size
            || face.bounding_box.height > self.too_close_size
    }

    /// Looser closeness test used to tighten the match threshold.
    pub fn is_potentially_close(&self, face: &DetectedFace) -> bool {
        let bb = face.bounding_box;
        bb.width > self.potentially_close_size
            || bb.height > self.potentially_close_size
            || bb.area() > self.potentially_close_area
    }
}

fn exceeds(angle: Option<f32>, limit: f32) -> bool {
    angle.is_some_and(|a| a.abs() > limit)
}

/// Quality gate with the default thresholds.
pub fn assess_quality(face: &DetectedFace) -> QualityVerdict {
    QualityPolicy::default().assess(face)
}

pub fn is_face_too_close(face: &DetectedFace) -> bool {
    QualityPolicy::default().is_too_close(face)
}

pub fn is_face_potentially_close(face: &DetectedFace) -> bool {
    QualityPolicy::default().is_potentially_close(face)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FaceBox, LandmarkSet, Point2D};

    fn good_face() -> DetectedFace {
        let landmarks = LandmarkSet::new()
            .with(LandmarkKind::LeftEye, Point2D::new(100.0, 100.0))
            .with(LandmarkKind::RightEye, Point2D::new(200.0, 100.0))
            .with(LandmarkKind::NoseBase, Point2D::new(150.0, 140.0))
            .with(LandmarkKind::LeftMouth, Point2D::new(120.0, 180.0))
            .with(LandmarkKind::RightMouth, Point2D::new(180.0, 180.0));
        DetectedFace::new(landmarks, FaceBox::new(300.0, 300.0))
            .with_pose(4.0, -2.0)
            .with_eye_openness(0.95, 0.9)
    }

    #[test]
    fn test_good_face_passes() {
        let verdict = assess_quality(&good_face());
        assert!(verdict.passed);
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn test_boundary_values_pass() {
        let mut face = good_face().with_pose(15.0, -15.0).with_eye_openness(0.6, 0.6);
        face.bounding_box = FaceBox::new(150.0, 150.0);
        assert!(assess_quality(&face).passed);
    }

    #[test]
    fn test_absent_pose_and_eyes_are_not_penalized() {
        let mut face = good_face();
        face.head_euler_angle_y = None;
        face.head_euler_angle_z = None;
        face.left_eye_open_probability = None;
        face.right_eye_open_probability = None;
        assert!(assess_quality(&face).passed);
    }

    #[test]
    fn test_any_missing_required_landmark_fails() {
        for kind in LandmarkKind::REQUIRED {
            let mut face = good_face();
            face.landmarks.remove(kind);
            let verdict = assess_quality(&face);
            assert!(!verdict.passed, "{kind:?} missing should fail");
            assert_eq!(verdict.reason, Some(QualityIssue::InsufficientLandmarks));
        }
    }

    #[test]
    fn test_optional_landmarks_do_not_count() {
        let mut face = good_face();
        face.landmarks.remove(LandmarkKind::RightMouth);
        face.landmarks.insert(LandmarkKind::BottomMouth, Point2D::new(150.0, 190.0));
        face.landmarks.insert(LandmarkKind::LeftCheek, Point2D::new(90.0, 150.0));
        assert_eq!(assess_quality(&face).reason, Some(QualityIssue::InsufficientLandmarks));
    }

    #[test]
    fn test_yaw_too_large() {
        let face = good_face().with_pose(-15.5, 0.0);
        assert_eq!(assess_quality(&face).reason, Some(QualityIssue::YawTooLarge));
    }

    #[test]
    fn test_roll_too_large() {
        let face = good_face().with_pose(0.0, 20.0);
        assert_eq!(assess_quality(&face).reason, Some(QualityIssue::RollTooLarge));
    }

    #[test]
    fn test_either_eye_closed_fails() {
        let face = good_face().with_eye_openness(0.59, 0.99);
        assert_eq!(assess_quality(&face).reason, Some(QualityIssue::EyesNotOpen));

        let mut face = good_face();
        face.left_eye_open_probability = None;
        face.right_eye_open_probability = Some(0.1);
        assert_eq!(assess_quality(&face).reason, Some(QualityIssue::EyesNotOpen));
    }

    #[test]
    fn test_face_too_small() {
        let mut face = good_face();
        face.bounding_box = FaceBox::new(400.0, 149.0);
        assert_eq!(assess_quality(&face).reason, Some(QualityIssue::FaceTooSmall));
    }

    #[test]
    fn test_first_failure_wins() {
        let mut face = good_face().with_pose(30.0, 30.0);
        face.bounding_box = FaceBox::new(10.0, 10.0);
        assert_eq!(assess_quality(&face).reason, Some(QualityIssue::YawTooLarge));
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(QualityIssue::EyesNotOpen.to_string(), "eye(s) not open");
        let verdict = QualityVerdict::fail(QualityIssue::FaceTooSmall);
        let json = serde_json::to_string(&verdict).unwrap();
        assert_eq!(json, r#"{"passed":false,"reason":"face too small"}"#);
    }

    #[test]
    fn test_too_close() {
        let mut face = good_face();
        face.bounding_box = FaceBox::new(900.0, 900.0);
        assert!(!is_face_too_close(&face));
        face.bounding_box = FaceBox::new(901.0, 500.0);
        assert!(is_face_too_close(&face));
        face.bounding_box = FaceBox::new(500.0, 950.0);
        assert!(is_face_too_close(&face));
    }

    #[test]
    fn test_potentially_close() {
        let mut face = good_face();
        assert!(!is_face_potentially_close(&face));

        face.bounding_box = FaceBox::new(810.0, 300.0);
        assert!(is_face_potentially_close(&face));

        // 640 × 640 = 409 600 px² exceeds the area limit with both sides under 800
        face.bounding_box = FaceBox::new(640.0, 640.0);
        assert!(is_face_potentially_close(&face));

        face.bounding_box = FaceBox::new(600.0, 600.0);
        assert!(!is_face_potentially_close(&face));
    }
}
