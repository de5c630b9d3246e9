//! Landmark geometry: angle primitives and the per-face measurements the
//! feature table is built from.
//!
//! Every distance is later normalized by the face's own eye distance, so a
//! face is only usable when that distance is finite and non-zero.

use crate::types::{DetectedFace, LandmarkKind, Point2D};
use thiserror::Error;

/// Eye distances at or below this many pixels are treated as degenerate.
const MIN_EYE_DISTANCE: f32 = 1e-3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("landmark {0:?} is missing")]
    MissingLandmark(LandmarkKind),
    #[error("landmark {0:?} has non-finite coordinates")]
    NonFinite(LandmarkKind),
    #[error("eye distance {0} px is too small to normalize against")]
    DegenerateEyeDistance(f32),
    #[error("aggregate similarity is not finite: {0}")]
    NonFiniteScore(f32),
}

/// Angle in degrees at `vertex` between the rays towards `a` and `b`.
///
/// The cosine is clamped to [-1, 1] before `acos`. A zero-length ray yields
/// NaN, which callers treat as "feature unavailable".
pub fn vertex_angle(vertex: Point2D, a: Point2D, b: Point2D) -> f32 {
    let (ax, ay) = (a.x - vertex.x, a.y - vertex.y);
    let (bx, by) = (b.x - vertex.x, b.y - vertex.y);

    let dot = ax * bx + ay * by;
    let norms = (ax * ax + ay * ay).sqrt() * (bx * bx + by * by).sqrt();
    if norms == 0.0 {
        return f32::NAN;
    }

    (dot / norms).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Angle in degrees of the line `from -> to` relative to the image x-axis.
pub fn line_angle(from: Point2D, to: Point2D) -> f32 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Landmarks of one face, validated for comparison.
#[derive(Debug, Clone, Copy)]
pub struct FaceGeometry {
    pub left_eye: Point2D,
    pub right_eye: Point2D,
    pub nose: Point2D,
    pub left_mouth: Point2D,
    pub right_mouth: Point2D,
    pub bottom_mouth: Option<Point2D>,
    /// Intrinsic scale of the face.
    pub eye_distance: f32,
}

impl FaceGeometry {
    pub fn from_face(face: &DetectedFace) -> Result<Self, GeometryError> {
        let point = |kind: LandmarkKind| -> Result<Point2D, GeometryError> {
            let p = face
                .landmarks
                .get(kind)
                .ok_or(GeometryError::MissingLandmark(kind))?;
            if !p.is_finite() {
                return Err(GeometryError::NonFinite(kind));
            }
            Ok(p)
        };

        let left_eye = point(LandmarkKind::LeftEye)?;
        let right_eye = point(LandmarkKind::RightEye)?;
        let bottom_mouth = match face.landmarks.get(LandmarkKind::BottomMouth) {
            Some(_) => Some(point(LandmarkKind::BottomMouth)?),
            None => None,
        };

        let eye_distance = left_eye.distance(&right_eye);
        if !(eye_distance > MIN_EYE_DISTANCE) || !eye_distance.is_finite() {
            return Err(GeometryError::DegenerateEyeDistance(eye_distance));
        }

        Ok(Self {
            left_eye,
            right_eye,
            nose: point(LandmarkKind::NoseBase)?,
            left_mouth: point(LandmarkKind::LeftMouth)?,
            right_mouth: point(LandmarkKind::RightMouth)?,
            bottom_mouth,
            eye_distance,
        })
    }

    /// `distance(a, b)` in units of eye distance.
    pub fn normalized(&self, a: Point2D, b: Point2D) -> f32 {
        a.distance(&b) / self.eye_distance
    }

    pub fn eye_center(&self) -> Point2D {
        self.left_eye.midpoint(&self.right_eye)
    }

    pub fn mouth_center(&self) -> Point2D {
        self.left_mouth.midpoint(&self.right_mouth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FaceBox, LandmarkSet};

    fn reference_face() -> DetectedFace {
        let landmarks = LandmarkSet::new()
            .with(LandmarkKind::LeftEye, Point2D::new(100.0, 100.0))
            .with(LandmarkKind::RightEye, Point2D::new(200.0, 100.0))
            .with(LandmarkKind::NoseBase, Point2D::new(150.0, 140.0))
            .with(LandmarkKind::LeftMouth, Point2D::new(120.0, 180.0))
            .with(LandmarkKind::RightMouth, Point2D::new(180.0, 180.0));
        DetectedFace::new(landmarks, FaceBox::new(300.0, 300.0))
    }

    #[test]
    fn test_vertex_angle_right_angle() {
        let angle = vertex_angle(
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(0.0, 10.0),
        );
        assert!((angle - 90.0).abs() < 1e-4, "angle = {angle}");
    }

    #[test]
    fn test_vertex_angle_collinear_is_clamped() {
        // Same direction: cosine may round slightly above 1.0
        let angle = vertex_angle(
            Point2D::new(0.0, 0.0),
            Point2D::new(3.0, 3.0),
            Point2D::new(7.0, 7.0),
        );
        assert!(angle.is_finite());
        assert!(angle.abs() < 0.1, "angle = {angle}");
    }

    #[test]
    fn test_vertex_angle_zero_ray_is_nan() {
        let p = Point2D::new(5.0, 5.0);
        assert!(vertex_angle(p, p, Point2D::new(1.0, 1.0)).is_nan());
    }

    #[test]
    fn test_line_angle() {
        let o = Point2D::new(0.0, 0.0);
        assert!(line_angle(o, Point2D::new(10.0, 0.0)).abs() < 1e-6);
        assert!((line_angle(o, Point2D::new(10.0, 10.0)) - 45.0).abs() < 1e-4);
        assert!((line_angle(o, Point2D::new(0.0, -10.0)) + 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_from_face_normalizes_by_eye_distance() {
        let g = FaceGeometry::from_face(&reference_face()).unwrap();
        assert!((g.eye_distance - 100.0).abs() < 1e-6);
        assert!((g.normalized(g.left_mouth, g.right_mouth) - 0.6).abs() < 1e-6);
        assert_eq!(g.eye_center(), Point2D::new(150.0, 100.0));
        assert_eq!(g.mouth_center(), Point2D::new(150.0, 180.0));
        assert!(g.bottom_mouth.is_none());
    }

    #[test]
    fn test_from_face_missing_landmark() {
        let mut face = reference_face();
        face.landmarks.remove(LandmarkKind::NoseBase);
        assert_eq!(
            FaceGeometry::from_face(&face).unwrap_err(),
            GeometryError::MissingLandmark(LandmarkKind::NoseBase)
        );
    }

    #[test]
    fn test_from_face_degenerate_eye_distance() {
        let mut face = reference_face();
        face.landmarks.insert(LandmarkKind::RightEye, Point2D::new(100.0, 100.0));
        assert!(matches!(
            FaceGeometry::from_face(&face),
            Err(GeometryError::DegenerateEyeDistance(_))
        ));
    }

    #[test]
    fn test_from_face_non_finite() {
        let mut face = reference_face();
        face.landmarks.insert(LandmarkKind::LeftMouth, Point2D::new(f32::NAN, 180.0));
        assert_eq!(
            FaceGeometry::from_face(&face).unwrap_err(),
            GeometryError::NonFinite(LandmarkKind::LeftMouth)
        );
    }
}
