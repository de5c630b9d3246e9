//! facegate-core — Landmark-based face verification engine.
//!
//! Gates detected faces on landmark completeness, pose, eye openness and
//! size, then matches a probe against a reference using normalized facial
//! geometry. Pure and synchronous: no I/O, no shared state.

pub mod features;
pub mod geometry;
pub mod matcher;
pub mod policy;
pub mod quality;
pub mod report;
pub mod types;

pub use features::FeatureKind;
pub use matcher::{match_faces, GeometricMatcher, MatchPolicy, Matcher};
pub use policy::{Policy, PolicyError};
pub use quality::{
    assess_quality, is_face_potentially_close, is_face_too_close, QualityIssue, QualityPolicy,
};
pub use report::{Decision, MatchDetails};
pub use types::{
    DetectedFace, FaceBox, LandmarkKind, LandmarkSet, MatchResult, Point2D, QualityVerdict,
};
