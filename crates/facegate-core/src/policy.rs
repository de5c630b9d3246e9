//! Tunable thresholds, loadable from TOML.
//!
//! ```toml
//! [quality]
//! max_yaw = 12.0
//!
//! [matcher]
//! similarity_threshold = 0.93
//! ```
//!
//! Omitted keys keep their defaults.

use crate::matcher::MatchPolicy;
use crate::quality::QualityPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid policy TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode policy: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid policy: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub quality: QualityPolicy,
    pub matcher: MatchPolicy,
}

impl Policy {
    /// Parse and validate a policy from TOML text.
    pub fn from_toml_str(src: &str) -> Result<Self, PolicyError> {
        let policy: Policy = toml::from_str(src)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let src = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let policy = Self::from_toml_str(&src)?;
        tracing::info!(path = %path.display(), "loaded match policy");
        Ok(policy)
    }

    /// Encode as TOML. Thresholds are printed at `f32` precision, so the
    /// defaults read back as `0.6` rather than `0.6000000238418579`.
    pub fn to_toml_string(&self) -> Result<String, PolicyError> {
        let mut value = toml::Value::try_from(self)?;
        shorten_floats(&mut value);
        Ok(toml::to_string_pretty(&value)?)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let m = &self.matcher;
        let q = &self.quality;

        for (name, value) in [
            ("matcher.similarity_threshold", m.similarity_threshold),
            ("matcher.high_confidence_threshold", m.high_confidence_threshold),
            ("matcher.feature_floor", m.feature_floor),
            ("matcher.eye_open_tolerance", m.eye_open_tolerance),
            ("quality.min_eye_open_probability", q.min_eye_open_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PolicyError::Invalid(format!("{name} = {value} is outside [0, 1]")));
            }
        }

        if m.similarity_threshold > m.high_confidence_threshold {
            return Err(PolicyError::Invalid(format!(
                "similarity_threshold {} exceeds high_confidence_threshold {}",
                m.similarity_threshold, m.high_confidence_threshold
            )));
        }
        if !(m.min_eye_ratio > 0.0 && m.min_eye_ratio <= 1.0 && m.max_eye_ratio >= 1.0) {
            return Err(PolicyError::Invalid(format!(
                "eye ratio range [{}, {}] must contain 1.0 and be positive",
                m.min_eye_ratio, m.max_eye_ratio
            )));
        }
        if m.angle_threshold < 0.0 || m.close_face_margin < 0.0 {
            return Err(PolicyError::Invalid(
                "angle_threshold and close_face_margin must be non-negative".into(),
            ));
        }
        if q.min_landmarks > crate::types::LandmarkKind::REQUIRED.len() {
            return Err(PolicyError::Invalid(format!(
                "quality.min_landmarks = {} exceeds the {} required landmarks",
                q.min_landmarks,
                crate::types::LandmarkKind::REQUIRED.len()
            )));
        }

        Ok(())
    }
}

/// Re-round every float to the shortest decimal that parses to the same `f32`.
fn shorten_floats(value: &mut toml::Value) {
    match value {
        toml::Value::Float(f) => {
            if let Ok(short) = (*f as f32).to_string().parse::<f64>() {
                *f = short;
            }
        }
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| shorten_floats(v)),
        toml::Value::Array(items) => items.iter_mut().for_each(shorten_floats),
        _ => {}
    }
}
