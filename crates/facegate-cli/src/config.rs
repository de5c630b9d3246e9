use anyhow::{Context, Result};
use facegate_core::Policy;
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Optional TOML policy file (`FACEGATE_POLICY`).
    pub policy_path: Option<PathBuf>,
    /// Effective policy after file and env overrides.
    pub policy: Policy,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables.
    ///
    /// `explicit_policy` (from the command line) takes precedence over
    /// `FACEGATE_POLICY`. Threshold env vars override values from the file.
    pub fn from_env(explicit_policy: Option<PathBuf>) -> Result<Self> {
        let policy_path = explicit_policy
            .or_else(|| std::env::var("FACEGATE_POLICY").ok().map(PathBuf::from));

        let mut policy = match &policy_path {
            Some(path) => Policy::load(path)
                .with_context(|| format!("loading policy from {}", path.display()))?,
            None => Policy::default(),
        };

        let m = &mut policy.matcher;
        m.similarity_threshold = env_f32("FACEGATE_SIMILARITY_THRESHOLD", m.similarity_threshold);
        m.high_confidence_threshold =
            env_f32("FACEGATE_HIGH_CONFIDENCE_THRESHOLD", m.high_confidence_threshold);
        m.clamp_similarities = std::env::var("FACEGATE_CLAMP_SIMILARITIES")
            .map(|v| v != "0")
            .unwrap_or(m.clamp_similarities);

        policy.validate().context("invalid policy after environment overrides")?;

        Ok(Self { policy_path, policy })
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
