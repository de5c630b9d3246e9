use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::{DetectedFace, GeometricMatcher, Matcher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate face verification diagnostics")]
struct Cli {
    /// TOML policy file (overrides FACEGATE_POLICY)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the quality gate on a detected face (JSON)
    Assess {
        face: PathBuf,
    },
    /// Match a probe face against a reference face (both JSON)
    Match {
        reference: PathBuf,
        probe: PathBuf,
    },
    /// Print the effective policy as TOML
    Policy,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssessReport {
    #[serde(flatten)]
    verdict: facegate_core::QualityVerdict,
    too_close: bool,
    potentially_close: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QualityFailure<'a> {
    face: &'a str,
    verdict: facegate_core::QualityVerdict,
}

fn load_face(path: &Path) -> Result<DetectedFace> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    DetectedFace::from_json(&json)
        .with_context(|| format!("parsing face JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env(cli.policy)?;
    if let Some(path) = &config.policy_path {
        tracing::debug!(path = %path.display(), "using policy file");
    }
    let quality = &config.policy.quality;

    match cli.command {
        Commands::Assess { face } => {
            let face = load_face(&face)?;
            let verdict = quality.assess(&face);
            let passed = verdict.passed;
            print_json(&AssessReport {
                verdict,
                too_close: quality.is_too_close(&face),
                potentially_close: quality.is_potentially_close(&face),
            })?;
            Ok(if passed { ExitCode::SUCCESS } else { ExitCode::from(2) })
        }
        Commands::Match { reference, probe } => {
            let reference = load_face(&reference)?;
            let probe = load_face(&probe)?;

            // Both faces must clear the gate before they may be compared.
            for (name, face) in [("reference", &reference), ("probe", &probe)] {
                let verdict = quality.assess(face);
                if !verdict.passed {
                    tracing::info!(face = name, reason = ?verdict.reason, "quality gate failed");
                    print_json(&QualityFailure { face: name, verdict })?;
                    return Ok(ExitCode::from(2));
                }
            }

            let matcher = GeometricMatcher::new(config.policy.clone());
            let result = matcher.compare(&reference, &probe);
            tracing::info!(
                matched = result.is_match,
                score = result.similarity_score,
                decision = ?result.details.decision,
                "comparison complete"
            );
            print_json(&result)?;
            Ok(if result.is_match { ExitCode::SUCCESS } else { ExitCode::from(1) })
        }
        Commands::Policy => {
            print!("{}", config.policy.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
