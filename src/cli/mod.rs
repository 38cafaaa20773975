//! CLI interface using clap
//!
//! Provides the command-line interface for fairgate

mod commands;

pub use commands::*;

use crate::checks::ArtifactKind;
use crate::host::RepoRef;
use crate::remediate::MarkerAction;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fairgate - FAIR-software compliance validation and remediation
#[derive(Parser, Debug)]
#[command(name = "fairgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Validation store location (overrides the configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Hosting API token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a repository and record the results
    Audit(AuditArgs),

    /// Print a synthesized CITATION.cff or codemeta.json
    Synth(SynthArgs),

    /// Open a pull request proposing a missing or outdated artifact
    Remediate(RemediateArgs),

    /// Queue an action on the tracking issue
    Request(RequestArgs),

    /// Show stored validation records
    Status(StatusArgs),

    /// Remove a repository and its records from the store
    Forget(ForgetArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_repo(value: &str) -> Result<RepoRef, String> {
    RepoRef::parse(value).ok_or_else(|| format!("expected owner/name, got '{}'", value))
}

/// Repository selector shared by most commands
#[derive(clap::Args, Debug, Clone)]
pub struct RepoArg {
    /// Repository as owner/name
    #[arg(short, long, value_parser = parse_repo)]
    pub repo: RepoRef,
}

/// Arguments for audit command
#[derive(Parser, Debug)]
pub struct AuditArgs {
    #[command(flatten)]
    pub target: RepoArg,

    /// Skip the workflow-description walk
    #[arg(long)]
    pub light: bool,

    /// Draft CITATION.cff and codemeta.json when they are missing
    #[arg(long)]
    pub draft: bool,

    /// Update the tracking issue with the results
    #[arg(long)]
    pub dashboard: bool,

    /// Only serve actions queued on the tracking issue
    #[arg(long, conflicts_with_all = ["light", "draft", "dashboard"])]
    pub pending: bool,
}

/// Arguments for synth command
#[derive(Parser, Debug)]
pub struct SynthArgs {
    #[command(flatten)]
    pub target: RepoArg,

    /// Document to build (citation, codemeta)
    pub artifact: ArtifactKind,

    /// Write to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Arguments for remediate command
#[derive(Parser, Debug)]
pub struct RemediateArgs {
    #[command(flatten)]
    pub target: RepoArg,

    /// Artifact to propose (license, readme, citation, codemeta, contributing, code_of_conduct)
    pub artifact: ArtifactKind,

    /// SPDX identifier of the license to propose
    #[arg(long)]
    pub spdx: Option<String>,
}

/// Arguments for request command
#[derive(Parser, Debug)]
pub struct RequestArgs {
    #[command(flatten)]
    pub target: RepoArg,

    /// Action to queue (re-render-dashboard, rerun-full-repo-validation,
    /// rerun-workflow-validation, rerun-metadata-validation)
    pub action: MarkerAction,
}

/// Arguments for status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: RepoArg,

    /// Include stored content snapshots
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for forget command
#[derive(Parser, Debug)]
pub struct ForgetArgs {
    #[command(flatten)]
    pub target: RepoArg,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Print the configuration file location
    #[arg(long)]
    pub path: bool,

    /// Write the default configuration to the configuration file
    #[arg(long)]
    pub reset: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_parsing() {
        let cli = Cli::parse_from(["fairgate", "audit", "--repo", "lab/tool", "--draft"]);
        let Commands::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.target.repo, RepoRef::new("lab", "tool"));
        assert!(args.draft);
        assert!(!args.light);
    }

    #[test]
    fn test_remediate_parsing() {
        let cli = Cli::parse_from([
            "fairgate",
            "remediate",
            "--repo",
            "lab/tool",
            "code_of_conduct",
        ]);
        if let Commands::Remediate(args) = cli.command {
            assert_eq!(args.artifact, ArtifactKind::CodeOfConduct);
            assert!(args.spdx.is_none());
        } else {
            panic!("expected remediate");
        }
    }

    #[test]
    fn test_request_parsing() {
        let cli = Cli::parse_from([
            "fairgate",
            "-o",
            "json",
            "request",
            "--repo",
            "lab/tool",
            "rerun-full-repo-validation",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        if let Commands::Request(args) = cli.command {
            assert_eq!(args.action, MarkerAction::RerunFullRepoValidation);
        } else {
            panic!("expected request");
        }
    }

    #[test]
    fn test_invalid_repo_is_rejected() {
        assert!(Cli::try_parse_from(["fairgate", "status", "--repo", "nope"]).is_err());
        assert!(Cli::try_parse_from(["fairgate", "remediate", "--repo", "a/b", "cofc"]).is_err());
    }
}
