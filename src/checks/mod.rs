//! Artifact presence checkers
//!
//! Each artifact type has a fixed, ordered list of candidate paths. Checkers probe
//! them one at a time and stop at the first hit; nothing is fetched speculatively.
//! Workflow-description files are the exception and are found by walking the tree.

mod candidates;
mod workflow;

pub use workflow::find_workflow_files;

use crate::content::ContentReader;
use crate::error::FairError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Governance artifact types
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    License,
    Readme,
    Citation,
    Codemeta,
    Contributing,
    CodeOfConduct,
    Workflow,
}

impl ArtifactKind {
    /// Artifacts checked on every run, in report order
    pub const FIXED: [ArtifactKind; 6] = [
        ArtifactKind::License,
        ArtifactKind::Readme,
        ArtifactKind::Citation,
        ArtifactKind::Codemeta,
        ArtifactKind::Contributing,
        ArtifactKind::CodeOfConduct,
    ];

    /// Canonical key used in storage, markers and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            ArtifactKind::License => "license",
            ArtifactKind::Readme => "readme",
            ArtifactKind::Citation => "citation",
            ArtifactKind::Codemeta => "codemeta",
            ArtifactKind::Contributing => "contributing",
            ArtifactKind::CodeOfConduct => "code_of_conduct",
            ArtifactKind::Workflow => "workflow",
        }
    }

    /// Upper-case name used in human-readable messages
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ArtifactKind::License => "LICENSE",
            ArtifactKind::Readme => "README",
            ArtifactKind::Citation => "CITATION",
            ArtifactKind::Codemeta => "CODEMETA",
            ArtifactKind::Contributing => "CONTRIBUTING",
            ArtifactKind::CodeOfConduct => "CODE_OF_CONDUCT",
            ArtifactKind::Workflow => "WORKFLOW",
        }
    }

    /// Title shown on the dashboard
    pub fn title(&self) -> &'static str {
        match self {
            ArtifactKind::License => "License",
            ArtifactKind::Readme => "README",
            ArtifactKind::Citation => "CITATION.cff",
            ArtifactKind::Codemeta => "codemeta.json",
            ArtifactKind::Contributing => "Contributing guide",
            ArtifactKind::CodeOfConduct => "Code of conduct",
            ArtifactKind::Workflow => "Workflow descriptions",
        }
    }

    /// Path reported when no candidate exists
    pub fn not_found_path(&self) -> String {
        format!("No {} file found", self.canonical_name())
    }

    /// Ordered candidate paths; empty for the tree-walked workflow type
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            ArtifactKind::License => candidates::LICENSE,
            ArtifactKind::Readme => candidates::README,
            ArtifactKind::Citation => candidates::CITATION,
            ArtifactKind::Codemeta => candidates::CODEMETA,
            ArtifactKind::Contributing => candidates::CONTRIBUTING,
            ArtifactKind::CodeOfConduct => candidates::CODE_OF_CONDUCT,
            ArtifactKind::Workflow => &[],
        }
    }

    /// Path a remediation writes to when the artifact is absent
    pub fn target_path(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::Workflow => None,
            other => other.candidates().first().copied(),
        }
    }

    pub fn is_remediable(&self) -> bool {
        self.target_path().is_some()
    }

    /// Branch name prefix for remediation branches
    pub fn branch_prefix(&self) -> String {
        self.key().replace('_', "-")
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when parsing an unknown artifact name
#[derive(Debug, Clone, Error)]
#[error("unknown artifact '{0}' (expected one of: license, readme, citation, codemeta, contributing, code_of_conduct, workflow)")]
pub struct UnknownArtifact(pub String);

impl FromStr for ArtifactKind {
    type Err = UnknownArtifact;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "license" => Ok(ArtifactKind::License),
            "readme" => Ok(ArtifactKind::Readme),
            "citation" => Ok(ArtifactKind::Citation),
            "codemeta" => Ok(ArtifactKind::Codemeta),
            "contributing" => Ok(ArtifactKind::Contributing),
            "code_of_conduct" => Ok(ArtifactKind::CodeOfConduct),
            "workflow" => Ok(ArtifactKind::Workflow),
            _ => Err(UnknownArtifact(s.to_string())),
        }
    }
}

/// Outcome of one presence check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: bool,
    /// Matched path, or the "not found" sentinel
    pub path: String,
    /// Raw text of the matched file; empty when absent
    pub content: String,
    /// Blob sha of the matched file
    #[serde(skip)]
    pub sha: Option<String>,
}

impl CheckResult {
    pub fn absent(kind: ArtifactKind) -> Self {
        Self {
            status: false,
            path: kind.not_found_path(),
            content: String::new(),
            sha: None,
        }
    }
}

/// Probe the candidate paths of `kind` in order and return the first match
pub async fn check_artifact(
    reader: &ContentReader<'_>,
    kind: ArtifactKind,
) -> Result<CheckResult, FairError> {
    for path in kind.candidates() {
        let lookup = reader.get_file(path).await?;
        if lookup.exists {
            return Ok(CheckResult {
                status: true,
                path: path.to_string(),
                content: lookup.content.unwrap_or_default(),
                sha: lookup.sha,
            });
        }
    }

    Ok(CheckResult::absent(kind))
}
