//! Error taxonomy for the compliance engine
//!
//! Checkers and the synthesizer degrade instead of failing; the variants here are
//! what reaches callers when a determination or a remediation could not be made.

use crate::checks::ArtifactKind;
use crate::host::HostError;
use crate::remediate::RemediationStage;
use thiserror::Error;

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum FairError {
    /// The requested entity does not exist (expected, not a failure)
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The hosting API could not be reached or refused the request after retries
    #[error("could not {operation}: {source}")]
    TransientFetch {
        operation: String,
        #[source]
        source: HostError,
    },

    /// An equivalent action is already pending
    #[error("duplicate {action} already pending{}", .existing.as_ref().map(|e| format!(" ({e})")).unwrap_or_default())]
    DuplicateAction {
        action: String,
        existing: Option<String>,
    },

    /// A remediation state transition failed; earlier steps are not rolled back
    #[error("remediation of {artifact} failed at {stage}: {source}")]
    RemediationFailed {
        artifact: ArtifactKind,
        stage: RemediationStage,
        #[source]
        source: HostError,
    },

    /// The artifact type has no remediation workflow
    #[error("{0} cannot be remediated automatically")]
    NotRemediable(ArtifactKind),

    /// A document could not be serialized
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Storage and other internal failures
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FairError {
    /// Wrap a hosting error raised while reading repository state
    pub fn fetch(operation: impl Into<String>, source: HostError) -> Self {
        FairError::TransientFetch {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error only reports that something already exists or is pending
    pub fn is_duplicate(&self) -> bool {
        matches!(self, FairError::DuplicateAction { .. })
    }
}

/// A synthesis field that could not be resolved; recorded, never fatal
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PartialMetadataWarning {
    /// Field or signal that degraded to an empty value
    pub field: String,
    /// Why it could not be resolved
    pub reason: String,
}

impl PartialMetadataWarning {
    pub fn new(field: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for PartialMetadataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_includes_existing() {
        let err = FairError::DuplicateAction {
            action: "pull request".to_string(),
            existing: Some("https://github.com/o/r/pull/3".to_string()),
        };
        assert!(err.is_duplicate());
        assert_eq!(
            err.to_string(),
            "duplicate pull request already pending (https://github.com/o/r/pull/3)"
        );
    }

    #[test]
    fn test_remediation_failed_names_stage() {
        let err = FairError::RemediationFailed {
            artifact: ArtifactKind::Citation,
            stage: RemediationStage::BranchCreated,
            source: HostError::Api {
                status: 422,
                message: "Reference already exists".to_string(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("citation"));
        assert!(text.contains("branch"));
    }
}
