//! Remediation workflow driver
//!
//! A remediation proposes content for one artifact through a pull request:
//!
//! ```text
//! Requested -> BranchCreated -> ContentCommitted -> PullRequestOpened -> Recorded
//! ```
//!
//! A failed transition aborts the remediation with `RemediationFailed`. Nothing is
//! rolled back, and the validation store is only written in the final step.

pub mod dashboard;
mod drafts;

pub use dashboard::{
    marker, parse_markers, strip_marker, Dashboard, DashboardUpdate, MarkerAction,
    DASHBOARD_TITLE,
};
pub use drafts::{draft_content, fill_license, DraftContext};

use crate::checks::{check_artifact, ArtifactKind};
use crate::config::BotConfig;
use crate::content::ContentReader;
use crate::error::FairError;
use crate::host::{HostError, HostingApi, ItemState, NewPullRequest, PutFile, RepoInfo};
use crate::logging::Logger;
use crate::storage::{Database, PullRequestLink, RecordUpdate};
use crate::synth::assess;
use serde::Serialize;
use serde_json::json;
use similar::TextDiff;
use std::fmt;

/// States of a remediation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemediationStage {
    Requested,
    BranchCreated,
    ContentCommitted,
    PullRequestOpened,
    Recorded,
}

impl fmt::Display for RemediationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RemediationStage::Requested => "request checks",
            RemediationStage::BranchCreated => "branch creation",
            RemediationStage::ContentCommitted => "content commit",
            RemediationStage::PullRequestOpened => "pull request creation",
            RemediationStage::Recorded => "recording",
        };
        f.write_str(text)
    }
}

/// Proposed content for one artifact
#[derive(Debug, Clone)]
pub struct RemediationRequest {
    pub artifact: ArtifactKind,
    pub content: String,
}

/// Result of a remediation that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemediationOutcome {
    Opened {
        number: u64,
        url: String,
        branch: String,
    },
    /// The default branch already holds the proposed content
    Unchanged { path: String },
}

/// Drives remediations against the hosting API and records them
pub struct WorkflowDriver<'a> {
    host: &'a dyn HostingApi,
    db: &'a Database,
    bot: &'a BotConfig,
    logger: Logger,
}

impl<'a> WorkflowDriver<'a> {
    pub fn new(host: &'a dyn HostingApi, db: &'a Database, bot: &'a BotConfig) -> Self {
        Self {
            host,
            db,
            bot,
            logger: Logger::new("remediate"),
        }
    }

    /// Deterministic pull request title for an artifact
    pub fn pull_request_title(&self, artifact: ArtifactKind) -> String {
        format!("{}: propose {}", self.bot.name, artifact.title())
    }

    /// Run the remediation state machine for `request`
    pub async fn remediate(
        &self,
        info: &RepoInfo,
        request: RemediationRequest,
    ) -> Result<RemediationOutcome, FairError> {
        let artifact = request.artifact;
        let Some(default_target) = artifact.target_path() else {
            return Err(FairError::NotRemediable(artifact));
        };
        let repo = info.repo_ref();
        let failed = move |stage: RemediationStage| {
            move |source: HostError| FairError::RemediationFailed {
                artifact,
                stage,
                source,
            }
        };

        // Requested: an existing file is updated where it lives
        let reader = ContentReader::new(self.host, &repo);
        let current = check_artifact(&reader, artifact).await?;
        let target = if current.status {
            current.path.clone()
        } else {
            default_target.to_string()
        };
        let title = self.pull_request_title(artifact);

        let open = self
            .host
            .list_pull_requests(&repo, ItemState::Open)
            .await
            .map_err(failed(RemediationStage::Requested))?;
        let branch_prefix = format!("{}-", artifact.branch_prefix());
        if let Some(existing) = open
            .into_iter()
            .find(|pr| pr.title == title || pr.head.starts_with(&branch_prefix))
        {
            return Err(FairError::DuplicateAction {
                action: title,
                existing: Some(existing.html_url),
            });
        }

        if current.status && current.content == request.content {
            self.logger.info(
                "proposed content already on default branch",
                Some(&json!({ "repository": repo.full_name(), "path": target })),
            );
            return Ok(RemediationOutcome::Unchanged { path: target });
        }

        // BranchCreated
        let head = self
            .host
            .get_branch_head(&repo, &info.default_branch)
            .await
            .map_err(failed(RemediationStage::BranchCreated))?;
        let branch = branch_name(artifact);
        self.host
            .create_branch(&repo, &branch, &head)
            .await
            .map_err(failed(RemediationStage::BranchCreated))?;

        // ContentCommitted
        let sha = match self.host.get_file(&repo, &target, Some(&branch)).await {
            Ok(blob) => Some(blob.sha),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(failed(RemediationStage::ContentCommitted)(e)),
        };
        let verb = if sha.is_some() { "update" } else { "add" };
        let put = PutFile {
            path: target.clone(),
            branch: branch.clone(),
            message: format!("{}: {} {}", self.bot.name, verb, target),
            content: request.content.clone(),
            sha,
        };
        self.host
            .put_file(&repo, &put)
            .await
            .map_err(failed(RemediationStage::ContentCommitted))?;

        // PullRequestOpened
        let dashboard = Dashboard::new(self.host, self.bot);
        let tracking = match dashboard.find(&repo).await {
            Ok(issue) => issue,
            Err(FairError::TransientFetch { source, .. }) => {
                return Err(failed(RemediationStage::PullRequestOpened)(source))
            }
            Err(other) => return Err(other),
        };

        let previous = current.status.then_some(current.content.as_str());
        let body = pull_request_body(
            &self.bot.name,
            &target,
            previous,
            &request.content,
            tracking.as_ref().map(|issue| issue.number),
        );
        let pr = self
            .host
            .create_pull_request(
                &repo,
                &NewPullRequest {
                    title,
                    head: branch.clone(),
                    base: info.default_branch.clone(),
                    body,
                },
            )
            .await
            .map_err(failed(RemediationStage::PullRequestOpened))?;

        self.logger.info(
            "opened remediation pull request",
            Some(&json!({
                "repository": repo.full_name(),
                "artifact": artifact.key(),
                "url": pr.html_url,
            })),
        );

        // Recorded
        if let Some(issue) = tracking {
            let comment = format!(
                "Opened a pull request proposing `{}` ({}): {}",
                target,
                artifact.title(),
                pr.html_url
            );
            match dashboard
                .comment_once(&repo, issue.number, &comment, &pr.html_url)
                .await
            {
                Ok(_) => {}
                Err(FairError::TransientFetch { source, .. }) => {
                    return Err(failed(RemediationStage::Recorded)(source))
                }
                Err(other) => return Err(other),
            }
        }

        self.db.upsert_record(
            &repo,
            artifact,
            RecordUpdate {
                present: current.status,
                quality: Some(assess(artifact, &request.content)),
                content: request.content,
                path: current.path,
                pull_request_url: PullRequestLink::Set(pr.html_url.clone()),
            },
        )?;

        Ok(RemediationOutcome::Opened {
            number: pr.number,
            url: pr.html_url,
            branch,
        })
    }
}

/// `<artifact-prefix>-<8 hex chars>`
fn branch_name(artifact: ArtifactKind) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", artifact.branch_prefix(), &suffix[..8])
}

fn pull_request_body(
    bot: &str,
    path: &str,
    previous: Option<&str>,
    proposed: &str,
    tracking_issue: Option<u64>,
) -> String {
    let mut body = match previous {
        Some(_) => format!(
            "This pull request updates `{}` so the repository meets FAIR software recommendations.\n",
            path
        ),
        None => format!(
            "This pull request adds `{}` so the repository meets FAIR software recommendations.\n",
            path
        ),
    };

    body.push_str(&format!(
        "\nReview the content before merging; it was generated by {} from repository metadata.\n",
        bot
    ));

    if let Some(number) = tracking_issue {
        body.push_str(&format!("\nRelated to #{}\n", number));
    }

    if let Some(previous) = previous {
        let diff = TextDiff::from_lines(previous, proposed)
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", path), &format!("b/{}", path))
            .to_string();
        body.push_str("\n<details><summary>Changes</summary>\n\n```diff\n");
        body.push_str(&diff);
        body.push_str("```\n\n</details>\n");
    }

    body
}
