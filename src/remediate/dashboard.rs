//! Tracking-issue maintainer
//!
//! Each repository gets one issue titled `FAIR Compliance Dashboard`, opened by the
//! bot account. Its body is the rendered compliance report followed by hidden
//! markers (`<!-- @<bot>-bot <action> -->`) that queue asynchronous actions. A
//! marker is pending at most once; re-requesting it is a `DuplicateAction`.

use crate::config::BotConfig;
use crate::error::FairError;
use crate::host::{HostingApi, Issue, IssueUpdate, ItemState, RepoRef};
use crate::logging::Logger;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

pub const DASHBOARD_TITLE: &str = "FAIR Compliance Dashboard";

/// Actions that can be queued through the tracking issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerAction {
    ReRenderDashboard,
    RerunFullRepoValidation,
    RerunWorkflowValidation,
    RerunMetadataValidation,
}

impl MarkerAction {
    pub const ALL: [MarkerAction; 4] = [
        MarkerAction::ReRenderDashboard,
        MarkerAction::RerunFullRepoValidation,
        MarkerAction::RerunWorkflowValidation,
        MarkerAction::RerunMetadataValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerAction::ReRenderDashboard => "re-render-dashboard",
            MarkerAction::RerunFullRepoValidation => "rerun-full-repo-validation",
            MarkerAction::RerunWorkflowValidation => "rerun-workflow-validation",
            MarkerAction::RerunMetadataValidation => "rerun-metadata-validation",
        }
    }
}

impl fmt::Display for MarkerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkerAction {
    type Err = FairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarkerAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s.trim())
            .ok_or_else(|| FairError::NotFound {
                what: format!("dashboard action '{}'", s.trim()),
            })
    }
}

/// The hidden marker for `action`
pub fn marker(bot: &BotConfig, action: MarkerAction) -> String {
    format!("<!-- {} {} -->", bot.marker_tag(), action.as_str())
}

/// Pending actions found in an issue body, in order of first appearance
pub fn parse_markers(bot: &BotConfig, body: &str) -> Vec<MarkerAction> {
    let prefix = format!("<!-- {} ", bot.marker_tag());
    let mut actions = Vec::new();

    let mut rest = body;
    while let Some(start) = rest.find(&prefix) {
        let after = &rest[start + prefix.len()..];
        let Some(end) = after.find("-->") else {
            break;
        };

        if let Ok(action) = after[..end].parse::<MarkerAction>() {
            if !actions.contains(&action) {
                actions.push(action);
            }
        }
        rest = &after[end + 3..];
    }

    actions
}

/// Remove every occurrence of the marker for `action`
pub fn strip_marker(bot: &BotConfig, body: &str, action: MarkerAction) -> String {
    let marker = marker(bot, action);
    body.lines()
        .filter(|line| line.trim() != marker)
        .collect::<Vec<_>>()
        .join("\n")
        .replace(&marker, "")
}

/// What `ensure_issue` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardUpdate {
    Created(Issue),
    Reopened(Issue),
    Updated(Issue),
    Unchanged(Issue),
}

impl DashboardUpdate {
    pub fn issue(&self) -> &Issue {
        match self {
            DashboardUpdate::Created(issue)
            | DashboardUpdate::Reopened(issue)
            | DashboardUpdate::Updated(issue)
            | DashboardUpdate::Unchanged(issue) => issue,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DashboardUpdate::Created(_) => "created",
            DashboardUpdate::Reopened(_) => "reopened",
            DashboardUpdate::Updated(_) => "updated",
            DashboardUpdate::Unchanged(_) => "unchanged",
        }
    }
}

/// Maintains the tracking issue of a repository
pub struct Dashboard<'a> {
    host: &'a dyn HostingApi,
    bot: &'a BotConfig,
    logger: Logger,
}

impl<'a> Dashboard<'a> {
    pub fn new(host: &'a dyn HostingApi, bot: &'a BotConfig) -> Self {
        Self {
            host,
            bot,
            logger: Logger::new("dashboard"),
        }
    }

    /// The tracking issue, open or closed, if the bot has opened one
    pub async fn find(&self, repo: &RepoRef) -> Result<Option<Issue>, FairError> {
        let issues = self
            .host
            .list_issues(repo, ItemState::All)
            .await
            .map_err(|e| FairError::fetch("list issues", e))?;

        let login = self.bot.login();
        Ok(issues
            .into_iter()
            .find(|issue| issue.title == DASHBOARD_TITLE && issue.author == login))
    }

    /// Pending actions on the tracking issue
    pub async fn pending(&self, repo: &RepoRef) -> Result<Vec<MarkerAction>, FairError> {
        Ok(self
            .find(repo)
            .await?
            .map(|issue| parse_markers(self.bot, &issue.body))
            .unwrap_or_default())
    }

    /// Create, reopen or refresh the tracking issue with a freshly rendered report.
    /// Markers already on the issue survive unless listed in `consumed`.
    pub async fn ensure_issue(
        &self,
        repo: &RepoRef,
        rendered: &str,
        compliant: bool,
        consumed: &[MarkerAction],
    ) -> Result<DashboardUpdate, FairError> {
        let Some(issue) = self.find(repo).await? else {
            let issue = self
                .host
                .create_issue(repo, DASHBOARD_TITLE, rendered)
                .await
                .map_err(|e| FairError::fetch("create tracking issue", e))?;

            self.logger.info(
                "opened tracking issue",
                Some(&json!({ "repository": repo.full_name(), "issue": issue.number })),
            );
            return Ok(DashboardUpdate::Created(issue));
        };

        let mut body = rendered.trim_end().to_string();
        for action in parse_markers(self.bot, &issue.body) {
            if !consumed.contains(&action) {
                body.push('\n');
                body.push_str(&marker(self.bot, action));
            }
        }
        body.push('\n');

        let reopen = issue.state == ItemState::Closed && !compliant;
        let body_changed = body != issue.body;

        if !reopen && !body_changed {
            return Ok(DashboardUpdate::Unchanged(issue));
        }

        let update = IssueUpdate {
            body: body_changed.then_some(body),
            state: reopen.then_some(ItemState::Open),
        };

        let updated = self
            .host
            .update_issue(repo, issue.number, &update)
            .await
            .map_err(|e| FairError::fetch("update tracking issue", e))?;

        if reopen {
            self.logger.info(
                "reopened tracking issue",
                Some(&json!({ "repository": repo.full_name(), "issue": updated.number })),
            );
            Ok(DashboardUpdate::Reopened(updated))
        } else {
            Ok(DashboardUpdate::Updated(updated))
        }
    }

    /// Queue `action` by appending its marker to the tracking issue
    pub async fn request(&self, repo: &RepoRef, action: MarkerAction) -> Result<Issue, FairError> {
        let issue = self.find(repo).await?.ok_or_else(|| FairError::NotFound {
            what: format!("tracking issue for {}", repo),
        })?;

        if parse_markers(self.bot, &issue.body).contains(&action) {
            return Err(FairError::DuplicateAction {
                action: action.to_string(),
                existing: Some(issue.html_url),
            });
        }

        let mut body = issue.body.trim_end().to_string();
        body.push('\n');
        body.push_str(&marker(self.bot, action));
        body.push('\n');

        let update = IssueUpdate {
            body: Some(body),
            state: None,
        };

        let updated = self
            .host
            .update_issue(repo, issue.number, &update)
            .await
            .map_err(|e| FairError::fetch("update tracking issue", e))?;

        self.logger.info(
            "queued dashboard action",
            Some(&json!({ "repository": repo.full_name(), "action": action.as_str() })),
        );
        Ok(updated)
    }

    /// Remove a consumed marker from the tracking issue
    pub async fn consume(&self, repo: &RepoRef, action: MarkerAction) -> Result<bool, FairError> {
        let Some(issue) = self.find(repo).await? else {
            return Ok(false);
        };
        if !parse_markers(self.bot, &issue.body).contains(&action) {
            return Ok(false);
        }

        let update = IssueUpdate {
            body: Some(strip_marker(self.bot, &issue.body, action)),
            state: None,
        };
        self.host
            .update_issue(repo, issue.number, &update)
            .await
            .map_err(|e| FairError::fetch("update tracking issue", e))?;
        Ok(true)
    }

    /// Comment on the tracking issue unless an identical comment already exists
    pub async fn comment_once(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
        dedup_key: &str,
    ) -> Result<bool, FairError> {
        let comments = self
            .host
            .list_issue_comments(repo, number)
            .await
            .map_err(|e| FairError::fetch("list issue comments", e))?;

        if comments.iter().any(|c| c.body.contains(dedup_key)) {
            return Ok(false);
        }

        self.host
            .create_issue_comment(repo, number, body)
            .await
            .map_err(|e| FairError::fetch("comment on tracking issue", e))?;
        Ok(true)
    }
}
