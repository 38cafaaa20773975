//! Hosting platform API
//!
//! This module defines:
//! - the `HostingApi` trait naming every hosting operation the engine consumes
//! - explicit request/response types for those operations
//! - `GitHubClient`, the REST implementation with bounded retry
//! - `MockHost`, an in-memory implementation with call accounting

mod github;
mod mock;
mod retry;

pub use github::GitHubClient;
pub use mock::MockHost;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned by hosting API calls
#[derive(Debug, Error)]
pub enum HostError {
    /// The resource does not exist (HTTP 404, or an empty repository)
    #[error("not found")]
    NotFound,

    /// The installation exhausted its rate limit
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The API rejected the request
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response did not have the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}

impl HostError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            HostError::RateLimited { .. } | HostError::Http(_) => true,
            HostError::Api { status, .. } => *status >= 500,
            HostError::NotFound | HostError::Decode(_) => false,
        }
    }

    /// Whether the server refused the request before acting on it
    ///
    /// Only these failures are safe to replay for requests that create something.
    pub fn is_rejected(&self) -> bool {
        matches!(self, HostError::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound)
    }
}

/// Repository identity on the hosting platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    /// Parse `owner/name`
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Cached view of a hosted repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Hosting platform id
    pub id: u64,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub default_branch: String,
    pub topics: Vec<String>,
    /// SPDX identifier detected by the platform
    pub license_spdx: Option<String>,
    pub homepage: Option<String>,
    pub html_url: String,
    /// Issues URL template, e.g. `.../issues{/number}`
    pub issues_url: String,
    pub private: bool,
    pub archived: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RepoInfo {
    /// Minimal repository description, used by tests and dry runs
    pub fn new(owner: &str, name: &str) -> Self {
        let html_url = format!("https://github.com/{}/{}", owner, name);
        Self {
            id: 0,
            owner: owner.to_string(),
            name: name.to_string(),
            description: None,
            default_branch: "main".to_string(),
            topics: Vec::new(),
            license_spdx: None,
            homepage: None,
            issues_url: format!("https://api.github.com/repos/{}/{}/issues{{/number}}", owner, name),
            html_url,
            private: false,
            archived: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner, &self.name)
    }
}

/// A file read from the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub path: String,
    /// Blob sha, required to overwrite the file
    pub sha: String,
    pub content: Vec<u8>,
}

impl FileBlob {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

/// A repository contributor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub login: String,
    /// Account type reported by the platform (`User`, `Bot`, ...)
    pub account_type: String,
}

impl Contributor {
    pub fn is_bot(&self) -> bool {
        self.account_type.eq_ignore_ascii_case("bot") || self.login.ends_with("[bot]")
    }
}

/// Public user profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
}

/// A published release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Open/closed filter and state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Open,
    Closed,
    All,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Open => "open",
            ItemState::Closed => "closed",
            ItemState::All => "all",
        }
    }

    /// Whether an item in `state` passes this filter
    pub fn admits(&self, state: ItemState) -> bool {
        *self == ItemState::All || *self == state
    }
}

/// A pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: ItemState,
    /// Source branch
    pub head: String,
}

/// Parameters for opening a pull request
#[derive(Debug, Clone, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// An issue (pull requests excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: ItemState,
    /// Login of the account that opened the issue
    pub author: String,
    pub html_url: String,
}

/// Partial issue update
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ItemState>,
}

/// An issue comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub author: String,
}

/// Create-or-update of a single file on a branch
#[derive(Debug, Clone)]
pub struct PutFile {
    pub path: String,
    pub branch: String,
    pub message: String,
    pub content: String,
    /// Sha of the blob being replaced; required when the file exists
    pub sha: Option<String>,
}

/// Operations consumed from the hosting platform
#[async_trait]
pub trait HostingApi: Send + Sync {
    async fn get_repository(&self, repo: &RepoRef) -> Result<RepoInfo, HostError>;

    /// Read a file, optionally at a branch or commit
    async fn get_file(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileBlob, HostError>;

    /// List one directory of the default branch (`""` is the root)
    async fn list_dir(&self, repo: &RepoRef, path: &str) -> Result<Vec<TreeEntry>, HostError>;

    /// Bytes of code per language
    async fn list_languages(&self, repo: &RepoRef) -> Result<BTreeMap<String, u64>, HostError>;

    async fn list_contributors(&self, repo: &RepoRef) -> Result<Vec<Contributor>, HostError>;

    async fn get_user(&self, login: &str) -> Result<UserProfile, HostError>;

    /// Latest published release, if any
    async fn latest_release(&self, repo: &RepoRef) -> Result<Option<Release>, HostError>;

    /// License text template for an SPDX identifier
    async fn get_license_template(&self, spdx: &str) -> Result<String, HostError>;

    /// Commit sha at the head of `branch`
    async fn get_branch_head(&self, repo: &RepoRef, branch: &str) -> Result<String, HostError>;

    async fn create_branch(&self, repo: &RepoRef, branch: &str, sha: &str)
        -> Result<(), HostError>;

    async fn put_file(&self, repo: &RepoRef, file: &PutFile) -> Result<(), HostError>;

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        pr: &NewPullRequest,
    ) -> Result<PullRequest, HostError>;

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        state: ItemState,
    ) -> Result<Vec<PullRequest>, HostError>;

    async fn list_issues(&self, repo: &RepoRef, state: ItemState) -> Result<Vec<Issue>, HostError>;

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str)
        -> Result<Issue, HostError>;

    async fn update_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<Issue, HostError>;

    async fn list_issue_comments(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<Comment>, HostError>;

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<Comment, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ref_parse() {
        let repo = RepoRef::parse("fair-software/howfairis").unwrap();
        assert_eq!(repo.owner, "fair-software");
        assert_eq!(repo.name, "howfairis");
        assert_eq!(repo.to_string(), "fair-software/howfairis");

        assert!(RepoRef::parse("no-slash").is_none());
        assert!(RepoRef::parse("/name").is_none());
        assert!(RepoRef::parse("a/b/c").is_none());
    }

    #[test]
    fn test_transient_classification() {
        assert!(HostError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(HostError::Api {
            status: 502,
            message: String::new()
        }
        .is_transient());
        assert!(!HostError::Api {
            status: 422,
            message: String::new()
        }
        .is_transient());
        assert!(!HostError::NotFound.is_transient());
    }

    #[test]
    fn test_bot_contributor() {
        let bot = Contributor {
            login: "dependabot[bot]".to_string(),
            account_type: "User".to_string(),
        };
        let typed_bot = Contributor {
            login: "renovate".to_string(),
            account_type: "Bot".to_string(),
        };
        let human = Contributor {
            login: "octocat".to_string(),
            account_type: "User".to_string(),
        };
        assert!(bot.is_bot());
        assert!(typed_bot.is_bot());
        assert!(!human.is_bot());
    }
}
