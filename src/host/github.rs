//! GitHub REST v3 client

use super::{
    Comment, Contributor, EntryKind, FileBlob, HostError, HostingApi, Issue, IssueUpdate,
    ItemState, NewPullRequest, PullRequest, PutFile, Release, RepoInfo, RepoRef, RetryPolicy,
    TreeEntry, UserProfile,
};
use crate::config::GitHubConfig;
use crate::logging::Logger;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;

/// Authenticated client for one installation
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
    retry: RetryPolicy,
    max_pages: usize,
    logger: Logger,
}

impl GitHubClient {
    /// Create a client from configuration; the token is an installation token
    pub fn new(config: &GitHubConfig) -> Result<Self, HostError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("fairgate/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                base_backoff_ms: config.base_backoff_ms,
                max_wait: Duration::from_secs(config.max_retry_wait_secs),
            },
            max_pages: config.max_pages.max(1),
            logger: Logger::new("github"),
        })
    }

    fn repo_url(&self, repo: &RepoRef, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_url,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            suffix
        )
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> String {
        self.repo_url(repo, &format!("/contents/{}", encode_path(path)))
    }

    /// One attempt, with status mapping
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, HostError> {
        let mut request = self.http.request(method, url);

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        check_response(response).await
    }

    /// Send with bounded retry
    ///
    /// POST creates something, so it is replayed only after a rate-limit refusal;
    /// a 5xx or transport failure may have created it already.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, HostError> {
        let operation = format!("{} {}", method, url);
        self.retry
            .run_if(&self.logger, &operation, retryable_for(&method), || {
                self.send_once(method.clone(), url, body)
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HostError> {
        let response = self.execute(Method::GET, url, None).await?;
        response.json().await.map_err(decode_error)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Result<T, HostError> {
        let response = self.execute(method, url, Some(body)).await?;
        response.json().await.map_err(decode_error)
    }

    /// Follow `Link: rel="next"` up to the configured page bound
    async fn get_paginated<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, HostError> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut pages = 0;

        while let Some(page_url) = next.take() {
            if pages >= self.max_pages {
                self.logger.warn(
                    "pagination limit reached; listing truncated",
                    Some(&json!({ "url": url, "pages": pages })),
                );
                break;
            }
            pages += 1;

            let response = self.execute(Method::GET, &page_url, None).await?;
            if response.status() == StatusCode::NO_CONTENT {
                break;
            }

            next = next_link(response.headers());
            let page: Vec<T> = response.json().await.map_err(decode_error)?;
            items.extend(page);
        }

        Ok(items)
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn get_repository(&self, repo: &RepoRef) -> Result<RepoInfo, HostError> {
        let data: RepoResponse = self.get_json(&self.repo_url(repo, "")).await?;
        Ok(data.into_info())
    }

    async fn get_file(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileBlob, HostError> {
        let mut url = self.contents_url(repo, path);
        if let Some(git_ref) = git_ref {
            url.push_str(&format!("?ref={}", urlencoding::encode(git_ref)));
        }

        match self.get_json::<ContentsResponse>(&url).await? {
            // A directory where a file was expected is not the file
            ContentsResponse::Listing(_) => Err(HostError::NotFound),
            ContentsResponse::Single(item) => {
                if item.kind != "file" {
                    return Err(HostError::NotFound);
                }
                let content = item.decode_content()?;
                Ok(FileBlob {
                    path: item.path,
                    sha: item.sha,
                    content,
                })
            }
        }
    }

    async fn list_dir(&self, repo: &RepoRef, path: &str) -> Result<Vec<TreeEntry>, HostError> {
        match self.get_json::<ContentsResponse>(&self.contents_url(repo, path)).await? {
            ContentsResponse::Listing(items) => Ok(items
                .into_iter()
                .map(|item| TreeEntry {
                    kind: if item.kind == "dir" {
                        EntryKind::Dir
                    } else {
                        EntryKind::File
                    },
                    name: item.name,
                    path: item.path,
                })
                .collect()),
            ContentsResponse::Single(_) => Err(HostError::Decode(format!(
                "{} is a file, not a directory",
                path
            ))),
        }
    }

    async fn list_languages(&self, repo: &RepoRef) -> Result<BTreeMap<String, u64>, HostError> {
        self.get_json(&self.repo_url(repo, "/languages")).await
    }

    async fn list_contributors(&self, repo: &RepoRef) -> Result<Vec<Contributor>, HostError> {
        let url = self.repo_url(repo, &format!("/contributors?per_page={}", PER_PAGE));
        let data: Vec<ContributorResponse> = self.get_paginated(&url).await?;

        Ok(data
            .into_iter()
            .filter(|c| !c.login.is_empty())
            .map(|c| Contributor {
                login: c.login,
                account_type: c.account_type,
            })
            .collect())
    }

    async fn get_user(&self, login: &str) -> Result<UserProfile, HostError> {
        let url = format!("{}/users/{}", self.api_url, urlencoding::encode(login));
        let data: UserResponse = self.get_json(&url).await?;

        Ok(UserProfile {
            login: data.login,
            name: non_empty(data.name),
            company: non_empty(data.company),
            email: non_empty(data.email),
        })
    }

    async fn latest_release(&self, repo: &RepoRef) -> Result<Option<Release>, HostError> {
        match self
            .get_json::<ReleaseResponse>(&self.repo_url(repo, "/releases/latest"))
            .await
        {
            Ok(data) => Ok(Some(Release {
                tag_name: data.tag_name,
                published_at: data.published_at,
            })),
            Err(HostError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_license_template(&self, spdx: &str) -> Result<String, HostError> {
        let url = format!(
            "{}/licenses/{}",
            self.api_url,
            urlencoding::encode(&spdx.to_lowercase())
        );
        let data: LicenseTemplateResponse = self.get_json(&url).await?;
        Ok(data.body)
    }

    async fn get_branch_head(&self, repo: &RepoRef, branch: &str) -> Result<String, HostError> {
        let url = self.repo_url(repo, &format!("/git/ref/heads/{}", encode_path(branch)));
        let data: RefResponse = self.get_json(&url).await?;
        Ok(data.object.sha)
    }

    async fn create_branch(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError> {
        let body = json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });
        self.execute(Method::POST, &self.repo_url(repo, "/git/refs"), Some(&body))
            .await?;
        Ok(())
    }

    async fn put_file(&self, repo: &RepoRef, file: &PutFile) -> Result<(), HostError> {
        let mut body = json!({
            "message": file.message,
            "content": BASE64.encode(file.content.as_bytes()),
            "branch": file.branch,
        });
        if let Some(ref sha) = file.sha {
            body["sha"] = json!(sha);
        }

        self.execute(Method::PUT, &self.contents_url(repo, &file.path), Some(&body))
            .await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        pr: &NewPullRequest,
    ) -> Result<PullRequest, HostError> {
        let body = serde_json::to_value(pr).map_err(|e| HostError::Decode(e.to_string()))?;
        let data: PullResponse = self
            .send_json(Method::POST, &self.repo_url(repo, "/pulls"), &body)
            .await?;
        Ok(data.into_pull())
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        state: ItemState,
    ) -> Result<Vec<PullRequest>, HostError> {
        let url = self.repo_url(
            repo,
            &format!("/pulls?state={}&per_page={}", state.as_str(), PER_PAGE),
        );
        let data: Vec<PullResponse> = self.get_paginated(&url).await?;
        Ok(data.into_iter().map(PullResponse::into_pull).collect())
    }

    async fn list_issues(&self, repo: &RepoRef, state: ItemState) -> Result<Vec<Issue>, HostError> {
        let url = self.repo_url(
            repo,
            &format!("/issues?state={}&per_page={}", state.as_str(), PER_PAGE),
        );
        let data: Vec<IssueResponse> = self.get_paginated(&url).await?;

        // The issues endpoint also returns pull requests
        Ok(data
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(IssueResponse::into_issue)
            .collect())
    }

    async fn create_issue(
        &self,
        repo: &RepoRef,
        title: &str,
        body: &str,
    ) -> Result<Issue, HostError> {
        let payload = json!({ "title": title, "body": body });
        let data: IssueResponse = self
            .send_json(Method::POST, &self.repo_url(repo, "/issues"), &payload)
            .await?;
        Ok(data.into_issue())
    }

    async fn update_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<Issue, HostError> {
        let payload = serde_json::to_value(update).map_err(|e| HostError::Decode(e.to_string()))?;
        let data: IssueResponse = self
            .send_json(
                Method::PATCH,
                &self.repo_url(repo, &format!("/issues/{}", number)),
                &payload,
            )
            .await?;
        Ok(data.into_issue())
    }

    async fn list_issue_comments(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<Comment>, HostError> {
        let url = self.repo_url(
            repo,
            &format!("/issues/{}/comments?per_page={}", number, PER_PAGE),
        );
        let data: Vec<CommentResponse> = self.get_paginated(&url).await?;
        Ok(data.into_iter().map(CommentResponse::into_comment).collect())
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<Comment, HostError> {
        let payload = json!({ "body": body });
        let data: CommentResponse = self
            .send_json(
                Method::POST,
                &self.repo_url(repo, &format!("/issues/{}/comments", number)),
                &payload,
            )
            .await?;
        Ok(data.into_comment())
    }
}

/// Map error statuses onto `HostError`
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, HostError> {
    let status = resp.status();

    if status == StatusCode::NOT_FOUND {
        return Err(HostError::NotFound);
    }

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && is_rate_limited(resp.headers()))
    {
        return Err(HostError::RateLimited {
            retry_after_secs: parse_retry_after(resp.headers(), Utc::now().timestamp()),
        });
    }

    if !status.is_success() {
        return Err(HostError::Api {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }

    Ok(resp)
}

/// Primary (`x-ratelimit-remaining: 0`) or secondary (`Retry-After`) limit
fn is_rate_limited(headers: &HeaderMap) -> bool {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    exhausted || headers.contains_key(RETRY_AFTER)
}

/// Seconds to wait: `Retry-After`, else the reset epoch, else 60
fn parse_retry_after(headers: &HeaderMap, now: i64) -> u64 {
    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return secs;
    }

    if let Some(reset) = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
    {
        return (reset - now).max(1) as u64;
    }

    60
}

/// Extract the `rel="next"` target of a Link header
/// Which failures of a `method` request may be replayed
fn retryable_for(method: &Method) -> fn(&HostError) -> bool {
    if *method == Method::POST {
        HostError::is_rejected
    } else {
        HostError::is_transient
    }
}

fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.contains("rel=\"next\"") {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

/// Percent-encode each path segment
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn decode_error(e: reqwest::Error) -> HostError {
    HostError::Decode(e.to_string())
}

// GitHub API response types

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct LicenseRef {
    spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    id: u64,
    name: String,
    owner: OwnerResponse,
    description: Option<String>,
    default_branch: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    license: Option<LicenseRef>,
    homepage: Option<String>,
    html_url: String,
    issues_url: String,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    archived: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl RepoResponse {
    fn into_info(self) -> RepoInfo {
        RepoInfo {
            id: self.id,
            owner: self.owner.login,
            name: self.name,
            description: non_empty(self.description),
            default_branch: self.default_branch.unwrap_or_else(|| "main".to_string()),
            topics: self.topics,
            license_spdx: non_empty(self.license.and_then(|l| l.spdx_id)),
            homepage: non_empty(self.homepage),
            html_url: self.html_url,
            issues_url: self.issues_url,
            private: self.private,
            archived: self.archived,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentItem>),
    Single(ContentItem),
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    content: Option<String>,
    encoding: Option<String>,
}

impl ContentItem {
    fn decode_content(&self) -> Result<Vec<u8>, HostError> {
        match (self.encoding.as_deref(), self.content.as_deref()) {
            (Some("base64"), Some(encoded)) => {
                let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64
                    .decode(cleaned)
                    .map_err(|e| HostError::Decode(format!("{}: {}", self.path, e)))
            }
            (_, Some("")) | (None, None) => Ok(Vec::new()),
            _ => Err(HostError::Decode(format!(
                "{}: content not inlined by the contents API",
                self.path
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContributorResponse {
    #[serde(default)]
    login: String,
    #[serde(rename = "type", default)]
    account_type: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
    name: Option<String>,
    company: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct LicenseTemplateResponse {
    body: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    #[serde(rename = "ref")]
    ref_name: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    html_url: String,
    state: String,
    head: PullHead,
}

impl PullResponse {
    fn into_pull(self) -> PullRequest {
        PullRequest {
            number: self.number,
            title: self.title,
            html_url: self.html_url,
            state: parse_state(&self.state),
            head: self.head.ref_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    user: Option<OwnerResponse>,
    html_url: String,
    pull_request: Option<Value>,
}

impl IssueResponse {
    fn into_issue(self) -> Issue {
        Issue {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state: parse_state(&self.state),
            author: self.user.map(|u| u.login).unwrap_or_default(),
            html_url: self.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    id: u64,
    body: Option<String>,
    user: Option<OwnerResponse>,
}

impl CommentResponse {
    fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            body: self.body.unwrap_or_default(),
            author: self.user.map(|u| u.login).unwrap_or_default(),
        }
    }
}

fn parse_state(state: &str) -> ItemState {
    if state.eq_ignore_ascii_case("open") {
        ItemState::Open
    } else {
        ItemState::Closed
    }
}
