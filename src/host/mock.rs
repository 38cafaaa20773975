//! In-memory hosting platform for tests and dry runs
//!
//! Holds a single repository with branches of files, issues, pull requests and
//! comments. Every call is recorded so tests can assert on probe order and counts,
//! and failures can be scripted per operation.

use super::{
    Comment, Contributor, EntryKind, FileBlob, HostError, HostingApi, Issue, IssueUpdate,
    ItemState, NewPullRequest, PullRequest, PutFile, Release, RepoInfo, RepoRef, TreeEntry,
    UserProfile,
};
use crate::storage::content_hash;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Branch {
    head: String,
    files: BTreeMap<String, String>,
}

#[derive(Debug)]
struct MockState {
    repo: RepoInfo,
    branches: BTreeMap<String, Branch>,
    languages: BTreeMap<String, u64>,
    contributors: Vec<Contributor>,
    users: HashMap<String, UserProfile>,
    release: Option<Release>,
    licenses: HashMap<String, String>,
    pulls: Vec<PullRequest>,
    issues: Vec<Issue>,
    comments: HashMap<u64, Vec<Comment>>,
    next_number: u64,
    next_comment_id: u64,
    commits: u64,
    calls: Vec<(String, String)>,
    failures: HashMap<String, VecDeque<HostError>>,
}

/// In-memory `HostingApi` implementation
pub struct MockHost {
    login: String,
    state: Mutex<MockState>,
}

impl MockHost {
    /// Create a host holding `repo` with an empty default branch
    pub fn new(repo: RepoInfo) -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(
            repo.default_branch.clone(),
            Branch {
                head: "commit-0".to_string(),
                files: BTreeMap::new(),
            },
        );

        Self {
            login: "fairgate[bot]".to_string(),
            state: Mutex::new(MockState {
                repo,
                branches,
                languages: BTreeMap::new(),
                contributors: Vec::new(),
                users: HashMap::new(),
                release: None,
                licenses: HashMap::new(),
                pulls: Vec::new(),
                issues: Vec::new(),
                comments: HashMap::new(),
                next_number: 1,
                next_comment_id: 1,
                commits: 0,
                calls: Vec::new(),
                failures: HashMap::new(),
            }),
        }
    }

    /// Login the mock authenticates as (author of created issues and comments)
    pub fn with_login(mut self, login: &str) -> Self {
        self.login = login.to_string();
        self
    }

    /// Add a file to the default branch
    pub fn with_file(self, path: &str, content: &str) -> Self {
        {
            let mut state = self.lock();
            let branch = state.repo.default_branch.clone();
            if let Some(b) = state.branches.get_mut(&branch) {
                b.files.insert(path.to_string(), content.to_string());
            }
        }
        self
    }

    /// Add a contributor, optionally with a public profile
    pub fn with_contributor(self, login: &str, account_type: &str, profile: Option<UserProfile>) -> Self {
        {
            let mut state = self.lock();
            state.contributors.push(Contributor {
                login: login.to_string(),
                account_type: account_type.to_string(),
            });
            if let Some(profile) = profile {
                state.users.insert(login.to_string(), profile);
            }
        }
        self
    }

    pub fn with_language(self, language: &str, bytes: u64) -> Self {
        self.lock().languages.insert(language.to_string(), bytes);
        self
    }

    pub fn with_release(self, release: Release) -> Self {
        self.lock().release = Some(release);
        self
    }

    pub fn with_license_template(self, spdx: &str, body: &str) -> Self {
        self.lock()
            .licenses
            .insert(spdx.to_lowercase(), body.to_string());
        self
    }

    /// Seed an existing issue (e.g. one opened by a human)
    pub fn with_issue(self, title: &str, body: &str, author: &str, state: ItemState) -> Self {
        {
            let mut s = self.lock();
            let number = s.next_number;
            s.next_number += 1;
            let html_url = format!("{}/issues/{}", s.repo.html_url, number);
            s.issues.push(Issue {
                number,
                title: title.to_string(),
                body: body.to_string(),
                state,
                author: author.to_string(),
                html_url,
            });
        }
        self
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: &str, error: HostError) {
        self.lock()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    /// Details (usually paths) of every recorded call of `operation`, in order
    pub fn calls(&self, operation: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(op, _)| op == operation)
            .map(|(_, detail)| detail.clone())
            .collect()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls(operation).len()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.lock().pulls.clone()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.lock().issues.clone()
    }

    pub fn comments(&self, number: u64) -> Vec<Comment> {
        self.lock().comments.get(&number).cloned().unwrap_or_default()
    }

    pub fn branch_names(&self) -> Vec<String> {
        self.lock().branches.keys().cloned().collect()
    }

    /// Content of `path` on `branch`
    pub fn file_on(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .branches
            .get(branch)
            .and_then(|b| b.files.get(path).cloned())
    }

    /// Close an issue as a maintainer would
    pub fn close_issue(&self, number: u64) {
        if let Some(issue) = self.lock().issues.iter_mut().find(|i| i.number == number) {
            issue.state = ItemState::Closed;
        }
    }

    /// Commit a file to the default branch as a maintainer would
    pub fn commit_file(&self, path: &str, content: &str) {
        let mut state = self.lock();
        state.commits += 1;
        let commit = format!("commit-{}", state.commits);
        let default_branch = state.repo.default_branch.clone();
        if let Some(branch) = state.branches.get_mut(&default_branch) {
            branch.files.insert(path.to_string(), content.to_string());
            branch.head = commit;
        }
    }

    /// Rename a pull request as a maintainer would
    pub fn retitle_pull_request(&self, number: u64, title: &str) {
        if let Some(pull) = self.lock().pulls.iter_mut().find(|p| p.number == number) {
            pull.title = title.to_string();
        }
    }

    /// Close a pull request without merging it
    pub fn close_pull_request(&self, number: u64) {
        if let Some(pull) = self.lock().pulls.iter_mut().find(|p| p.number == number) {
            pull.state = ItemState::Closed;
        }
    }

    /// Merge a pull request: copy the head branch onto the default branch and close it
    pub fn merge_pull_request(&self, number: u64) {
        let mut state = self.lock();
        let Some(index) = state.pulls.iter().position(|p| p.number == number) else {
            return;
        };
        state.pulls[index].state = ItemState::Closed;

        let head = state.pulls[index].head.clone();
        let default_branch = state.repo.default_branch.clone();
        if let Some(files) = state.branches.get(&head).map(|b| b.files.clone()) {
            state.commits += 1;
            let commit = format!("commit-{}", state.commits);
            if let Some(target) = state.branches.get_mut(&default_branch) {
                target.files = files;
                target.head = commit;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test must not poison the other assertions
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and pop a scripted failure, if any
    fn enter(&self, operation: &str, detail: &str) -> Result<MutexGuard<'_, MockState>, HostError> {
        let mut state = self.lock();
        state
            .calls
            .push((operation.to_string(), detail.to_string()));

        if let Some(error) = state
            .failures
            .get_mut(operation)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        Ok(state)
    }
}

impl MockState {
    fn check_repo(&self, repo: &RepoRef) -> Result<(), HostError> {
        if repo.owner == self.repo.owner && repo.name == self.repo.name {
            Ok(())
        } else {
            Err(HostError::NotFound)
        }
    }

    fn branch(&self, name: &str) -> Result<&Branch, HostError> {
        self.branches.get(name).ok_or(HostError::NotFound)
    }

    fn default_branch(&self) -> Result<&Branch, HostError> {
        self.branch(&self.repo.default_branch)
    }

    fn take_number(&mut self) -> u64 {
        let number = self.next_number;
        self.next_number += 1;
        number
    }
}

#[async_trait]
impl HostingApi for MockHost {
    async fn get_repository(&self, repo: &RepoRef) -> Result<RepoInfo, HostError> {
        let state = self.enter("get_repository", &repo.full_name())?;
        state.check_repo(repo)?;
        Ok(state.repo.clone())
    }

    async fn get_file(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileBlob, HostError> {
        let state = self.enter("get_file", path)?;
        state.check_repo(repo)?;

        let branch = match git_ref {
            Some(name) => state.branch(name)?,
            None => state.default_branch()?,
        };
        let content = branch.files.get(path).ok_or(HostError::NotFound)?;

        Ok(FileBlob {
            path: path.to_string(),
            sha: content_hash(content),
            content: content.as_bytes().to_vec(),
        })
    }

    async fn list_dir(&self, repo: &RepoRef, path: &str) -> Result<Vec<TreeEntry>, HostError> {
        let state = self.enter("list_dir", path)?;
        state.check_repo(repo)?;

        let dir = path.trim_matches('/');
        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();

        for file in state.default_branch()?.files.keys() {
            let rest = if dir.is_empty() {
                file.as_str()
            } else {
                match file.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };

            match rest.split_once('/') {
                Some((name, _)) => {
                    children.insert(name.to_string(), EntryKind::Dir);
                }
                None => {
                    children.entry(rest.to_string()).or_insert(EntryKind::File);
                }
            }
        }

        // Empty repositories and missing directories both answer 404
        if children.is_empty() {
            return Err(HostError::NotFound);
        }

        Ok(children
            .into_iter()
            .map(|(name, kind)| TreeEntry {
                path: if dir.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", dir, name)
                },
                name,
                kind,
            })
            .collect())
    }

    async fn list_languages(&self, repo: &RepoRef) -> Result<BTreeMap<String, u64>, HostError> {
        let state = self.enter("list_languages", &repo.full_name())?;
        state.check_repo(repo)?;
        Ok(state.languages.clone())
    }

    async fn list_contributors(&self, repo: &RepoRef) -> Result<Vec<Contributor>, HostError> {
        let state = self.enter("list_contributors", &repo.full_name())?;
        state.check_repo(repo)?;
        Ok(state.contributors.clone())
    }

    async fn get_user(&self, login: &str) -> Result<UserProfile, HostError> {
        let state = self.enter("get_user", login)?;
        state.users.get(login).cloned().ok_or(HostError::NotFound)
    }

    async fn latest_release(&self, repo: &RepoRef) -> Result<Option<Release>, HostError> {
        let state = self.enter("latest_release", &repo.full_name())?;
        state.check_repo(repo)?;
        Ok(state.release.clone())
    }

    async fn get_license_template(&self, spdx: &str) -> Result<String, HostError> {
        let state = self.enter("get_license_template", spdx)?;
        state
            .licenses
            .get(&spdx.to_lowercase())
            .cloned()
            .ok_or(HostError::NotFound)
    }

    async fn get_branch_head(&self, repo: &RepoRef, branch: &str) -> Result<String, HostError> {
        let state = self.enter("get_branch_head", branch)?;
        state.check_repo(repo)?;
        Ok(state.branch(branch)?.head.clone())
    }

    async fn create_branch(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError> {
        let mut state = self.enter("create_branch", branch)?;
        state.check_repo(repo)?;

        if state.branches.contains_key(branch) {
            return Err(HostError::Api {
                status: 422,
                message: "Reference already exists".to_string(),
            });
        }

        let source = state
            .branches
            .values()
            .find(|b| b.head == sha)
            .cloned()
            .ok_or_else(|| HostError::Api {
                status: 422,
                message: "Object does not exist".to_string(),
            })?;

        state.branches.insert(branch.to_string(), source);
        Ok(())
    }

    async fn put_file(&self, repo: &RepoRef, file: &PutFile) -> Result<(), HostError> {
        let mut state = self.enter("put_file", &file.path)?;
        state.check_repo(repo)?;

        state.commits += 1;
        let commit = format!("commit-{}", state.commits);

        let branch = state
            .branches
            .get_mut(&file.branch)
            .ok_or(HostError::NotFound)?;

        match (branch.files.get(&file.path), &file.sha) {
            (Some(_), None) => {
                return Err(HostError::Api {
                    status: 422,
                    message: "\"sha\" wasn't supplied".to_string(),
                })
            }
            (Some(existing), Some(sha)) if content_hash(existing) != *sha => {
                return Err(HostError::Api {
                    status: 409,
                    message: format!("{} does not match {}", file.path, sha),
                })
            }
            _ => {}
        }

        branch.files.insert(file.path.clone(), file.content.clone());
        branch.head = commit;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        pr: &NewPullRequest,
    ) -> Result<PullRequest, HostError> {
        let mut state = self.enter("create_pull_request", &pr.title)?;
        state.check_repo(repo)?;

        if !state.branches.contains_key(&pr.head) || !state.branches.contains_key(&pr.base) {
            return Err(HostError::Api {
                status: 422,
                message: "Validation Failed".to_string(),
            });
        }

        let number = state.take_number();
        let pull = PullRequest {
            number,
            title: pr.title.clone(),
            html_url: format!("{}/pull/{}", state.repo.html_url, number),
            state: ItemState::Open,
            head: pr.head.clone(),
        };
        state.pulls.push(pull.clone());
        Ok(pull)
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        filter: ItemState,
    ) -> Result<Vec<PullRequest>, HostError> {
        let state = self.enter("list_pull_requests", filter.as_str())?;
        state.check_repo(repo)?;
        Ok(state
            .pulls
            .iter()
            .filter(|p| filter.admits(p.state))
            .cloned()
            .collect())
    }

    async fn list_issues(&self, repo: &RepoRef, filter: ItemState) -> Result<Vec<Issue>, HostError> {
        let state = self.enter("list_issues", filter.as_str())?;
        state.check_repo(repo)?;
        Ok(state
            .issues
            .iter()
            .filter(|i| filter.admits(i.state))
            .cloned()
            .collect())
    }

    async fn create_issue(
        &self,
        repo: &RepoRef,
        title: &str,
        body: &str,
    ) -> Result<Issue, HostError> {
        let mut state = self.enter("create_issue", title)?;
        state.check_repo(repo)?;

        let number = state.take_number();
        let issue = Issue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            state: ItemState::Open,
            author: self.login.clone(),
            html_url: format!("{}/issues/{}", state.repo.html_url, number),
        };
        state.issues.push(issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<Issue, HostError> {
        let mut state = self.enter("update_issue", &number.to_string())?;
        state.check_repo(repo)?;

        let issue = state
            .issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or(HostError::NotFound)?;

        if let Some(ref body) = update.body {
            issue.body = body.clone();
        }
        if let Some(new_state) = update.state {
            issue.state = new_state;
        }
        Ok(issue.clone())
    }

    async fn list_issue_comments(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<Comment>, HostError> {
        let state = self.enter("list_issue_comments", &number.to_string())?;
        state.check_repo(repo)?;
        Ok(state.comments.get(&number).cloned().unwrap_or_default())
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<Comment, HostError> {
        let mut state = self.enter("create_issue_comment", &number.to_string())?;
        state.check_repo(repo)?;

        if !state.issues.iter().any(|i| i.number == number) {
            return Err(HostError::NotFound);
        }

        let comment = Comment {
            id: state.next_comment_id,
            body: body.to_string(),
            author: self.login.clone(),
        };
        state.next_comment_id += 1;
        state.comments.entry(number).or_default().push(comment.clone());
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> MockHost {
        MockHost::new(RepoInfo::new("lab", "tool"))
            .with_file("README.md", "# tool")
            .with_file("workflows/a.cwl", "cwlVersion: v1.2")
            .with_file("workflows/deep/b.cwl", "cwlVersion: v1.2")
    }

    #[tokio::test]
    async fn test_list_dir_root_and_nested() {
        let host = host();
        let repo = RepoRef::new("lab", "tool");

        let root = host.list_dir(&repo, "").await.unwrap();
        let names: Vec<_> = root.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            vec![("README.md", EntryKind::File), ("workflows", EntryKind::Dir)]
        );

        let nested = host.list_dir(&repo, "workflows").await.unwrap();
        assert_eq!(nested[0].path, "workflows/a.cwl");
        assert_eq!(nested[1].path, "workflows/deep");
        assert_eq!(nested[1].kind, EntryKind::Dir);
    }

    #[tokio::test]
    async fn test_empty_repository_listing_is_not_found() {
        let host = MockHost::new(RepoInfo::new("lab", "empty"));
        let result = host.list_dir(&RepoRef::new("lab", "empty"), "").await;
        assert!(matches!(result, Err(HostError::NotFound)));
    }

    #[tokio::test]
    async fn test_put_file_requires_sha_for_existing() {
        let host = host();
        let repo = RepoRef::new("lab", "tool");

        let mut put = PutFile {
            path: "README.md".to_string(),
            branch: "main".to_string(),
            message: "update".to_string(),
            content: "# new".to_string(),
            sha: None,
        };
        assert!(matches!(
            host.put_file(&repo, &put).await,
            Err(HostError::Api { status: 422, .. })
        ));

        put.sha = Some(content_hash("# tool"));
        host.put_file(&repo, &put).await.unwrap();
        assert_eq!(host.file_on("main", "README.md").as_deref(), Some("# new"));
    }

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let host = host();
        let repo = RepoRef::new("lab", "tool");
        host.fail_next("get_repository", HostError::RateLimited { retry_after_secs: 1 });

        assert!(host.get_repository(&repo).await.is_err());
        assert!(host.get_repository(&repo).await.is_ok());
        assert_eq!(host.call_count("get_repository"), 2);
    }
}
