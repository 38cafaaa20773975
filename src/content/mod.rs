//! Repository content reader
//!
//! Thin adapter over the hosting API that separates "absent" from "could not
//! determine": a 404 becomes an absent file or an empty listing, anything else is
//! surfaced as `FairError::TransientFetch`.

use crate::error::FairError;
use crate::host::{HostingApi, RepoRef, TreeEntry};

/// Result of looking up a single path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLookup {
    pub exists: bool,
    /// Lossily decoded text
    pub content: Option<String>,
    /// Blob sha, needed to overwrite the file
    pub sha: Option<String>,
}

impl FileLookup {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Reads files and directory listings of one repository
pub struct ContentReader<'a> {
    host: &'a dyn HostingApi,
    repo: &'a RepoRef,
}

impl<'a> ContentReader<'a> {
    pub fn new(host: &'a dyn HostingApi, repo: &'a RepoRef) -> Self {
        Self { host, repo }
    }

    pub fn repo(&self) -> &RepoRef {
        self.repo
    }

    /// Look up `path` on the default branch
    pub async fn get_file(&self, path: &str) -> Result<FileLookup, FairError> {
        self.get_file_at(path, None).await
    }

    /// Look up `path` at a branch or commit
    pub async fn get_file_at(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileLookup, FairError> {
        match self.host.get_file(self.repo, path, git_ref).await {
            Ok(blob) => Ok(FileLookup {
                exists: true,
                content: Some(blob.text()),
                sha: Some(blob.sha),
            }),
            Err(e) if e.is_not_found() => Ok(FileLookup::absent()),
            Err(e) => Err(FairError::fetch(format!("read {}", path), e)),
        }
    }

    /// List the entries of directory `path` (`""` is the root)
    pub async fn get_tree(&self, path: &str) -> Result<Vec<TreeEntry>, FairError> {
        match self.host.list_dir(self.repo, path).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(FairError::fetch(format!("list {}/", path), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostError, MockHost, RepoInfo};

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let host = MockHost::new(RepoInfo::new("lab", "tool")).with_file("README.md", "hi");
        let repo = RepoRef::new("lab", "tool");
        let reader = ContentReader::new(&host, &repo);

        let found = reader.get_file("README.md").await.unwrap();
        assert!(found.exists);
        assert_eq!(found.text(), "hi");
        assert!(found.sha.is_some());

        let missing = reader.get_file("LICENSE").await.unwrap();
        assert_eq!(missing, FileLookup::absent());
    }

    #[tokio::test]
    async fn test_other_failures_are_transient_fetch() {
        let host = MockHost::new(RepoInfo::new("lab", "tool"));
        let repo = RepoRef::new("lab", "tool");
        host.fail_next(
            "get_file",
            HostError::Api {
                status: 503,
                message: "unavailable".to_string(),
            },
        );

        let reader = ContentReader::new(&host, &repo);
        let err = reader.get_file("LICENSE").await.unwrap_err();
        assert!(matches!(err, FairError::TransientFetch { .. }));
    }

    #[tokio::test]
    async fn test_empty_repository_tree() {
        let host = MockHost::new(RepoInfo::new("lab", "empty"));
        let repo = RepoRef::new("lab", "empty");
        let reader = ContentReader::new(&host, &repo);
        assert!(reader.get_tree("").await.unwrap().is_empty());
    }
}
