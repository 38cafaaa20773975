//! SQLite storage layer for fairgate
//!
//! This module handles persistent storage of:
//! - Repositories seen by the engine and their cached attributes
//! - One validation record per (repository, artifact)
//!
//! Upserts are find-then-branch: an existing record is updated in place and keeps
//! its identifier, otherwise a record with a fresh UUID is inserted.

mod schema;

pub use schema::SCHEMA;

use crate::checks::ArtifactKind;
use crate::host::{RepoInfo, RepoRef};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Compute the sha256 hex digest of content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Quality of an artifact that is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Valid,
    Invalid,
    /// No quality check exists for this artifact type
    Unchecked,
}

impl QualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityStatus::Valid => "valid",
            QualityStatus::Invalid => "invalid",
            QualityStatus::Unchecked => "unchecked",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "valid" => Some(QualityStatus::Valid),
            "invalid" => Some(QualityStatus::Invalid),
            "unchecked" => Some(QualityStatus::Unchecked),
            _ => None,
        }
    }
}

/// Stored repository row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRow {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub hosting_id: u64,
    pub default_branch: String,
    pub description: Option<String>,
    pub license_spdx: Option<String>,
    pub html_url: String,
    pub private: bool,
    pub archived: bool,
    pub updated_at: DateTime<Utc>,
}

impl RepositoryRow {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner, &self.name)
    }
}

/// Values written by one validation or remediation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub present: bool,
    pub quality: Option<QualityStatus>,
    pub content: String,
    pub path: String,
    pub pull_request_url: PullRequestLink,
}

/// Effect of an update on the stored pull request URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PullRequestLink {
    #[default]
    Keep,
    Set(String),
    /// The pull request was merged or closed
    Clear,
}

impl PullRequestLink {
    fn resolve(self, stored: Option<String>) -> Option<String> {
        match self {
            PullRequestLink::Keep => stored,
            PullRequestLink::Set(url) => Some(url),
            PullRequestLink::Clear => None,
        }
    }
}

/// Persisted outcome of validating one artifact of one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRecord {
    /// Stable once created
    pub identifier: String,
    pub artifact: ArtifactKind,
    pub present: bool,
    pub quality: Option<QualityStatus>,
    pub content: String,
    pub content_hash: String,
    /// Discovered location, or the "not found" sentinel
    pub path: String,
    pub pull_request_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ValidationRecord {
    /// Short human-readable status
    pub fn status_label(&self) -> String {
        match (self.present, self.quality) {
            (false, _) => "missing".to_string(),
            (true, None) | (true, Some(QualityStatus::Unchecked)) => "present".to_string(),
            (true, Some(quality)) => format!("present ({})", quality.as_str()),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub repositories: usize,
    pub records: usize,
    pub missing: usize,
    pub pull_requests: usize,
}

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {:?}", parent)
                })?;
            }
        }

        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn()?
            .execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))
    }

    // ==================== Repositories ====================

    /// Insert or refresh the cached row for a repository
    pub fn upsert_repository(&self, info: &RepoInfo) -> Result<RepositoryRow> {
        let conn = self.conn()?;
        let now = Utc::now();

        let existing = find_repository_id(&conn, &info.owner, &info.name)?;

        let id = match existing {
            Some(id) => {
                conn.execute(
                    r#"
                    UPDATE repositories SET
                        hosting_id = ?2,
                        default_branch = ?3,
                        description = ?4,
                        license_spdx = ?5,
                        html_url = ?6,
                        private = ?7,
                        archived = ?8,
                        updated_at = ?9
                    WHERE id = ?1
                    "#,
                    params![
                        id,
                        info.id as i64,
                        info.default_branch,
                        info.description,
                        info.license_spdx,
                        info.html_url,
                        info.private,
                        info.archived,
                        now.to_rfc3339(),
                    ],
                )
                .context("Failed to update repository")?;
                id
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                conn.execute(
                    r#"
                    INSERT INTO repositories (
                        id, owner, name, hosting_id, default_branch, description,
                        license_spdx, html_url, private, archived, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        id,
                        info.owner,
                        info.name,
                        info.id as i64,
                        info.default_branch,
                        info.description,
                        info.license_spdx,
                        info.html_url,
                        info.private,
                        info.archived,
                        now.to_rfc3339(),
                    ],
                )
                .context("Failed to insert repository")?;
                id
            }
        };

        Ok(RepositoryRow {
            id,
            owner: info.owner.clone(),
            name: info.name.clone(),
            hosting_id: info.id,
            default_branch: info.default_branch.clone(),
            description: info.description.clone(),
            license_spdx: info.license_spdx.clone(),
            html_url: info.html_url.clone(),
            private: info.private,
            archived: info.archived,
            updated_at: now,
        })
    }

    /// Get the stored row for a repository
    pub fn get_repository(&self, repo: &RepoRef) -> Result<Option<RepositoryRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT id, owner, name, hosting_id, default_branch, description,
                       license_spdx, html_url, private, archived, updated_at
                FROM repositories WHERE owner = ?1 AND name = ?2
                "#,
                params![repo.owner, repo.name],
                |row| {
                    Ok(RepositoryDbRow {
                        id: row.get(0)?,
                        owner: row.get(1)?,
                        name: row.get(2)?,
                        hosting_id: row.get(3)?,
                        default_branch: row.get(4)?,
                        description: row.get(5)?,
                        license_spdx: row.get(6)?,
                        html_url: row.get(7)?,
                        private: row.get(8)?,
                        archived: row.get(9)?,
                        updated_at: row.get(10)?,
                    })
                },
            )
            .optional()
            .context("Failed to get repository")?;

        Ok(row.map(|r| r.into_repository()))
    }

    /// Delete a repository and, by cascade, all of its records
    pub fn remove_repository(&self, repo: &RepoRef) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute(
                "DELETE FROM repositories WHERE owner = ?1 AND name = ?2",
                params![repo.owner, repo.name],
            )
            .context("Failed to remove repository")?;

        Ok(deleted > 0)
    }

    // ==================== Validation Records ====================

    /// Create or update the record for one artifact of a registered repository
    pub fn upsert_record(
        &self,
        repo: &RepoRef,
        artifact: ArtifactKind,
        update: RecordUpdate,
    ) -> Result<ValidationRecord> {
        let conn = self.conn()?;

        let repository_id = find_repository_id(&conn, &repo.owner, &repo.name)?
            .ok_or_else(|| anyhow::anyhow!("Repository {} is not registered", repo))?;

        let existing = conn
            .query_row(
                r#"
                SELECT identifier, pull_request_url FROM validation_records
                WHERE repository_id = ?1 AND artifact = ?2
                "#,
                params![repository_id, artifact.key()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()
            .context("Failed to look up validation record")?;

        let now = Utc::now();
        let hash = content_hash(&update.content);
        let quality = update.quality.map(|q| q.as_str());

        let (identifier, pull_request_url) = match existing {
            Some((identifier, stored_url)) => {
                let pull_request_url = update.pull_request_url.resolve(stored_url);
                conn.execute(
                    r#"
                    UPDATE validation_records SET
                        present = ?2,
                        quality = ?3,
                        content = ?4,
                        content_hash = ?5,
                        path = ?6,
                        pull_request_url = ?7,
                        updated_at = ?8
                    WHERE identifier = ?1
                    "#,
                    params![
                        identifier,
                        update.present,
                        quality,
                        update.content,
                        hash,
                        update.path,
                        pull_request_url,
                        now.to_rfc3339(),
                    ],
                )
                .context("Failed to update validation record")?;
                (identifier, pull_request_url)
            }
            None => {
                let identifier = uuid::Uuid::new_v4().to_string();
                let pull_request_url = update.pull_request_url.resolve(None);
                conn.execute(
                    r#"
                    INSERT INTO validation_records (
                        identifier, repository_id, artifact, present, quality,
                        content, content_hash, path, pull_request_url, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        identifier,
                        repository_id,
                        artifact.key(),
                        update.present,
                        quality,
                        update.content,
                        hash,
                        update.path,
                        pull_request_url,
                        now.to_rfc3339(),
                    ],
                )
                .context("Failed to insert validation record")?;
                (identifier, pull_request_url)
            }
        };

        Ok(ValidationRecord {
            identifier,
            artifact,
            present: update.present,
            quality: update.quality,
            content: update.content,
            content_hash: hash,
            path: update.path,
            pull_request_url,
            updated_at: now,
        })
    }

    /// Get the record for one artifact
    pub fn get_record(
        &self,
        repo: &RepoRef,
        artifact: ArtifactKind,
    ) -> Result<Option<ValidationRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT r.identifier, r.artifact, r.present, r.quality, r.content,
                       r.content_hash, r.path, r.pull_request_url, r.updated_at
                FROM validation_records r
                JOIN repositories p ON p.id = r.repository_id
                WHERE p.owner = ?1 AND p.name = ?2 AND r.artifact = ?3
                "#,
                params![repo.owner, repo.name, artifact.key()],
                record_row,
            )
            .optional()
            .context("Failed to get validation record")?;

        row.map(|r| r.into_record()).transpose()
    }

    /// All records of a repository, in artifact order
    pub fn records_for(&self, repo: &RepoRef) -> Result<Vec<ValidationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT r.identifier, r.artifact, r.present, r.quality, r.content,
                   r.content_hash, r.path, r.pull_request_url, r.updated_at
            FROM validation_records r
            JOIN repositories p ON p.id = r.repository_id
            WHERE p.owner = ?1 AND p.name = ?2
            "#,
        )?;

        let rows = stmt.query_map(params![repo.owner, repo.name], record_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        records.sort_by_key(|r| r.artifact);

        Ok(records)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn()?;

        let repositories: i64 =
            conn.query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?;

        let records: i64 =
            conn.query_row("SELECT COUNT(*) FROM validation_records", [], |row| {
                row.get(0)
            })?;

        let missing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM validation_records WHERE present = 0",
            [],
            |row| row.get(0),
        )?;

        let pull_requests: i64 = conn.query_row(
            "SELECT COUNT(*) FROM validation_records WHERE pull_request_url IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(DatabaseStats {
            repositories: repositories as usize,
            records: records as usize,
            missing: missing as usize,
            pull_requests: pull_requests as usize,
        })
    }
}

fn find_repository_id(conn: &Connection, owner: &str, name: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM repositories WHERE owner = ?1 AND name = ?2",
        params![owner, name],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up repository")
}

fn record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordDbRow> {
    Ok(RecordDbRow {
        identifier: row.get(0)?,
        artifact: row.get(1)?,
        present: row.get(2)?,
        quality: row.get(3)?,
        content: row.get(4)?,
        content_hash: row.get(5)?,
        path: row.get(6)?,
        pull_request_url: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

// Internal row types for database mapping

struct RepositoryDbRow {
    id: String,
    owner: String,
    name: String,
    hosting_id: i64,
    default_branch: String,
    description: Option<String>,
    license_spdx: Option<String>,
    html_url: String,
    private: bool,
    archived: bool,
    updated_at: String,
}

impl RepositoryDbRow {
    fn into_repository(self) -> RepositoryRow {
        RepositoryRow {
            id: self.id,
            owner: self.owner,
            name: self.name,
            hosting_id: self.hosting_id.max(0) as u64,
            default_branch: self.default_branch,
            description: self.description,
            license_spdx: self.license_spdx,
            html_url: self.html_url,
            private: self.private,
            archived: self.archived,
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

struct RecordDbRow {
    identifier: String,
    artifact: String,
    present: bool,
    quality: Option<String>,
    content: String,
    content_hash: String,
    path: String,
    pull_request_url: Option<String>,
    updated_at: String,
}

impl RecordDbRow {
    fn into_record(self) -> Result<ValidationRecord> {
        let artifact: ArtifactKind = self
            .artifact
            .parse()
            .with_context(|| format!("Unknown artifact in store: {}", self.artifact))?;

        Ok(ValidationRecord {
            identifier: self.identifier,
            artifact,
            present: self.present,
            quality: self.quality.as_deref().and_then(QualityStatus::parse),
            content: self.content,
            content_hash: self.content_hash,
            path: self.path,
            pull_request_url: self.pull_request_url,
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(db: &Database) -> RepoRef {
        let info = RepoInfo::new("lab", "tool");
        db.upsert_repository(&info).unwrap();
        info.repo_ref()
    }

    fn missing(path: &str) -> RecordUpdate {
        RecordUpdate {
            present: false,
            quality: None,
            content: String::new(),
            path: path.to_string(),
            pull_request_url: PullRequestLink::Keep,
        }
    }

    #[test]
    fn test_database_creation() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats, DatabaseStats::default());
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_repository_upsert_keeps_id() {
        let db = Database::open_in_memory().unwrap();
        let mut info = RepoInfo::new("lab", "tool");

        let first = db.upsert_repository(&info).unwrap();
        info.default_branch = "trunk".to_string();
        let second = db.upsert_repository(&info).unwrap();

        assert_eq!(first.id, second.id);
        let stored = db.get_repository(&info.repo_ref()).unwrap().unwrap();
        assert_eq!(stored.default_branch, "trunk");
        assert_eq!(db.stats().unwrap().repositories, 1);
    }

    #[test]
    fn test_record_upsert_is_stable() {
        let db = Database::open_in_memory().unwrap();
        let repo = registered(&db);

        let first = db
            .upsert_record(&repo, ArtifactKind::License, missing("No LICENSE file found"))
            .unwrap();

        let second = db
            .upsert_record(
                &repo,
                ArtifactKind::License,
                RecordUpdate {
                    present: true,
                    quality: Some(QualityStatus::Unchecked),
                    content: "MIT License".to_string(),
                    path: "LICENSE".to_string(),
                    pull_request_url: PullRequestLink::Keep,
                },
            )
            .unwrap();

        assert_eq!(first.identifier, second.identifier);
        assert_eq!(db.records_for(&repo).unwrap().len(), 1);

        let stored = db.get_record(&repo, ArtifactKind::License).unwrap().unwrap();
        assert!(stored.present);
        assert_eq!(stored.path, "LICENSE");
        assert_eq!(stored.content_hash, content_hash("MIT License"));
    }

    #[test]
    fn test_pull_request_url_is_kept_when_absent_from_update() {
        let db = Database::open_in_memory().unwrap();
        let repo = registered(&db);

        let mut update = missing("No README file found");
        update.pull_request_url =
            PullRequestLink::Set("https://github.com/lab/tool/pull/3".to_string());
        db.upsert_record(&repo, ArtifactKind::Readme, update).unwrap();

        let record = db
            .upsert_record(&repo, ArtifactKind::Readme, missing("No README file found"))
            .unwrap();

        assert_eq!(
            record.pull_request_url.as_deref(),
            Some("https://github.com/lab/tool/pull/3")
        );
        assert_eq!(db.stats().unwrap().pull_requests, 1);
    }

    #[test]
    fn test_pull_request_url_cleared_on_request() {
        let db = Database::open_in_memory().unwrap();
        let repo = registered(&db);

        let mut update = missing("No README file found");
        update.pull_request_url =
            PullRequestLink::Set("https://github.com/lab/tool/pull/3".to_string());
        let first = db.upsert_record(&repo, ArtifactKind::Readme, update).unwrap();

        let mut update = missing("No README file found");
        update.pull_request_url = PullRequestLink::Clear;
        let record = db.upsert_record(&repo, ArtifactKind::Readme, update).unwrap();

        assert_eq!(record.identifier, first.identifier);
        assert_eq!(record.pull_request_url, None);
        let stored = db.get_record(&repo, ArtifactKind::Readme).unwrap().unwrap();
        assert_eq!(stored.pull_request_url, None);
        assert_eq!(db.stats().unwrap().pull_requests, 0);
    }

    #[test]
    fn test_records_require_registered_repository() {
        let db = Database::open_in_memory().unwrap();
        let result = db.upsert_record(
            &RepoRef::new("nobody", "nothing"),
            ArtifactKind::Readme,
            missing("No README file found"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_repository_cascades() {
        let db = Database::open_in_memory().unwrap();
        let repo = registered(&db);

        db.upsert_record(&repo, ArtifactKind::License, missing("No LICENSE file found"))
            .unwrap();
        db.upsert_record(&repo, ArtifactKind::Readme, missing("No README file found"))
            .unwrap();
        assert_eq!(db.stats().unwrap().missing, 2);

        assert!(db.remove_repository(&repo).unwrap());
        assert!(db.records_for(&repo).unwrap().is_empty());
        assert_eq!(db.stats().unwrap().records, 0);
        assert!(!db.remove_repository(&repo).unwrap());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("fairgate.db");

        let identifier = {
            let db = Database::open(&path).unwrap();
            let repo = registered(&db);
            db.upsert_record(&repo, ArtifactKind::Citation, missing("No CITATION file found"))
                .unwrap()
                .identifier
        };

        let db = Database::open(&path).unwrap();
        let record = db
            .get_record(&RepoRef::new("lab", "tool"), ArtifactKind::Citation)
            .unwrap()
            .unwrap();
        assert_eq!(record.identifier, identifier);
    }
}
