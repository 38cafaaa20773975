//! Database schema definition

/// SQL schema for the fairgate validation store
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Repositories known to the engine, keyed by (owner, name)
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    name TEXT NOT NULL,
    hosting_id INTEGER NOT NULL DEFAULT 0,
    default_branch TEXT NOT NULL,
    description TEXT,
    license_spdx TEXT,
    html_url TEXT NOT NULL,
    private INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_repositories_full_name ON repositories(owner, name);

-- One validation record per (repository, artifact)
CREATE TABLE IF NOT EXISTS validation_records (
    identifier TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL,
    artifact TEXT NOT NULL,
    present INTEGER NOT NULL,
    quality TEXT,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    path TEXT NOT NULL,
    pull_request_url TEXT,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_records_artifact ON validation_records(repository_id, artifact);
"#;
