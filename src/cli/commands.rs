//! Command implementations

use super::OutputFormat;
use crate::audit::{Auditor, ComplianceReport, RunOptions};
use crate::checks::ArtifactKind;
use crate::config::Config;
use crate::error::FairError;
use crate::host::{GitHubClient, HostingApi, RepoRef};
use crate::remediate::{
    draft_content, Dashboard, DashboardUpdate, DraftContext, MarkerAction, RemediationOutcome,
    RemediationRequest, WorkflowDriver,
};
use crate::storage::{Database, DatabaseStats, ValidationRecord};
use crate::synth::Synthesizer;
use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Load the configuration and apply command-line overrides
pub fn load_config(
    path: Option<&Path>,
    database: Option<PathBuf>,
    token: Option<String>,
) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;

    if database.is_some() {
        config.storage.database = database;
    }
    if token.is_some() {
        config.github.token = token;
    }

    Ok(config)
}

/// Open the validation store named by the configuration
pub fn open_database(config: &Config) -> Result<Database> {
    let path = config.database_path()?;
    Database::open(&path)
}

/// Build the hosting client
pub fn github_client(config: &Config) -> Result<GitHubClient> {
    if config.github.token.is_none() {
        tracing::warn!("No GITHUB_TOKEN set; requests are unauthenticated and heavily rate limited");
    }
    GitHubClient::new(&config.github).context("Failed to build hosting API client")
}

/// Run a compliance check, optionally syncing the tracking issue
pub async fn audit(
    host: &dyn HostingApi,
    db: &Database,
    config: &Config,
    repo: &RepoRef,
    options: RunOptions,
    dashboard: bool,
) -> Result<(ComplianceReport, Option<DashboardUpdate>)> {
    let auditor = Auditor::new(host, db, config);
    let report = auditor.run(repo, options).await?;

    let update = if dashboard {
        Some(auditor.sync_dashboard(&report, &options.satisfies()).await?)
    } else {
        None
    };

    Ok((report, update))
}

/// Serve actions queued on the tracking issue
pub async fn audit_pending(
    host: &dyn HostingApi,
    db: &Database,
    config: &Config,
    repo: &RepoRef,
) -> Result<Option<(ComplianceReport, DashboardUpdate)>> {
    Ok(Auditor::new(host, db, config).run_pending(repo).await?)
}

/// Build a metadata document for a repository
pub async fn synth(host: &dyn HostingApi, repo: &RepoRef, artifact: ArtifactKind) -> Result<String> {
    let info = host
        .get_repository(repo)
        .await
        .map_err(|e| FairError::fetch(format!("fetch repository {}", repo), e))?;

    let synthesis = Synthesizer::new(host)
        .synthesize(&info, artifact, None, chrono::Utc::now().date_naive())
        .await?;

    for warning in &synthesis.warnings {
        eprintln!("Warning: {}", warning);
    }

    Ok(synthesis.content)
}

/// Draft content for `artifact` and open a pull request proposing it
pub async fn remediate(
    host: &dyn HostingApi,
    db: &Database,
    config: &Config,
    repo: &RepoRef,
    artifact: ArtifactKind,
    spdx: Option<&str>,
) -> Result<RemediationOutcome, FairError> {
    let info = host
        .get_repository(repo)
        .await
        .map_err(|e| FairError::fetch(format!("fetch repository {}", repo), e))?;
    db.upsert_repository(&info)?;

    let ctx = DraftContext {
        info: &info,
        spdx,
        today: chrono::Utc::now().date_naive(),
    };
    let content = draft_content(host, artifact, &ctx).await?;

    WorkflowDriver::new(host, db, &config.bot)
        .remediate(&info, RemediationRequest { artifact, content })
        .await
}

/// Queue an action on the tracking issue
pub async fn request(
    host: &dyn HostingApi,
    config: &Config,
    repo: &RepoRef,
    action: MarkerAction,
) -> Result<String, FairError> {
    let issue = Dashboard::new(host, &config.bot).request(repo, action).await?;
    Ok(issue.html_url)
}

/// Stored records of a repository
pub fn status(db: &Database, repo: &RepoRef) -> Result<Vec<ValidationRecord>> {
    db.records_for(repo)
}

/// Remove a repository from the store
pub fn forget(db: &Database, repo: &RepoRef) -> Result<bool> {
    db.remove_repository(repo)
}

/// Print a compliance report
pub fn print_report(
    report: &ComplianceReport,
    update: Option<&DashboardUpdate>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = json!({
                "report": report,
                "compliant": report.is_compliant(),
                "dashboard": update.map(|u| json!({
                    "action": u.label(),
                    "issue": u.issue().html_url,
                })),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            let title = format!("Compliance of {}", report.repository.repo_ref());
            println!("{}", title);
            println!("{}\n", "=".repeat(title.len()));

            print_records_text(&report.records, false);

            if !report.failures.is_empty() {
                println!("\nCould not be checked:");
                for failure in &report.failures {
                    println!("  ✗ {}: {}", failure.artifact, failure.error);
                }
            }

            if let Some(ref workflows) = report.workflows {
                println!("\nWorkflow descriptions: {}", workflows.len());
                for path in workflows {
                    println!("  - {}", path);
                }
            }

            for kind in &report.drafted {
                println!("\nDrafted {} (stored; propose with `fairgate remediate`)", kind);
            }

            for warning in &report.warnings {
                println!("  ⚠ {}", warning);
            }

            if report.is_compliant() {
                println!("\n✓ All recommended files are present");
            } else {
                let missing: Vec<&str> = report.missing().iter().map(|k| k.key()).collect();
                println!("\n⚠ Missing: {}", missing.join(", "));
            }

            if let Some(update) = update {
                println!(
                    "Tracking issue {}: {}",
                    update.label(),
                    update.issue().html_url
                );
            }
        }
    }

    Ok(())
}

/// Print stored records
pub fn print_records(
    records: &[ValidationRecord],
    detailed: bool,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No validation records. Run 'fairgate audit' first.");
            } else {
                print_records_text(records, detailed);
            }
        }
    }
    Ok(())
}

fn print_records_text(records: &[ValidationRecord], detailed: bool) {
    for record in records {
        let icon = if record.present { "✓" } else { "✗" };
        println!("{} {:<16} {:<20} {}", icon, record.artifact.key(), record.status_label(), record.path);

        if let Some(ref url) = record.pull_request_url {
            println!("   Pull request: {}", url);
        }
        if detailed {
            println!("   ID: {}", record.identifier);
            println!("   Updated: {}", record.updated_at.to_rfc3339());
            if !record.content.is_empty() {
                for line in record.content.lines().take(10) {
                    println!("   | {}", line);
                }
            }
        }
    }
}

/// Print a remediation outcome
pub fn print_outcome(outcome: &RemediationOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => match outcome {
            RemediationOutcome::Opened { url, branch, .. } => {
                println!("✓ Opened pull request {} (branch {})", url, branch)
            }
            RemediationOutcome::Unchanged { path } => {
                println!("✓ {} already holds the proposed content", path)
            }
        },
    }
    Ok(())
}

/// Print store statistics
pub fn print_stats(stats: &DatabaseStats, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stats)?),
        OutputFormat::Text => {
            println!("\nStore: {} repositories, {} records ({} missing, {} with pull requests)",
                stats.repositories, stats.records, stats.missing, stats.pull_requests);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MockHost, RepoInfo};

    #[tokio::test]
    async fn test_remediate_then_status() {
        let host = MockHost::new(RepoInfo::new("lab", "tool"));
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let repo = RepoRef::new("lab", "tool");

        let outcome = remediate(&host, &db, &config, &repo, ArtifactKind::Readme, None)
            .await
            .unwrap();
        assert!(matches!(outcome, RemediationOutcome::Opened { .. }));

        let records = status(&db, &repo).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].pull_request_url.is_some());

        let again = remediate(&host, &db, &config, &repo, ArtifactKind::Readme, None).await;
        assert!(again.unwrap_err().is_duplicate());
    }

    #[tokio::test]
    async fn test_audit_with_dashboard_then_forget() {
        let host = MockHost::new(RepoInfo::new("lab", "tool")).with_file("README.md", "# tool\n");
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let repo = RepoRef::new("lab", "tool");

        let (report, update) = audit(&host, &db, &config, &repo, RunOptions::default(), true)
            .await
            .unwrap();
        assert!(report.get(ArtifactKind::Readme).unwrap().present);
        assert_eq!(update.unwrap().label(), "created");

        request(&host, &config, &repo, MarkerAction::ReRenderDashboard)
            .await
            .unwrap();
        assert!(audit_pending(&host, &db, &config, &repo).await.unwrap().is_some());

        assert!(forget(&db, &repo).unwrap());
        assert!(status(&db, &repo).unwrap().is_empty());
    }

    #[test]
    fn test_load_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save(&path).unwrap();

        let config = load_config(
            Some(&path),
            Some(dir.path().join("store.db")),
            Some("token".to_string()),
        )
        .unwrap();
        assert_eq!(config.github.token.as_deref(), Some("token"));
        assert_eq!(config.database_path().unwrap(), dir.path().join("store.db"));
    }
}
