//! Compliance orchestrator
//!
//! One run fetches the repository, runs the presence checkers concurrently,
//! validates and optionally drafts metadata documents, and upserts one validation
//! record per determined artifact. A failure to check one artifact is collected in
//! the report instead of aborting the run.

mod render;

pub use render::render_report;

use crate::checks::{check_artifact, find_workflow_files, ArtifactKind, CheckResult};
use crate::config::Config;
use crate::content::ContentReader;
use crate::error::{FairError, PartialMetadataWarning};
use crate::host::{HostingApi, ItemState, RepoInfo, RepoRef};
use crate::logging::Logger;
use crate::remediate::{Dashboard, DashboardUpdate, MarkerAction};
use crate::storage::{Database, PullRequestLink, QualityStatus, RecordUpdate, ValidationRecord};
use crate::synth::{assess, build_document, Synthesizer};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

/// What a run covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Also walk the tree for workflow-description files
    pub full: bool,
    /// Synthesize citation/codemeta drafts for absent documents
    pub draft: bool,
}

impl RunOptions {
    pub fn full() -> Self {
        Self {
            full: true,
            draft: false,
        }
    }

    /// Dashboard actions a run with these options satisfies
    pub fn satisfies(&self) -> Vec<MarkerAction> {
        let mut actions = vec![
            MarkerAction::ReRenderDashboard,
            MarkerAction::RerunMetadataValidation,
        ];
        if self.full {
            actions.push(MarkerAction::RerunFullRepoValidation);
            actions.push(MarkerAction::RerunWorkflowValidation);
        }
        actions
    }

    /// Options needed to satisfy `pending` actions
    pub fn for_pending(pending: &[MarkerAction]) -> Self {
        Self {
            full: pending.iter().any(|action| {
                matches!(
                    action,
                    MarkerAction::RerunFullRepoValidation | MarkerAction::RerunWorkflowValidation
                )
            }),
            draft: false,
        }
    }
}

/// An artifact whose presence could not be determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactFailure {
    pub artifact: ArtifactKind,
    pub error: String,
}

/// Outcome of one orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub repository: RepoInfo,
    pub records: Vec<ValidationRecord>,
    pub failures: Vec<ArtifactFailure>,
    /// Workflow files found; `None` when the run did not walk the tree
    pub workflows: Option<Vec<String>>,
    /// Absent documents whose record now holds a synthesized draft
    pub drafted: Vec<ArtifactKind>,
    pub warnings: Vec<PartialMetadataWarning>,
}

impl ComplianceReport {
    pub fn get(&self, kind: ArtifactKind) -> Option<&ValidationRecord> {
        self.records.iter().find(|r| r.artifact == kind)
    }

    pub fn is_invalid(&self, kind: ArtifactKind) -> bool {
        self.get(kind)
            .is_some_and(|r| r.quality == Some(QualityStatus::Invalid))
    }

    /// Recommended artifacts that are absent or could not be checked
    pub fn missing(&self) -> Vec<ArtifactKind> {
        ArtifactKind::FIXED
            .into_iter()
            .filter(|kind| !self.get(*kind).is_some_and(|r| r.present))
            .collect()
    }

    /// Every recommended artifact is present and no present document is invalid
    pub fn is_compliant(&self) -> bool {
        self.failures.is_empty()
            && self.missing().is_empty()
            && !ArtifactKind::FIXED.iter().any(|kind| self.is_invalid(*kind))
    }
}

/// Runs compliance checks for repositories
pub struct Auditor<'a> {
    host: &'a dyn HostingApi,
    db: &'a Database,
    config: &'a Config,
    logger: Logger,
}

impl<'a> Auditor<'a> {
    pub fn new(host: &'a dyn HostingApi, db: &'a Database, config: &'a Config) -> Self {
        Self {
            host,
            db,
            config,
            logger: Logger::new("audit"),
        }
    }

    /// Check every artifact of `repo` and record the results
    pub async fn run(
        &self,
        repo: &RepoRef,
        options: RunOptions,
    ) -> Result<ComplianceReport, FairError> {
        self.run_on(repo, options, chrono::Utc::now().date_naive())
            .await
    }

    /// `run` with an explicit date for undated drafts
    pub async fn run_on(
        &self,
        repo: &RepoRef,
        options: RunOptions,
        today: NaiveDate,
    ) -> Result<ComplianceReport, FairError> {
        let info = self
            .host
            .get_repository(repo)
            .await
            .map_err(|e| FairError::fetch(format!("fetch repository {}", repo), e))?;
        self.db.upsert_repository(&info)?;

        let reader = ContentReader::new(self.host, repo);
        let (license, readme, citation, codemeta, contributing, code_of_conduct) = tokio::join!(
            check_artifact(&reader, ArtifactKind::License),
            check_artifact(&reader, ArtifactKind::Readme),
            check_artifact(&reader, ArtifactKind::Citation),
            check_artifact(&reader, ArtifactKind::Codemeta),
            check_artifact(&reader, ArtifactKind::Contributing),
            check_artifact(&reader, ArtifactKind::CodeOfConduct),
        );
        let results = [
            (ArtifactKind::License, license),
            (ArtifactKind::Readme, readme),
            (ArtifactKind::Citation, citation),
            (ArtifactKind::Codemeta, codemeta),
            (ArtifactKind::Contributing, contributing),
            (ArtifactKind::CodeOfConduct, code_of_conduct),
        ];

        let mut report = ComplianceReport {
            repository: info.clone(),
            records: Vec::new(),
            failures: Vec::new(),
            workflows: None,
            drafted: Vec::new(),
            warnings: Vec::new(),
        };

        let mut determined: Vec<(ArtifactKind, CheckResult)> = Vec::new();
        for (kind, result) in results {
            match result {
                Ok(check) => determined.push((kind, check)),
                Err(e) => self.record_failure(&mut report, kind, &e),
            }
        }

        let drafts = if options.draft {
            self.drafts(&info, &determined, today, &mut report).await
        } else {
            Vec::new()
        };

        let settled = self.settled_pull_requests(repo).await?;

        for (kind, check) in determined {
            let pull_request_url = if settled.contains(&kind) {
                PullRequestLink::Clear
            } else {
                PullRequestLink::Keep
            };
            let draft = drafts
                .iter()
                .find(|(drafted, _)| *drafted == kind)
                .map(|(_, content)| content.clone());
            let quality = check.status.then(|| assess(kind, &check.content));

            let update = RecordUpdate {
                present: check.status,
                quality,
                content: draft.unwrap_or(check.content),
                path: check.path,
                pull_request_url,
            };
            report.records.push(self.db.upsert_record(repo, kind, update)?);
        }
        report.drafted = drafts.into_iter().map(|(kind, _)| kind).collect();

        if options.full {
            match find_workflow_files(&reader, &self.config.scan).await {
                Ok(files) => {
                    let update = RecordUpdate {
                        present: !files.is_empty(),
                        quality: None,
                        content: files.join("\n"),
                        path: files
                            .first()
                            .cloned()
                            .unwrap_or_else(|| ArtifactKind::Workflow.not_found_path()),
                        pull_request_url: PullRequestLink::Keep,
                    };
                    report
                        .records
                        .push(self.db.upsert_record(repo, ArtifactKind::Workflow, update)?);
                    report.workflows = Some(files);
                }
                Err(e) => self.record_failure(&mut report, ArtifactKind::Workflow, &e),
            }
        }

        self.logger.info(
            "compliance run finished",
            Some(&json!({
                "repository": repo.full_name(),
                "compliant": report.is_compliant(),
                "missing": report.missing().iter().map(|k| k.key()).collect::<Vec<_>>(),
                "failures": report.failures.len(),
                "full": options.full,
            })),
        );

        Ok(report)
    }

    /// Render `report` into the tracking issue, consuming the given markers
    pub async fn sync_dashboard(
        &self,
        report: &ComplianceReport,
        consumed: &[MarkerAction],
    ) -> Result<DashboardUpdate, FairError> {
        let body = render_report(report, &self.config.bot);
        Dashboard::new(self.host, &self.config.bot)
            .ensure_issue(
                &report.repository.repo_ref(),
                &body,
                report.is_compliant(),
                consumed,
            )
            .await
    }

    /// Serve actions queued on the tracking issue; `None` when nothing is pending
    pub async fn run_pending(
        &self,
        repo: &RepoRef,
    ) -> Result<Option<(ComplianceReport, DashboardUpdate)>, FairError> {
        let pending = Dashboard::new(self.host, &self.config.bot)
            .pending(repo)
            .await?;
        if pending.is_empty() {
            return Ok(None);
        }

        let options = RunOptions::for_pending(&pending);
        let report = self.run(repo, options).await?;
        let update = self.sync_dashboard(&report, &options.satisfies()).await?;
        Ok(Some((report, update)))
    }

    async fn drafts(
        &self,
        info: &RepoInfo,
        determined: &[(ArtifactKind, CheckResult)],
        today: NaiveDate,
        report: &mut ComplianceReport,
    ) -> Vec<(ArtifactKind, String)> {
        let absent: Vec<ArtifactKind> = determined
            .iter()
            .filter(|(kind, check)| {
                matches!(kind, ArtifactKind::Citation | ArtifactKind::Codemeta) && !check.status
            })
            .map(|(kind, _)| *kind)
            .collect();
        if absent.is_empty() {
            return Vec::new();
        }

        let readme = determined
            .iter()
            .find(|(kind, _)| *kind == ArtifactKind::Readme)
            .map(|(_, check)| check.content.as_str());

        let signals = Synthesizer::new(self.host).gather(info, readme).await;
        report.warnings.extend(signals.warnings.iter().cloned());

        let mut drafts = Vec::new();
        for kind in absent {
            match build_document(kind, &signals, today) {
                Ok(content) => drafts.push((kind, content)),
                Err(e) => report
                    .warnings
                    .push(PartialMetadataWarning::new(kind.key(), e)),
            }
        }
        drafts
    }

    /// Artifacts whose stored pull request has since been merged or closed
    ///
    /// A failed listing keeps every stored URL.
    async fn settled_pull_requests(&self, repo: &RepoRef) -> Result<Vec<ArtifactKind>, FairError> {
        let linked: Vec<(ArtifactKind, String)> = self
            .db
            .records_for(repo)?
            .into_iter()
            .filter_map(|record| record.pull_request_url.map(|url| (record.artifact, url)))
            .collect();
        if linked.is_empty() {
            return Ok(Vec::new());
        }

        let open = match self.host.list_pull_requests(repo, ItemState::Open).await {
            Ok(open) => open,
            Err(e) => {
                self.logger.warn(
                    "could not list open pull requests; keeping stored links",
                    Some(&json!({
                        "repository": repo.full_name(),
                        "error": e.to_string(),
                    })),
                );
                return Ok(Vec::new());
            }
        };

        Ok(linked
            .into_iter()
            .filter(|(_, url)| !open.iter().any(|pr| &pr.html_url == url))
            .map(|(kind, _)| kind)
            .collect())
    }

    fn record_failure(&self, report: &mut ComplianceReport, kind: ArtifactKind, error: &FairError) {
        self.logger.error(
            "could not determine artifact presence",
            Some(&json!({
                "repository": report.repository.repo_ref().full_name(),
                "artifact": kind.key(),
                "error": error.to_string(),
            })),
        );
        report.failures.push(ArtifactFailure {
            artifact: kind,
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::host::{HostError, MockHost, UserProfile};
    use crate::remediate::{RemediationOutcome, RemediationRequest, WorkflowDriver};
    use chrono::Utc;

    /// Report in which only `present` artifacts exist, at their first candidate path
    pub(crate) fn report_with(present: &[ArtifactKind]) -> ComplianceReport {
        let records = ArtifactKind::FIXED
            .into_iter()
            .map(|kind| {
                let found = present.contains(&kind);
                ValidationRecord {
                    identifier: format!("id-{}", kind.key()),
                    artifact: kind,
                    present: found,
                    quality: found.then_some(QualityStatus::Unchecked),
                    content: String::new(),
                    content_hash: String::new(),
                    path: if found {
                        kind.target_path().unwrap_or_default().to_string()
                    } else {
                        kind.not_found_path()
                    },
                    pull_request_url: None,
                    updated_at: Utc::now(),
                }
            })
            .collect();

        ComplianceReport {
            repository: RepoInfo::new("lab", "tool"),
            records,
            failures: Vec::new(),
            workflows: None,
            drafted: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn person(login: &str, name: &str) -> Option<UserProfile> {
        Some(UserProfile {
            login: login.to_string(),
            name: Some(name.to_string()),
            company: None,
            email: None,
        })
    }

    fn partial_repo() -> MockHost {
        MockHost::new(RepoInfo::new("lab", "tool"))
            .with_file("CONTRIBUTING.md", "# Contributing\n")
            .with_file("src/main.rs", "fn main() {}\n")
            .with_contributor("ada", "User", person("ada", "Ada Lovelace"))
            .with_contributor("grace", "User", person("grace", "Grace Hopper"))
            .with_contributor("github-actions[bot]", "Bot", None)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    }

    #[tokio::test]
    async fn test_partial_repository_run() {
        let host = partial_repo();
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");

        let report = auditor
            .run_on(&repo, RunOptions { full: false, draft: true }, today())
            .await
            .unwrap();

        let license = report.get(ArtifactKind::License).unwrap();
        assert!(!license.present);
        assert_eq!(license.path, "No LICENSE file found");
        assert!(!report.get(ArtifactKind::Readme).unwrap().present);

        let contributing = report.get(ArtifactKind::Contributing).unwrap();
        assert!(contributing.present);
        assert_eq!(contributing.path, "CONTRIBUTING.md");

        assert!(!report.is_compliant());
        assert_eq!(report.drafted, vec![ArtifactKind::Citation, ArtifactKind::Codemeta]);

        let citation = db.get_record(&repo, ArtifactKind::Citation).unwrap().unwrap();
        let cff: serde_yaml::Value = serde_yaml::from_str(&citation.content).unwrap();
        assert_eq!(cff["authors"].as_sequence().unwrap().len(), 2);
        assert!(!citation.present);
        assert!(report.workflows.is_none());
        assert_eq!(host.call_count("list_dir"), 0);
    }

    #[tokio::test]
    async fn test_repeated_runs_keep_identifiers() {
        let host = partial_repo();
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");

        let first = auditor.run(&repo, RunOptions::default()).await.unwrap();
        let second = auditor.run(&repo, RunOptions::default()).await.unwrap();

        for kind in ArtifactKind::FIXED {
            assert_eq!(
                first.get(kind).unwrap().identifier,
                second.get(kind).unwrap().identifier
            );
        }
        assert_eq!(db.records_for(&repo).unwrap().len(), ArtifactKind::FIXED.len());
    }

    #[tokio::test]
    async fn test_full_run_walks_workflows() {
        let host = partial_repo()
            .with_file("workflows/align.cwl", "cwlVersion: v1.2\n")
            .with_file("workflows/tools/sort.cwl", "cwlVersion: v1.2\n");
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");

        let report = auditor.run(&repo, RunOptions::full()).await.unwrap();
        assert_eq!(
            report.workflows,
            Some(vec![
                "workflows/align.cwl".to_string(),
                "workflows/tools/sort.cwl".to_string()
            ])
        );
        let record = report.get(ArtifactKind::Workflow).unwrap();
        assert!(record.present);
        assert_eq!(record.path, "workflows/align.cwl");
    }

    #[tokio::test]
    async fn test_failed_checker_does_not_abort_run() {
        let host = partial_repo();
        host.fail_next(
            "get_file",
            HostError::Api {
                status: 401,
                message: "Bad credentials".to_string(),
            },
        );
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");

        let report = auditor.run(&repo, RunOptions::default()).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.records.len(), ArtifactKind::FIXED.len() - 1);
        assert!(!report.is_compliant());
    }

    #[tokio::test]
    async fn test_compliant_repository() {
        let mut host = MockHost::new(RepoInfo::new("lab", "tool"));
        for kind in ArtifactKind::FIXED {
            let content = match kind {
                ArtifactKind::Citation => {
                    "cff-version: 1.2.0\nmessage: cite\ntitle: tool\nauthors:\n  - name: lab\n"
                }
                ArtifactKind::Codemeta => r#"{"@context": "https://w3id.org/codemeta/3.0", "name": "tool"}"#,
                _ => "text\n",
            };
            host = host.with_file(kind.target_path().unwrap(), content);
        }
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);

        let report = auditor
            .run(&RepoRef::new("lab", "tool"), RunOptions::default())
            .await
            .unwrap();
        assert!(report.is_compliant());
        assert_eq!(
            report.get(ArtifactKind::Citation).unwrap().quality,
            Some(QualityStatus::Valid)
        );
    }

    #[tokio::test]
    async fn test_merged_pull_request_link_is_cleared() {
        let host = partial_repo();
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");
        auditor.run(&repo, RunOptions::default()).await.unwrap();

        let info = RepoInfo::new("lab", "tool");
        let outcome = WorkflowDriver::new(&host, &db, &config.bot)
            .remediate(
                &info,
                RemediationRequest {
                    artifact: ArtifactKind::Readme,
                    content: "# tool\n".to_string(),
                },
            )
            .await
            .unwrap();
        let RemediationOutcome::Opened { number, url, .. } = outcome else {
            panic!("expected a pull request");
        };

        // Still open: the link survives a run
        let report = auditor.run(&repo, RunOptions::default()).await.unwrap();
        let readme = report.get(ArtifactKind::Readme).unwrap();
        assert_eq!(readme.pull_request_url.as_deref(), Some(url.as_str()));
        assert!(render_report(&report, &config.bot).contains(&url));

        host.merge_pull_request(number);

        let report = auditor.run(&repo, RunOptions::default()).await.unwrap();
        let readme = report.get(ArtifactKind::Readme).unwrap();
        assert!(readme.present);
        assert_eq!(readme.path, "README.md");
        assert_eq!(readme.pull_request_url, None);
        assert_eq!(
            db.get_record(&repo, ArtifactKind::Readme)
                .unwrap()
                .unwrap()
                .pull_request_url,
            None
        );
        assert!(!render_report(&report, &config.bot).contains(&url));
    }

    #[tokio::test]
    async fn test_closed_pull_request_link_is_cleared() {
        let host = partial_repo();
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");
        auditor.run(&repo, RunOptions::default()).await.unwrap();

        WorkflowDriver::new(&host, &db, &config.bot)
            .remediate(
                &RepoInfo::new("lab", "tool"),
                RemediationRequest {
                    artifact: ArtifactKind::License,
                    content: "MIT License\n".to_string(),
                },
            )
            .await
            .unwrap();
        let number = host.pull_requests()[0].number;
        host.close_pull_request(number);

        let report = auditor.run(&repo, RunOptions::default()).await.unwrap();
        let license = report.get(ArtifactKind::License).unwrap();
        assert!(!license.present);
        assert_eq!(license.pull_request_url, None);
        assert_eq!(db.stats().unwrap().pull_requests, 0);
    }

    #[tokio::test]
    async fn test_links_kept_when_pull_requests_cannot_be_listed() {
        let host = partial_repo();
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");
        auditor.run(&repo, RunOptions::default()).await.unwrap();

        WorkflowDriver::new(&host, &db, &config.bot)
            .remediate(
                &RepoInfo::new("lab", "tool"),
                RemediationRequest {
                    artifact: ArtifactKind::Readme,
                    content: "# tool\n".to_string(),
                },
            )
            .await
            .unwrap();
        host.fail_next(
            "list_pull_requests",
            HostError::Api {
                status: 502,
                message: "Bad Gateway".to_string(),
            },
        );

        let report = auditor.run(&repo, RunOptions::default()).await.unwrap();
        assert!(report.get(ArtifactKind::Readme).unwrap().pull_request_url.is_some());
    }

    #[tokio::test]
    async fn test_pending_markers_are_served() {
        let host = partial_repo();
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let auditor = Auditor::new(&host, &db, &config);
        let repo = RepoRef::new("lab", "tool");

        assert!(auditor.run_pending(&repo).await.unwrap().is_none());

        let report = auditor.run(&repo, RunOptions::default()).await.unwrap();
        auditor.sync_dashboard(&report, &[]).await.unwrap();
        Dashboard::new(&host, &config.bot)
            .request(&repo, MarkerAction::RerunWorkflowValidation)
            .await
            .unwrap();

        let (report, update) = auditor.run_pending(&repo).await.unwrap().unwrap();
        assert!(report.workflows.is_some());
        assert_eq!(update.label(), "updated");
        assert!(Dashboard::new(&host, &config.bot)
            .pending(&repo)
            .await
            .unwrap()
            .is_empty());
    }
}
