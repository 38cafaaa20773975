//! Metadata synthesizer
//!
//! Gathers repository signals from the hosting API (contributors, profiles,
//! languages, README DOI, latest release) and builds CITATION.cff and codemeta.json
//! documents from them. Gathering never aborts: a signal that cannot be fetched
//! degrades to an empty value and is recorded as a `PartialMetadataWarning`.

mod citation;
mod codemeta;
mod doi;
mod names;
mod validate;

pub use citation::{build_citation, CFF_VERSION};
pub use codemeta::{build_codemeta, CODEMETA_CONTEXT};
pub use doi::extract_doi;
pub use names::{parse_name, ParsedName};
pub use validate::{assess, validate_citation, validate_codemeta};

use crate::checks::{check_artifact, ArtifactKind};
use crate::content::ContentReader;
use crate::error::{FairError, PartialMetadataWarning};
use crate::host::{HostingApi, Release, RepoInfo, UserProfile};
use crate::logging::Logger;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

/// A resolved, non-bot author
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub login: String,
    pub given_names: String,
    pub family_names: Option<String>,
    pub affiliation: Option<String>,
    pub email: Option<String>,
}

impl Author {
    /// Build an author from a public profile; a profile without a display name
    /// falls back to the login as given name
    pub fn from_profile(login: &str, profile: &UserProfile) -> Self {
        let parsed = profile.name.as_deref().and_then(parse_name);

        let (given_names, family_names) = match parsed {
            Some(ParsedName { given, family }) => (given, family),
            None => (login.to_string(), None),
        };

        Self {
            login: login.to_string(),
            given_names,
            family_names,
            affiliation: profile
                .company
                .as_deref()
                .map(|c| c.trim().trim_start_matches('@').trim().to_string())
                .filter(|c| !c.is_empty()),
            email: profile
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
        }
    }

    fn from_login(login: &str) -> Self {
        Self {
            login: login.to_string(),
            given_names: login.to_string(),
            family_names: None,
            affiliation: None,
            email: None,
        }
    }
}

/// Everything the document builders need
#[derive(Debug, Clone, Serialize)]
pub struct Signals {
    pub repo: RepoInfo,
    pub authors: Vec<Author>,
    /// Languages, most bytes first
    pub languages: Vec<String>,
    pub doi: Option<String>,
    #[serde(skip)]
    pub release: Option<Release>,
    pub warnings: Vec<PartialMetadataWarning>,
}

impl Signals {
    /// Signals carrying only the repository description
    pub fn new(repo: RepoInfo) -> Self {
        Self {
            repo,
            authors: Vec::new(),
            languages: Vec::new(),
            doi: None,
            release: None,
            warnings: Vec::new(),
        }
    }

    /// Homepage, falling back to the repository page
    pub fn homepage(&self) -> &str {
        self.repo
            .homepage
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(self.repo.html_url.as_str())
    }

    /// SPDX id, ignoring the platform's "unknown license" placeholder
    pub fn license(&self) -> Option<&str> {
        self.repo
            .license_spdx
            .as_deref()
            .filter(|l| !l.is_empty() && *l != "NOASSERTION")
    }

    pub fn release_date(&self) -> Option<NaiveDate> {
        self.release
            .as_ref()
            .and_then(|r| r.published_at)
            .map(|t| t.date_naive())
    }
}

/// A synthesized document with the warnings raised while gathering its inputs
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub artifact: ArtifactKind,
    pub content: String,
    pub warnings: Vec<PartialMetadataWarning>,
}

/// Gathers signals and builds metadata documents
pub struct Synthesizer<'a> {
    host: &'a dyn HostingApi,
    logger: Logger,
}

impl<'a> Synthesizer<'a> {
    pub fn new(host: &'a dyn HostingApi) -> Self {
        Self {
            host,
            logger: Logger::new("synth"),
        }
    }

    /// Collect signals for `info`. When the README text is already known it is
    /// used as-is, otherwise it is looked up.
    pub async fn gather(&self, info: &RepoInfo, readme: Option<&str>) -> Signals {
        let repo = info.repo_ref();
        let mut signals = Signals::new(info.clone());

        match self.host.list_contributors(&repo).await {
            Ok(contributors) => {
                for contributor in contributors.iter().filter(|c| !c.is_bot()) {
                    match self.host.get_user(&contributor.login).await {
                        Ok(profile) => signals
                            .authors
                            .push(Author::from_profile(&contributor.login, &profile)),
                        Err(e) => {
                            signals.warnings.push(PartialMetadataWarning::new(
                                format!("authors.{}", contributor.login),
                                e,
                            ));
                            signals.authors.push(Author::from_login(&contributor.login));
                        }
                    }
                }
            }
            Err(e) => signals
                .warnings
                .push(PartialMetadataWarning::new("authors", e)),
        }

        match self.host.list_languages(&repo).await {
            Ok(languages) => {
                let mut ranked: Vec<(String, u64)> = languages.into_iter().collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                signals.languages = ranked.into_iter().map(|(name, _)| name).collect();
            }
            Err(e) => signals
                .warnings
                .push(PartialMetadataWarning::new("programmingLanguage", e)),
        }

        signals.doi = match readme {
            Some(text) => extract_doi(text),
            None => {
                let reader = ContentReader::new(self.host, &repo);
                match check_artifact(&reader, ArtifactKind::Readme).await {
                    Ok(result) => extract_doi(&result.content),
                    Err(e) => {
                        signals
                            .warnings
                            .push(PartialMetadataWarning::new("identifier", e));
                        None
                    }
                }
            }
        };

        match self.host.latest_release(&repo).await {
            Ok(release) => signals.release = release,
            Err(e) => signals
                .warnings
                .push(PartialMetadataWarning::new("date-released", e)),
        }

        for warning in &signals.warnings {
            self.logger.warn(
                "metadata field degraded",
                Some(&json!({
                    "repository": repo.full_name(),
                    "field": warning.field,
                    "reason": warning.reason,
                })),
            );
        }

        signals
    }

    /// Gather signals and build the document for `artifact`
    pub async fn synthesize(
        &self,
        info: &RepoInfo,
        artifact: ArtifactKind,
        readme: Option<&str>,
        today: NaiveDate,
    ) -> Result<Synthesis, FairError> {
        if !matches!(artifact, ArtifactKind::Citation | ArtifactKind::Codemeta) {
            return Err(FairError::NotRemediable(artifact));
        }

        let signals = self.gather(info, readme).await;
        let content = build_document(artifact, &signals, today)?;

        Ok(Synthesis {
            artifact,
            content,
            warnings: signals.warnings,
        })
    }
}

/// Build the document for a synthesizable artifact from gathered signals
pub fn build_document(
    artifact: ArtifactKind,
    signals: &Signals,
    today: NaiveDate,
) -> Result<String, FairError> {
    match artifact {
        ArtifactKind::Citation => build_citation(signals, today),
        ArtifactKind::Codemeta => build_codemeta(signals),
        other => Err(FairError::NotRemediable(other)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::host::{HostError, MockHost};
    use chrono::{TimeZone, Utc};

    pub(crate) fn sample_signals() -> Signals {
        let mut repo = RepoInfo::new("lab", "tool");
        repo.license_spdx = Some("MIT".to_string());
        repo.topics = vec!["fair".to_string(), "research-software".to_string()];

        let mut signals = Signals::new(repo);
        signals.authors = vec![
            Author {
                login: "ada".to_string(),
                given_names: "Ada".to_string(),
                family_names: Some("Lovelace".to_string()),
                affiliation: Some("Analytical Engines".to_string()),
                email: Some("ada@example.org".to_string()),
            },
            Author::from_login("octocat"),
        ];
        signals.languages = vec!["Rust".to_string(), "Python".to_string()];
        signals.doi = Some("10.5281/zenodo.1234".to_string());
        signals
    }

    fn profile(login: &str, name: &str, company: Option<&str>) -> Option<UserProfile> {
        Some(UserProfile {
            login: login.to_string(),
            name: Some(name.to_string()),
            company: company.map(str::to_string),
            email: None,
        })
    }

    fn host() -> MockHost {
        MockHost::new(RepoInfo::new("lab", "tool"))
            .with_file(
                "README.md",
                "# tool\n[![DOI](https://zenodo.org/badge/DOI/10.5281/zenodo.99.svg)](https://doi.org/10.5281/zenodo.99)\n",
            )
            .with_contributor("ada", "User", profile("ada", "Ada Lovelace", Some("@engines")))
            .with_contributor("dependabot[bot]", "Bot", None)
            .with_contributor("grace", "User", profile("grace", "Hopper, Grace", None))
            .with_language("Python", 100)
            .with_language("Rust", 5000)
            .with_language("Makefile", 100)
            .with_release(Release {
                tag_name: "v1.0.0".to_string(),
                published_at: Some(Utc.with_ymd_and_hms(2023, 3, 14, 12, 0, 0).unwrap()),
            })
    }

    #[tokio::test]
    async fn test_gather_excludes_bots_and_parses_names() {
        let host = host();
        let signals = Synthesizer::new(&host)
            .gather(&RepoInfo::new("lab", "tool"), None)
            .await;

        assert!(signals.warnings.is_empty());
        assert_eq!(signals.authors.len(), 2);
        assert_eq!(signals.authors[0].family_names.as_deref(), Some("Lovelace"));
        assert_eq!(signals.authors[0].affiliation.as_deref(), Some("engines"));
        assert_eq!(signals.authors[1].given_names, "Grace");
        assert_eq!(signals.languages, vec!["Rust", "Makefile", "Python"]);
        assert_eq!(signals.doi.as_deref(), Some("10.5281/zenodo.99"));
        assert_eq!(
            signals.release_date(),
            NaiveDate::from_ymd_opt(2023, 3, 14)
        );
        assert!(host.calls("get_user").iter().all(|login| !login.contains("[bot]")));
    }

    #[tokio::test]
    async fn test_gather_degrades_with_warnings() {
        let host = host();
        host.fail_next(
            "list_languages",
            HostError::Api {
                status: 500,
                message: "boom".to_string(),
            },
        );
        host.fail_next("get_user", HostError::NotFound);

        let signals = Synthesizer::new(&host)
            .gather(&RepoInfo::new("lab", "tool"), Some("no identifiers here"))
            .await;

        assert!(signals.languages.is_empty());
        assert_eq!(signals.doi, None);
        assert_eq!(signals.authors.len(), 2);
        assert_eq!(signals.authors[0].given_names, "ada");

        let fields: Vec<&str> = signals.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["authors.ada", "programmingLanguage"]);
    }

    #[tokio::test]
    async fn test_synthesis_is_idempotent() {
        let host = host();
        let info = RepoInfo::new("lab", "tool");
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let synth = Synthesizer::new(&host);

        for artifact in [ArtifactKind::Citation, ArtifactKind::Codemeta] {
            let first = synth.synthesize(&info, artifact, None, today).await.unwrap();
            let second = synth.synthesize(&info, artifact, None, today).await.unwrap();
            assert_eq!(first.content, second.content);
        }
    }

    #[tokio::test]
    async fn test_only_metadata_documents_are_synthesized() {
        let host = host();
        let result = Synthesizer::new(&host)
            .synthesize(
                &RepoInfo::new("lab", "tool"),
                ArtifactKind::Readme,
                None,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            )
            .await;
        assert!(matches!(result, Err(FairError::NotRemediable(ArtifactKind::Readme))));
    }
}
