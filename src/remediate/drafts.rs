//! Draft content for remediable artifacts

use crate::checks::ArtifactKind;
use crate::error::FairError;
use crate::host::{HostingApi, RepoInfo};
use crate::synth::Synthesizer;
use chrono::{Datelike, NaiveDate};

/// Inputs shared by every draft
pub struct DraftContext<'a> {
    pub info: &'a RepoInfo,
    /// License to propose; defaults to the one the platform detected
    pub spdx: Option<&'a str>,
    pub today: NaiveDate,
}

/// Produce the file content a remediation for `artifact` should propose
pub async fn draft_content(
    host: &dyn HostingApi,
    artifact: ArtifactKind,
    ctx: &DraftContext<'_>,
) -> Result<String, FairError> {
    match artifact {
        ArtifactKind::License => license(host, ctx).await,
        ArtifactKind::Readme => Ok(readme(ctx.info)),
        ArtifactKind::Contributing => Ok(contributing(ctx.info)),
        ArtifactKind::CodeOfConduct => Ok(code_of_conduct(ctx.info)),
        ArtifactKind::Citation | ArtifactKind::Codemeta => Synthesizer::new(host)
            .synthesize(ctx.info, artifact, None, ctx.today)
            .await
            .map(|synthesis| synthesis.content),
        ArtifactKind::Workflow => Err(FairError::NotRemediable(artifact)),
    }
}

async fn license(host: &dyn HostingApi, ctx: &DraftContext<'_>) -> Result<String, FairError> {
    let spdx = ctx
        .spdx
        .or(ctx.info.license_spdx.as_deref())
        .filter(|id| !id.is_empty() && *id != "NOASSERTION")
        .ok_or_else(|| FairError::NotFound {
            what: "license choice (pass an SPDX identifier)".to_string(),
        })?;

    let template = host.get_license_template(spdx).await.map_err(|e| {
        if e.is_not_found() {
            FairError::NotFound {
                what: format!("license template for {}", spdx),
            }
        } else {
            FairError::fetch(format!("fetch license template {}", spdx), e)
        }
    })?;

    Ok(fill_license(&template, ctx.today.year(), &ctx.info.owner))
}

/// Fill the `[year]` and `[fullname]` placeholders of a license template
pub fn fill_license(template: &str, year: i32, holder: &str) -> String {
    let mut text = template
        .replace("[year]", &year.to_string())
        .replace("[fullname]", holder);
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn readme(info: &RepoInfo) -> String {
    let mut text = format!("# {}\n\n", info.name);

    if let Some(ref description) = info.description {
        text.push_str(description.trim());
        text.push_str("\n\n");
    }

    text.push_str(&format!(
        "## Installation\n\n\
         Clone the repository:\n\n\
         ```sh\n\
         git clone {url}.git\n\
         ```\n\n\
         ## Usage\n\n\
         Describe how to run {name} and give a minimal example.\n\n\
         ## Contributing\n\n\
         Contributions are welcome. Please open an issue at {url}/issues before \
         starting larger changes.\n",
        url = info.html_url,
        name = info.name,
    ));

    if let Some(ref license) = info.license_spdx {
        text.push_str(&format!(
            "\n## License\n\nThis project is licensed under the {} license.\n",
            license
        ));
    }

    text
}

fn contributing(info: &RepoInfo) -> String {
    format!(
        "# Contributing to {name}\n\n\
         Thank you for taking the time to contribute.\n\n\
         ## Reporting issues\n\n\
         Search {url}/issues first. When opening a new issue, include the steps to \
         reproduce the problem, what you expected, and what happened instead.\n\n\
         ## Proposing changes\n\n\
         1. Fork the repository and create a branch from `{branch}`.\n\
         2. Keep each pull request focused on one change.\n\
         3. Add or update tests and documentation where relevant.\n\
         4. Open a pull request against `{branch}` describing the change.\n\n\
         ## Code of conduct\n\n\
         Everyone participating in this project is expected to follow its code of conduct.\n",
        name = info.name,
        url = info.html_url,
        branch = info.default_branch,
    )
}

fn code_of_conduct(info: &RepoInfo) -> String {
    format!(
        "# Code of Conduct\n\n\
         ## Our pledge\n\n\
         We want participation in {name} to be a harassment-free experience for \
         everyone, regardless of background or identity.\n\n\
         ## Expected behaviour\n\n\
         - Be respectful of differing viewpoints and experiences.\n\
         - Give and gracefully accept constructive feedback.\n\
         - Focus on what is best for the community.\n\n\
         ## Unacceptable behaviour\n\n\
         - Harassment, insults or derogatory comments.\n\
         - Publishing others' private information without permission.\n\n\
         ## Enforcement\n\n\
         Report unacceptable behaviour to the maintainers of {owner}/{name}. All \
         reports will be reviewed and handled confidentially.\n",
        name = info.name,
        owner = info.owner,
    )
}
