//! Markdown rendering of a compliance report for the tracking issue

use super::ComplianceReport;
use crate::checks::ArtifactKind;
use crate::config::BotConfig;
use std::fmt::Write;

/// Render the tracking-issue body for `report`
///
/// The output depends only on the report content (no timestamps), so an unchanged
/// repository renders to an unchanged body.
pub fn render_report(report: &ComplianceReport, bot: &BotConfig) -> String {
    let repo = &report.repository;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "This issue is maintained by {}. It tracks how `{}/{}` meets the FAIR \
         software recommendations.\n",
        bot.login(),
        repo.owner,
        repo.name
    );

    let verdict = if report.is_compliant() {
        ":white_check_mark: All recommended files are present."
    } else {
        ":warning: Some recommended files are missing or invalid."
    };
    let _ = writeln!(out, "{}\n", verdict);

    out.push_str("| Artifact | Status | Location | Pull request |\n");
    out.push_str("| --- | --- | --- | --- |\n");

    for kind in ArtifactKind::FIXED {
        let row = match report.get(kind) {
            Some(record) => {
                let icon = if record.present && !report.is_invalid(kind) {
                    ":white_check_mark:"
                } else {
                    ":x:"
                };
                let location = if record.present {
                    format!("`{}`", record.path)
                } else {
                    record.path.clone()
                };
                let pr = record
                    .pull_request_url
                    .as_deref()
                    .map(|url| format!("[open]({})", url))
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "| {} | {} {} | {} | {} |",
                    kind.title(),
                    icon,
                    record.status_label(),
                    location,
                    pr
                )
            }
            None => format!("| {} | :grey_question: unknown | - | - |", kind.title()),
        };
        out.push_str(&row);
        out.push('\n');
    }

    if !report.failures.is_empty() {
        out.push_str("\n### Could not be checked\n\n");
        for failure in &report.failures {
            let _ = writeln!(out, "- **{}**: {}", failure.artifact.title(), failure.error);
        }
    }

    if let Some(ref workflows) = report.workflows {
        out.push_str("\n### Workflow descriptions\n\n");
        if workflows.is_empty() {
            out.push_str("No workflow description files found.\n");
        } else {
            for path in workflows {
                let _ = writeln!(out, "- `{}`", path);
            }
        }
    }

    if !report.drafted.is_empty() {
        out.push_str("\n### Drafted metadata\n\n");
        for kind in &report.drafted {
            let _ = writeln!(
                out,
                "- `{}` was drafted from repository metadata and can be proposed with \
                 `fairgate remediate --repo {}/{} {}`.",
                kind.target_path().unwrap_or_default(),
                repo.owner,
                repo.name,
                kind.key()
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::tests::report_with;

    #[test]
    fn test_render_lists_every_fixed_artifact() {
        let report = report_with(&[ArtifactKind::Readme, ArtifactKind::Contributing]);
        let body = render_report(&report, &BotConfig::default());

        for kind in ArtifactKind::FIXED {
            assert!(body.contains(kind.title()), "missing row for {}", kind);
        }
        assert!(body.contains("fairgate[bot]"));
        assert!(body.contains("No LICENSE file found"));
        assert!(body.contains("`README.md`"));
        assert!(body.contains(":warning:"));
    }

    #[test]
    fn test_render_is_stable() {
        let report = report_with(&[ArtifactKind::License]);
        let bot = BotConfig::default();
        assert_eq!(render_report(&report, &bot), render_report(&report, &bot));
    }
}
