//! Recursive discovery of workflow-description files

use crate::config::ScanConfig;
use crate::content::ContentReader;
use crate::error::FairError;
use crate::host::EntryKind;

/// Walk the default branch depth-first and collect every file whose name ends with
/// one of the configured suffixes. Missing directories (including the root of an
/// empty repository) contribute nothing. Returned paths are sorted.
pub async fn find_workflow_files(
    reader: &ContentReader<'_>,
    scan: &ScanConfig,
) -> Result<Vec<String>, FairError> {
    let mut found = Vec::new();
    let mut pending: Vec<(String, usize)> = vec![(String::new(), 0)];

    while let Some((dir, depth)) = pending.pop() {
        let entries = reader.get_tree(&dir).await?;

        // Reverse so the first subdirectory is visited next
        for entry in entries.into_iter().rev() {
            match entry.kind {
                EntryKind::File => {
                    if matches_suffix(&entry.name, &scan.workflow_suffixes) {
                        found.push(entry.path);
                    }
                }
                EntryKind::Dir => {
                    if depth < scan.max_depth {
                        pending.push((entry.path, depth + 1));
                    }
                }
            }
        }
    }

    found.sort();
    Ok(found)
}

fn matches_suffix(name: &str, suffixes: &[String]) -> bool {
    let lower = name.to_lowercase();
    suffixes
        .iter()
        .any(|suffix| lower.ends_with(&suffix.to_lowercase()))
}
