//! DOI extraction from free text

use regex::Regex;
use std::sync::LazyLock;

const DOI_PATTERN: &str = r"10\.\d{4,9}/[-._;/:a-z0-9]+";

static DOI_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)doi\.org/({})", DOI_PATTERN)).expect("valid regex")
});

static DOI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b({})", DOI_PATTERN)).expect("valid regex"));

/// Find the DOI a README most likely refers to
///
/// Resolver links (`https://doi.org/...`) win over bare DOIs, which would
/// otherwise pick up badge image paths such as `.../badge/DOI/10.5281/zenodo.1.svg`.
pub fn extract_doi(text: &str) -> Option<String> {
    let captured = DOI_LINK_RE
        .captures(text)
        .or_else(|| DOI_RE.captures(text))?;

    let doi = captured
        .get(1)?
        .as_str()
        .trim_end_matches(['.', ',', ';', ':', '/']);

    if doi.contains('/') && !doi.ends_with('/') {
        Some(doi.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_resolver_link_over_badge_path() {
        let readme = "[![DOI](https://zenodo.org/badge/DOI/10.5281/zenodo.1234.svg)]\
                      (https://doi.org/10.5281/zenodo.1234)";
        assert_eq!(extract_doi(readme).as_deref(), Some("10.5281/zenodo.1234"));
    }

    #[test]
    fn test_bare_doi_and_trailing_punctuation() {
        let readme = "Please cite doi:10.1000/XYZ-123.4; thanks.";
        assert_eq!(extract_doi(readme).as_deref(), Some("10.1000/XYZ-123.4"));

        let sentence = "See 10.21105/joss.01234.";
        assert_eq!(extract_doi(sentence).as_deref(), Some("10.21105/joss.01234"));
    }

    #[test]
    fn test_no_doi() {
        assert_eq!(extract_doi("version 10.2 released"), None);
        assert_eq!(extract_doi(""), None);
    }
}
