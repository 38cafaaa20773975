//! Quality checks for existing metadata documents

use crate::checks::ArtifactKind;
use crate::storage::QualityStatus;

/// A CITATION.cff must be a YAML mapping with `cff-version`, `message`, `title` and
/// at least one author
pub fn validate_citation(text: &str) -> QualityStatus {
    let Ok(doc) = serde_yaml::from_str::<serde_yaml::Value>(text) else {
        return QualityStatus::Invalid;
    };
    if !doc.is_mapping() {
        return QualityStatus::Invalid;
    }

    let has_text = |key: &str| {
        doc.get(key).is_some_and(|v| match v {
            serde_yaml::Value::String(s) => !s.trim().is_empty(),
            serde_yaml::Value::Number(_) => true,
            _ => false,
        })
    };
    let has_authors = doc
        .get("authors")
        .and_then(|v| v.as_sequence())
        .is_some_and(|authors| !authors.is_empty());

    if has_text("cff-version") && has_text("message") && has_text("title") && has_authors {
        QualityStatus::Valid
    } else {
        QualityStatus::Invalid
    }
}

/// A codemeta.json must be a JSON object with `@context` and `name`
pub fn validate_codemeta(text: &str) -> QualityStatus {
    let Ok(doc) = serde_json::from_str::<serde_json::Value>(text) else {
        return QualityStatus::Invalid;
    };

    let context_ok = doc.get("@context").is_some_and(|c| !c.is_null());
    let name_ok = doc
        .get("name")
        .and_then(|n| n.as_str())
        .is_some_and(|n| !n.trim().is_empty());

    if doc.is_object() && context_ok && name_ok {
        QualityStatus::Valid
    } else {
        QualityStatus::Invalid
    }
}

/// Quality of a present artifact
pub fn assess(kind: ArtifactKind, text: &str) -> QualityStatus {
    match kind {
        ArtifactKind::Citation => validate_citation(text),
        ArtifactKind::Codemeta => validate_codemeta(text),
        _ => QualityStatus::Unchecked,
    }
}
