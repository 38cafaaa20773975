//! Citation File Format (CFF 1.2.0) builder

use super::Signals;
use crate::error::FairError;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};

pub const CFF_VERSION: &str = "1.2.0";

const MESSAGE: &str = "If you use this software, please cite it using the metadata from this file.";

/// Build a CITATION.cff document
///
/// Keys are ordered lexicographically at every level, so equal signals always
/// produce byte-identical output.
pub fn build_citation(signals: &Signals, today: NaiveDate) -> Result<String, FairError> {
    let repo = &signals.repo;
    let mut doc = Map::new();

    doc.insert("cff-version".into(), json!(CFF_VERSION));
    doc.insert("type".into(), json!("software"));
    doc.insert("title".into(), json!(repo.name));
    doc.insert("message".into(), json!(MESSAGE));
    doc.insert("authors".into(), Value::Array(authors(signals)));
    doc.insert(
        "identifiers".into(),
        json!([{
            "type": "doi",
            "value": signals.doi.clone().unwrap_or_default(),
            "description": "DOI for this software",
        }]),
    );
    doc.insert("repository-code".into(), json!(repo.html_url));
    doc.insert("url".into(), json!(signals.homepage()));
    doc.insert(
        "date-released".into(),
        json!(signals
            .release_date()
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string()),
    );

    if let Some(license) = signals.license() {
        doc.insert("license".into(), json!(license));
    }
    if let Some(ref description) = repo.description {
        doc.insert("abstract".into(), json!(description));
    }
    if !repo.topics.is_empty() {
        doc.insert("keywords".into(), json!(repo.topics));
    }
    if let Some(ref release) = signals.release {
        doc.insert("version".into(), json!(release.tag_name));
    }

    serde_yaml::to_string(&Value::Object(doc)).map_err(|e| FairError::Serialize(e.to_string()))
}

fn authors(signals: &Signals) -> Vec<Value> {
    if signals.authors.is_empty() {
        // CFF requires at least one author; fall back to the owning account
        return vec![json!({ "name": signals.repo.owner })];
    }

    signals
        .authors
        .iter()
        .map(|author| {
            let mut entry = Map::new();
            entry.insert("given-names".into(), json!(author.given_names));
            if let Some(ref family) = author.family_names {
                entry.insert("family-names".into(), json!(family));
            }
            if let Some(ref affiliation) = author.affiliation {
                entry.insert("affiliation".into(), json!(affiliation));
            }
            if let Some(ref email) = author.email {
                entry.insert("email".into(), json!(email));
            }
            Value::Object(entry)
        })
        .collect()
}
