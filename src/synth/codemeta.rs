//! CodeMeta 3.0 builder

use super::Signals;
use crate::error::FairError;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

pub const CODEMETA_CONTEXT: &str = "https://w3id.org/codemeta/3.0";

/// Build a codemeta.json document (pretty JSON, sorted keys, trailing newline)
pub fn build_codemeta(signals: &Signals) -> Result<String, FairError> {
    let repo = &signals.repo;
    let mut doc = Map::new();

    doc.insert("@context".into(), json!(CODEMETA_CONTEXT));
    doc.insert("@type".into(), json!("SoftwareSourceCode"));
    doc.insert("name".into(), json!(repo.name));
    doc.insert("codeRepository".into(), json!(repo.html_url));
    doc.insert("url".into(), json!(signals.homepage()));
    doc.insert("issueTracker".into(), json!(issue_tracker(&repo.issues_url)));
    doc.insert("author".into(), Value::Array(authors(signals)));

    if let Some(ref description) = repo.description {
        doc.insert("description".into(), json!(description));
    }
    if let Some(license) = signals.license() {
        doc.insert(
            "license".into(),
            json!(format!("https://spdx.org/licenses/{}", license)),
        );
    }
    if !signals.languages.is_empty() {
        doc.insert("programmingLanguage".into(), json!(signals.languages));
    }
    if !repo.topics.is_empty() {
        doc.insert("keywords".into(), json!(repo.topics));
    }
    if let Some(created) = repo.created_at {
        doc.insert("dateCreated".into(), json!(date(created)));
    }
    if let Some(modified) = repo.updated_at {
        doc.insert("dateModified".into(), json!(date(modified)));
    }
    if let Some(published) = signals.release_date() {
        doc.insert(
            "datePublished".into(),
            json!(published.format("%Y-%m-%d").to_string()),
        );
    }
    if let Some(ref doi) = signals.doi {
        doc.insert("identifier".into(), json!(format!("https://doi.org/{}", doi)));
    }
    if let Some(ref release) = signals.release {
        doc.insert("version".into(), json!(release.tag_name));
    }

    let mut text = serde_json::to_string_pretty(&Value::Object(doc))
        .map_err(|e| FairError::Serialize(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

/// Strip URI-template placeholders such as `{/number}`
fn issue_tracker(template: &str) -> String {
    match template.find('{') {
        Some(index) => template[..index].to_string(),
        None => template.to_string(),
    }
}

fn date(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn authors(signals: &Signals) -> Vec<Value> {
    signals
        .authors
        .iter()
        .map(|author| {
            let mut person = Map::new();
            person.insert("@type".into(), json!("Person"));
            person.insert("givenName".into(), json!(author.given_names));
            if let Some(ref family) = author.family_names {
                person.insert("familyName".into(), json!(family));
            }
            if let Some(ref email) = author.email {
                person.insert("email".into(), json!(email));
            }
            if let Some(ref affiliation) = author.affiliation {
                person.insert(
                    "affiliation".into(),
                    json!({ "@type": "Organization", "name": affiliation }),
                );
            }
            Value::Object(person)
        })
        .collect()
}
