use serde_json::{json, Value};

use crate::config::TransformerConfig;
use crate::constants::UNKNOWN;
use crate::types::{Document, FieldValue};

/// Invalidity checks for transformed records. Any single check is enough to
/// delete a document.
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeRule {
    pub hostname_field: String,
    pub provider_field: String,
    /// Lower-cased sentinel provider values
    pub invalid_providers: Vec<String>,
}

impl PurgeRule {
    pub fn from_config(config: &TransformerConfig) -> Self {
        Self {
            hostname_field: config.hostname_field.clone(),
            provider_field: config.provider_field.clone(),
            invalid_providers: config
                .invalid_providers
                .iter()
                .map(|p| p.trim().to_lowercase())
                .collect(),
        }
    }

    fn hostname_missing(&self, doc: &Document) -> bool {
        match doc.get(&self.hostname_field) {
            None | Some(FieldValue::Null) => true,
            Some(FieldValue::Text(s)) => s.is_empty() || s.eq_ignore_ascii_case(UNKNOWN),
            Some(_) => false,
        }
    }

    fn provider_is_sentinel(&self, doc: &Document) -> bool {
        doc.text(&self.provider_field)
            .map(|p| self.invalid_providers.contains(&p.to_lowercase()))
            .unwrap_or(false)
    }

    pub fn is_invalid(&self, doc: &Document) -> bool {
        self.hostname_missing(doc) || self.provider_is_sentinel(doc)
    }

    /// Render as an Elasticsearch `bool.should` query matching invalid documents.
    pub fn to_query(&self) -> Value {
        let hostname_kw = format!("{}.keyword", self.hostname_field);
        let provider_kw = format!("{}.keyword", self.provider_field);

        let mut should = vec![
            json!({ "bool": { "must_not": { "exists": { "field": self.hostname_field } } } }),
            json!({ "term": { hostname_kw.clone(): "" } }),
            json!({ "term": { hostname_kw: { "value": UNKNOWN, "case_insensitive": true } } }),
        ];
        should.extend(self.invalid_providers.iter().map(|sentinel| {
            json!({ "term": { provider_kw.clone(): { "value": sentinel, "case_insensitive": true } } })
        }));

        json!({
            "bool": {
                "should": should,
                "minimum_should_match": 1
            }
        })
    }
}
