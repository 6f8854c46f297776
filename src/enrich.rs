use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::config::TransformerConfig;
use crate::constants::{DAYS_PER_YEAR, HIGH_RISK_STATUSES, RISK_LEVEL_FIELD, SYSTEM_AGE_FIELD};
use crate::dates::parse_installation_date;
use crate::types::{Document, FieldValue, RiskLevel};

/// Classify risk from a lifecycle status. Absent status is low risk.
pub fn derive_risk(status: Option<&str>) -> RiskLevel {
    match status {
        Some(s) if HIGH_RISK_STATUSES.contains(&s.trim().to_lowercase().as_str()) => {
            RiskLevel::High
        }
        _ => RiskLevel::Low,
    }
}

/// Whole years elapsed since `installed`, floored and never negative.
pub fn compute_system_age_years(installed: Option<NaiveDate>, now: DateTime<Utc>) -> Option<u32> {
    let installed = installed?.and_hms_opt(0, 0, 0)?.and_utc();
    let elapsed_days = (now - installed).num_seconds() as f64 / 86_400.0;
    let years = (elapsed_days / DAYS_PER_YEAR).floor();
    Some(years.max(0.0) as u32)
}

/// The two derived fields computed for one document
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub risk_level: RiskLevel,
    pub system_age: Option<u32>,
    /// A date field was present but could not be parsed
    pub unparseable_date: bool,
}

impl Derived {
    /// Partial document carrying exactly `risk_level` and `system_age`.
    pub fn to_partial(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(RISK_LEVEL_FIELD, self.risk_level.as_str());
        doc.insert(SYSTEM_AGE_FIELD, self.system_age.map(i64::from));
        doc
    }
}

/// Computes derived fields using the configured field names
pub struct Enricher<'a> {
    config: &'a TransformerConfig,
}

impl<'a> Enricher<'a> {
    pub fn new(config: &'a TransformerConfig) -> Self {
        Self { config }
    }

    fn installation_date(&self, doc: &Document) -> (Option<NaiveDate>, bool) {
        let value = self
            .config
            .date_fields
            .iter()
            .find_map(|field| doc.get(field).filter(|v| !v.is_null()));

        match value {
            None => (None, false),
            Some(FieldValue::Date(d)) => (Some(*d), false),
            Some(FieldValue::Text(s)) => match parse_installation_date(s) {
                Some(d) => (Some(d), false),
                None => {
                    debug!("Unparseable installation date '{}'", s);
                    (None, true)
                }
            },
            Some(other) => {
                debug!("Installation date has non-text value {:?}", other);
                (None, true)
            }
        }
    }

    pub fn derive(&self, doc: &Document, now: DateTime<Utc>) -> Derived {
        let risk_level = derive_risk(doc.text(&self.config.status_field));
        let (installed, unparseable_date) = self.installation_date(doc);
        Derived {
            risk_level,
            system_age: compute_system_age_years(installed, now),
            unparseable_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_derive_risk() {
        assert_eq!(derive_risk(Some("EOL")), RiskLevel::High);
        assert_eq!(derive_risk(Some("eos")), RiskLevel::High);
        assert_eq!(derive_risk(Some(" End of Life ")), RiskLevel::High);
        assert_eq!(derive_risk(Some("end-of-support")), RiskLevel::High);
        assert_eq!(derive_risk(Some("Supported")), RiskLevel::Low);
        assert_eq!(derive_risk(None), RiskLevel::Low);
    }

    #[test]
    fn test_system_age_years() {
        let now = fixed_now();
        let installed = (now - Duration::days(400)).date_naive();
        assert_eq!(compute_system_age_years(Some(installed), now), Some(1));
        assert_eq!(compute_system_age_years(None, now), None);

        let installed = NaiveDate::from_ymd_opt(2014, 6, 1).unwrap();
        assert_eq!(compute_system_age_years(Some(installed), now), Some(10));
    }

    #[test]
    fn test_system_age_never_negative() {
        let now = fixed_now();
        let future = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert_eq!(compute_system_age_years(Some(future), now), Some(0));
    }

    #[test]
    fn test_enricher_uses_first_present_date_field() {
        let config = TransformerConfig::default();
        let enricher = Enricher::new(&config);

        let mut doc = Document::new();
        doc.insert("operating_system_lifecycle_status", "eol");
        doc.insert("operating_system_installation_date", "2020-06-01");

        let derived = enricher.derive(&doc, fixed_now());
        assert_eq!(derived.risk_level, RiskLevel::High);
        assert_eq!(derived.system_age, Some(4));
        assert!(!derived.unparseable_date);

        doc.insert("installation_date", "01/06/2022");
        let derived = enricher.derive(&doc, fixed_now());
        // MM/DD/YYYY comes before DD/MM/YYYY: January 6th
        assert_eq!(derived.system_age, Some(2));
    }

    #[test]
    fn test_enricher_unparseable_date_yields_null_age() {
        let config = TransformerConfig::default();
        let enricher = Enricher::new(&config);

        let mut doc = Document::new();
        doc.insert("installation_date", "unknown");

        let derived = enricher.derive(&doc, fixed_now());
        assert_eq!(derived.risk_level, RiskLevel::Low);
        assert_eq!(derived.system_age, None);
        assert!(derived.unparseable_date);

        let partial = derived.to_partial();
        assert_eq!(partial.len(), 2);
        assert_eq!(partial.text("risk_level"), Some("Low"));
        assert_eq!(partial.get("system_age"), Some(&FieldValue::Null));
    }
}
