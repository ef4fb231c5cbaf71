//! Aggregates over storage records that read public fields only.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classification::EntityKind;
use crate::codec::Record;

/// Bucket for records where a dimension is missing or null.
pub const UNKNOWN_BUCKET: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub entity: EntityKind,
    pub total: usize,
    /// Dimension field, then value, then count.
    pub by_field: BTreeMap<String, BTreeMap<String, usize>>,
    /// `YYYY-MM` of the period field, then count. Unparseable dates are skipped.
    pub by_month: BTreeMap<String, usize>,
}

fn bucket(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => UNKNOWN_BUCKET.to_string(),
        Some(Value::String(s)) if s.is_empty() => UNKNOWN_BUCKET.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `YYYY-MM` of an RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
pub fn month_of(text: &str) -> Option<String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.format("%Y-%m").to_string());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m").to_string())
}

/// Build the report for `records` of `kind`. Envelopes are never read.
pub fn analytics(kind: EntityKind, records: &[Record]) -> AnalyticsReport {
    let mut by_field: BTreeMap<String, BTreeMap<String, usize>> = kind
        .dimension_fields()
        .iter()
        .map(|f| (f.to_string(), BTreeMap::new()))
        .collect();
    let mut by_month = BTreeMap::new();

    for record in records {
        for field in kind.dimension_fields() {
            let counts = by_field.entry(field.to_string()).or_default();
            *counts.entry(bucket(record.get(*field))).or_default() += 1;
        }
        if let Some(month) = record
            .get(kind.period_field())
            .and_then(Value::as_str)
            .and_then(month_of)
        {
            *by_month.entry(month).or_default() += 1;
        }
    }

    AnalyticsReport {
        entity: kind,
        total: records.len(),
        by_field,
        by_month,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn counts_citizens_by_dimension_and_month() {
        let rows = records(vec![
            json!({"city": "Springfield", "status": "active", "registrationDate": "2024-01-15",
                   "firstName_encrypted": "{\"cipher\":\"x\",\"iv\":\"y\"}"}),
            json!({"city": "Springfield", "status": "inactive", "registrationDate": "2024-01-31T10:00:00Z"}),
            json!({"city": "Shelbyville", "registrationDate": "2024-02-01"}),
        ]);
        let report = analytics(EntityKind::Citizen, &rows);

        assert_eq!(report.total, 3);
        assert_eq!(report.by_field["city"]["Springfield"], 2);
        assert_eq!(report.by_field["city"]["Shelbyville"], 1);
        assert_eq!(report.by_field["status"][UNKNOWN_BUCKET], 1);
        assert_eq!(report.by_field["gender"][UNKNOWN_BUCKET], 3);
        assert_eq!(report.by_month["2024-01"], 2);
        assert_eq!(report.by_month["2024-02"], 1);
        assert!(!report.by_field.contains_key("firstName"));
    }

    #[test]
    fn service_request_dimensions() {
        let rows = records(vec![
            json!({"serviceType": "pothole", "priority": "high", "agencyId": 7, "submittedDate": "garbage"}),
        ]);
        let report = analytics(EntityKind::ServiceRequest, &rows);
        assert_eq!(report.by_field["agencyId"]["7"], 1);
        assert_eq!(report.by_field["priority"]["high"], 1);
        assert!(report.by_month.is_empty());
    }

    #[test]
    fn empty_input() {
        let report = analytics(EntityKind::Citizen, &[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.by_field.len(), 4);
        assert!(report.by_field.values().all(BTreeMap::is_empty));
    }

    #[test]
    fn month_parsing() {
        assert_eq!(month_of("2023-12-01T23:59:59-05:00").as_deref(), Some("2023-12"));
        assert_eq!(month_of("2023-07-04").as_deref(), Some("2023-07"));
        assert_eq!(month_of("July 4th"), None);
    }
}
