//! Cleaned per-user records.
//!
//! A record is built once per analysis run from a raw row and never
//! mutated afterwards. Numeric fields are always finite: anything missing
//! or unparsable reads as 0. Categorical fields read as "" when absent.

use crate::{
    schema::FieldSchema,
    types::{Outcome, UserId},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One raw input row, as delivered by the ingestion layer.
pub type RawRow = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    numeric: BTreeMap<String, f64>,
    categorical: BTreeMap<String, String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            numeric: BTreeMap::new(),
            categorical: BTreeMap::new(),
        }
    }

    /// Set a numeric field. Non-finite values are stored as 0.
    pub fn with_numeric(mut self, field: impl Into<String>, value: f64) -> Self {
        let value = if value.is_finite() { value } else { 0.0 };
        self.numeric.insert(field.into(), value);
        self
    }

    pub fn with_categorical(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(field.into(), value.into().trim().to_string());
        self
    }

    /// Build a record from a raw row. Only schema fields are read;
    /// every schema numeric field is present afterwards (0 when missing).
    pub fn from_row(row: &RawRow, schema: &FieldSchema) -> Self {
        let user_id = row
            .get(&schema.id_field)
            .map(clean_categorical)
            .unwrap_or_default();

        let mut record = Self::new(user_id);
        for field in schema.numeric_fields() {
            let value = row.get(&field).map(clean_numeric).unwrap_or(0.0);
            record.numeric.insert(field, value);
        }
        for field in &schema.categorical {
            let value = row.get(field).map(clean_categorical).unwrap_or_default();
            record.categorical.insert(field.clone(), value);
        }
        record
    }

    /// Numeric value of `field`, 0 when absent.
    pub fn value(&self, field: &str) -> f64 {
        self.numeric.get(field).copied().unwrap_or(0.0)
    }

    /// Categorical value of `field`, "" when absent.
    pub fn category(&self, field: &str) -> &str {
        self.categorical.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn outcome(&self, outcome: Outcome) -> f64 {
        self.value(outcome.field())
    }

    /// Converted means the outcome magnitude is strictly positive.
    pub fn converted(&self, outcome: Outcome) -> bool {
        self.outcome(outcome) > 0.0
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.numeric.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.categorical.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The clean-numeric rule: finite numbers pass, numeric strings parse,
/// booleans are 0/1, everything else is 0.
pub fn clean_numeric(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

pub fn clean_categorical(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Convert a batch of raw rows. Keys outside the schema are ignored;
/// they are reported once so they can be opted in as extensions.
/// Rows with a blank id get `row-<index>`; repeated ids are kept as
/// separate records.
pub fn ingest_rows(rows: &[RawRow], schema: &FieldSchema) -> Vec<UserRecord> {
    let unknown: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys())
        .filter(|k| !schema.knows(k))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        log::warn!(
            "Ignoring {} column(s) not in the field schema: {}",
            unknown.len(),
            unknown.iter().copied().collect::<Vec<_>>().join(", ")
        );
    }

    let mut records: Vec<UserRecord> = rows.iter().map(|row| UserRecord::from_row(row, schema)).collect();

    let mut missing = 0usize;
    for (index, record) in records.iter_mut().enumerate() {
        if record.user_id.is_empty() {
            record.user_id = format!("row-{index}");
            missing += 1;
        }
    }
    if missing > 0 {
        log::warn!(
            "{missing} row(s) had no '{}'; assigned positional ids (row-<index>)",
            schema.id_field
        );
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let duplicates = records.iter().filter(|r| !seen.insert(r.user_id.as_str())).count();
    if duplicates > 0 {
        log::warn!("{duplicates} row(s) repeat an earlier '{}'; each row is still analyzed", schema.id_field);
    }

    log::debug!("Ingested {} user record(s)", records.len());
    records
}
