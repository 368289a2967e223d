//! Demographic & summary aggregator.
//!
//! Categorical percentages use a per-question denominator: only users
//! who answered that field (non-empty value) count. Blank answers never
//! dilute the shares of real answers.

use crate::{
    persona::{PersonaClassifier, PersonaDistribution},
    record::UserRecord,
    types::{FieldName, Outcome},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionStat {
    pub converted: u64,
    /// converted / total users, 0 for an empty table.
    pub rate: f64,
    /// Mean outcome value over converted users only.
    pub mean_when_converted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub value: String,
    pub count: u64,
    /// Percent of respondents to this field, 0 to 100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalBreakdown {
    pub field: FieldName,
    /// Users with a non-empty answer.
    pub respondents: u64,
    /// Ordered by count descending, then value.
    pub values: Vec<CategoryShare>,
}

impl CategoricalBreakdown {
    pub fn compute(users: &[UserRecord], field: &str) -> Self {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for user in users {
            let answer = user.category(field).trim();
            if !answer.is_empty() {
                *counts.entry(answer).or_insert(0) += 1;
            }
        }

        let respondents: u64 = counts.values().sum();
        let mut values: Vec<CategoryShare> = counts
            .into_iter()
            .map(|(value, count)| CategoryShare {
                value: value.to_string(),
                count,
                percentage: count as f64 / respondents as f64 * 100.0,
            })
            .collect();
        values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

        Self {
            field: field.to_string(),
            respondents,
            values,
        }
    }

    pub fn share(&self, value: &str) -> Option<&CategoryShare> {
        self.values.iter().find(|v| v.value == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_users: u64,
    pub per_outcome_conversion: BTreeMap<Outcome, ConversionStat>,
    pub persona_counts: PersonaDistribution,
    pub demographic_breakdowns: BTreeMap<FieldName, CategoricalBreakdown>,
}

impl SummaryStats {
    pub fn conversion_rate(&self, outcome: Outcome) -> f64 {
        self.per_outcome_conversion.get(&outcome).map_or(0.0, |c| c.rate)
    }
}

pub fn conversion_stat(users: &[UserRecord], outcome: Outcome) -> ConversionStat {
    let (converted, magnitude) = users
        .iter()
        .filter(|u| u.converted(outcome))
        .fold((0u64, 0.0), |(n, sum), u| (n + 1, sum + u.outcome(outcome)));

    ConversionStat {
        converted,
        rate: if users.is_empty() {
            0.0
        } else {
            converted as f64 / users.len() as f64
        },
        mean_when_converted: if converted == 0 {
            0.0
        } else {
            magnitude / converted as f64
        },
    }
}

pub fn summarize(
    users: &[UserRecord],
    demographic_fields: &[FieldName],
    classifier: &PersonaClassifier,
) -> SummaryStats {
    let per_outcome_conversion = Outcome::ALL
        .iter()
        .map(|o| (*o, conversion_stat(users, *o)))
        .collect();

    let persona_counts = PersonaDistribution::from_labels(users.iter().map(|u| classifier.classify(u)));

    let demographic_breakdowns = demographic_fields
        .iter()
        .map(|f| (f.clone(), CategoricalBreakdown::compute(users, f)))
        .collect();

    SummaryStats {
        total_users: users.len() as u64,
        per_outcome_conversion,
        persona_counts,
        demographic_breakdowns,
    }
}
