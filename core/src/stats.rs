//! Correlation & regression engine.
//!
//! Closed-form Pearson correlation and a t-statistic derived from it.
//! Output is advisory: degenerate input (empty columns, zero variance,
//! tiny samples) resolves to 0 instead of failing.

use crate::{
    record::UserRecord,
    types::{FieldName, Outcome},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// |t| above this is flagged significant (two-sided, ~95%).
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 1.96;

const MIN_ABS_CORRELATION: f64 = 0.001;
const MIN_UNEXPLAINED_VARIANCE: f64 = 0.001;

/// Pearson product-moment correlation between two columns over the same
/// user ordering. Pairs up to the shorter length. Returns 0 when either
/// column has zero variance.
pub fn correlate(outcome_values: &[f64], predictor_values: &[f64]) -> f64 {
    let n = outcome_values.len().min(predictor_values.len());
    if n == 0 {
        return 0.0;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in outcome_values.iter().zip(predictor_values.iter()) {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
        sum_y2 += y * y;
    }

    let n = n as f64;
    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = (n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y);
    if denominator <= 0.0 {
        return 0.0;
    }

    let r = numerator / denominator.sqrt();
    if r.is_finite() {
        // Rounding can push |r| a hair past 1.
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// t = r * sqrt((n - 2) / (1 - r^2)), or 0 when the inputs are degenerate.
pub fn t_statistic(r: f64, n: usize) -> f64 {
    let unexplained = 1.0 - r * r;
    if r.abs() < MIN_ABS_CORRELATION || n <= 2 || unexplained < MIN_UNEXPLAINED_VARIANCE {
        return 0.0;
    }
    r * ((n as f64 - 2.0) / unexplained).sqrt()
}

/// Extract one numeric column in user order.
pub fn column(users: &[UserRecord], field: &str) -> Vec<f64> {
    users.iter().map(|u| u.value(field)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionRow {
    pub outcome: Outcome,
    pub predictor: FieldName,
    pub correlation: f64,
    pub t_stat: f64,
    pub significant: bool,
}

/// Rendering shape: one cell of the outcome → predictor map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionEntry {
    pub correlation: f64,
    #[serde(rename = "tStat")]
    pub t_stat: f64,
    pub significant: bool,
}

impl From<&RegressionRow> for RegressionEntry {
    fn from(row: &RegressionRow) -> Self {
        Self {
            correlation: row.correlation,
            t_stat: row.t_stat,
            significant: row.significant,
        }
    }
}

/// outcome → predictor → r, computed once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub sample_size: usize,
    pub values: BTreeMap<Outcome, BTreeMap<FieldName, f64>>,
}

impl CorrelationMatrix {
    pub fn compute(users: &[UserRecord], predictors: &[FieldName]) -> Self {
        let predictor_columns: Vec<(&FieldName, Vec<f64>)> =
            predictors.iter().map(|p| (p, column(users, p))).collect();

        let mut values = BTreeMap::new();
        for outcome in Outcome::ALL {
            let outcome_column = column(users, outcome.field());
            let row: BTreeMap<FieldName, f64> = predictor_columns
                .iter()
                .map(|(name, col)| ((*name).clone(), correlate(&outcome_column, col)))
                .collect();
            values.insert(outcome, row);
        }

        Self {
            sample_size: users.len(),
            values,
        }
    }

    /// r for the pair, 0 when the pair was never computed.
    pub fn get(&self, outcome: Outcome, predictor: &str) -> f64 {
        self.values
            .get(&outcome)
            .and_then(|row| row.get(predictor))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Regression rows for one outcome, sorted by |r| descending.
/// Ties keep predictor order.
pub fn regress(
    outcome: Outcome,
    predictors: &[FieldName],
    correlations: &CorrelationMatrix,
    significance_threshold: f64,
) -> Vec<RegressionRow> {
    let n = correlations.sample_size;
    let mut rows: Vec<RegressionRow> = predictors
        .iter()
        .map(|predictor| {
            let correlation = correlations.get(outcome, predictor);
            let t_stat = t_statistic(correlation, n);
            RegressionRow {
                outcome,
                predictor: predictor.clone(),
                correlation,
                t_stat,
                significant: t_stat.abs() > significance_threshold,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
    rows
}
