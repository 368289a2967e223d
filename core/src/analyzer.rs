//! The analyzer: one explicit context per configuration.
//!
//! RUN ORDER (fixed):
//!   1. Correlation matrix (every predictor × every outcome)
//!   2. Regression rows per outcome, ranked by |r|
//!   3. Tipping points (single grouping pass over users)
//!   4. Summary: conversion rates, personas, demographic breakdowns
//!
//! RULES:
//!   - The predictor list is resolved once, at construction.
//!   - `analyze` is a pure function of the users slice. No state is
//!     carried between runs.

use crate::{
    config::AnalyzerConfig,
    error::AnalysisResult,
    persona::{PersonaClassifier, PersonaLabel},
    record::UserRecord,
    stats::{regress, CorrelationMatrix, RegressionEntry, RegressionRow},
    summary::{summarize, SummaryStats},
    tipping::TippingPointMap,
    types::{FieldName, Outcome, UserId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub user_count: usize,
    pub predictors: Vec<FieldName>,
    /// outcome → predictor → {correlation, tStat, significant}
    pub correlations: BTreeMap<Outcome, BTreeMap<FieldName, RegressionEntry>>,
    /// outcome → rows sorted by |r| descending
    pub rankings: BTreeMap<Outcome, Vec<RegressionRow>>,
    /// outcome → predictor → threshold | "N/A"
    pub tipping_points: TippingPointMap,
    pub summary: SummaryStats,
}

impl AnalysisReport {
    pub fn entry(&self, outcome: Outcome, predictor: &str) -> Option<&RegressionEntry> {
        self.correlations.get(&outcome).and_then(|row| row.get(predictor))
    }

    pub fn ranking(&self, outcome: Outcome) -> &[RegressionRow] {
        self.rankings.get(&outcome).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Significant, positively correlated drivers, strongest first.
    pub fn top_drivers(&self, outcome: Outcome, n: usize) -> Vec<&RegressionRow> {
        self.ranking(outcome)
            .iter()
            .filter(|row| row.significant && row.correlation > 0.0)
            .take(n)
            .collect()
    }
}

pub struct DriverAnalyzer {
    config: AnalyzerConfig,
    predictors: Vec<FieldName>,
    classifier: PersonaClassifier,
}

impl DriverAnalyzer {
    /// Validate the config and resolve the predictor list.
    pub fn new(config: AnalyzerConfig) -> AnalysisResult<Self> {
        config.validate()?;
        let predictors = config.schema.predictors();
        log::debug!(
            "Analyzer ready: {} predictor(s), {} extension(s)",
            predictors.len(),
            config.schema.extensions.len()
        );
        Ok(Self {
            config,
            predictors,
            classifier: PersonaClassifier::canonical(),
        })
    }

    /// Swap in a different persona cascade.
    pub fn with_classifier(mut self, classifier: PersonaClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn predictors(&self) -> &[FieldName] {
        &self.predictors
    }

    pub fn classifier(&self) -> &PersonaClassifier {
        &self.classifier
    }

    pub fn classify_all(&self, users: &[UserRecord]) -> Vec<(UserId, PersonaLabel)> {
        self.classifier.classify_all(users)
    }

    pub fn analyze(&self, users: &[UserRecord]) -> AnalysisReport {
        log::info!(
            "Analyzing {} user(s) against {} predictor(s)",
            users.len(),
            self.predictors.len()
        );

        let matrix = CorrelationMatrix::compute(users, &self.predictors);

        let mut correlations = BTreeMap::new();
        let mut rankings = BTreeMap::new();
        for outcome in Outcome::ALL {
            let rows = regress(
                outcome,
                &self.predictors,
                &matrix,
                self.config.regression.significance_threshold,
            );
            if let Some(top) = rows.first() {
                log::debug!(
                    "{outcome}: strongest driver {} (r={:.3}, t={:.2})",
                    top.predictor,
                    top.correlation,
                    top.t_stat
                );
            }
            let cells = rows
                .iter()
                .map(|row| (row.predictor.clone(), RegressionEntry::from(row)))
                .collect();
            correlations.insert(outcome, cells);
            rankings.insert(outcome, rows);
        }

        let tipping_points = TippingPointMap::compute(users, &self.predictors, &self.config.tipping_point);

        let summary = summarize(users, &self.config.summary.demographic_fields, &self.classifier);
        self.check_unclassified(&summary);

        log::info!(
            "Analysis complete: {} user(s), {} persona bucket(s)",
            summary.total_users,
            summary.persona_counts.personas.len()
        );

        AnalysisReport {
            user_count: users.len(),
            predictors: self.predictors.clone(),
            correlations,
            rankings,
            tipping_points,
            summary,
        }
    }

    fn check_unclassified(&self, summary: &SummaryStats) {
        let total = summary.persona_counts.total;
        if total == 0 {
            return;
        }
        let unclassified = summary.persona_counts.count(PersonaLabel::Unclassified);
        let share = unclassified as f64 / total as f64;
        if share > self.config.summary.unclassified_warning_share {
            log::warn!(
                "{unclassified} of {total} user(s) ({:.1}%) matched no persona rule",
                share * 100.0
            );
        }
    }
}
