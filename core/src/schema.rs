//! Field manifest: the explicit list of columns the analysis understands.
//!
//! RULE: Nothing infers fields from whatever keys happen to be on a row.
//! A column is analyzed only if it is listed here, either as a known
//! field or as an opt-in extension.

use crate::{
    error::{AnalysisError, AnalysisResult},
    types::{FieldName, Outcome},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Well-known field names referenced directly by the persona cascade.
pub mod fields {
    pub const USER_ID: &str = "user_id";

    pub const TOTAL_DEPOSITS: &str = "total_deposits";
    pub const TOTAL_COPIES: &str = "total_copies";
    pub const TOTAL_SUBSCRIPTIONS: &str = "total_subscriptions";
    pub const SUBSCRIBED_WITHIN_7_DAYS: &str = "subscribed_within_7_days";

    pub const REGULAR_PDP_VIEWS: &str = "regular_pdp_views";
    pub const PREMIUM_PDP_VIEWS: &str = "premium_pdp_views";
    pub const REGULAR_CREATOR_PROFILE_VIEWS: &str = "regular_creator_profile_views";
    pub const PREMIUM_CREATOR_PROFILE_VIEWS: &str = "premium_creator_profile_views";

    pub const INCOME: &str = "income";
    pub const NET_WORTH: &str = "net_worth";
    pub const INVESTING_EXPERIENCE_YEARS: &str = "investing_experience_years";
    pub const INVESTING_ACTIVITY: &str = "investing_activity";
    pub const INVESTMENT_TYPE: &str = "investment_type";
    pub const INVESTING_OBJECTIVE: &str = "investing_objective";
    pub const ACQUISITION_SURVEY: &str = "acquisition_survey";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSchema {
    /// Raw-row key carrying the opaque user identifier.
    #[serde(default = "default_id_field")]
    pub id_field: FieldName,
    pub numeric: Vec<FieldName>,
    pub categorical: Vec<FieldName>,
    /// Numeric fields tested against every outcome, in report order.
    pub predictors: Vec<FieldName>,
    /// Extra numeric columns explicitly opted in as predictors.
    #[serde(default)]
    pub extensions: Vec<FieldName>,
}

fn default_id_field() -> FieldName {
    fields::USER_ID.into()
}

impl FieldSchema {
    /// The built-in manifest for the investing-app event export.
    pub fn builtin() -> Self {
        let predictors: Vec<FieldName> = [
            "has_linked_bank",
            "available_copy_credits",
            "buying_power",
            "total_withdrawals",
            "total_withdrawal_count",
            fields::REGULAR_PDP_VIEWS,
            fields::PREMIUM_PDP_VIEWS,
            fields::REGULAR_CREATOR_PROFILE_VIEWS,
            fields::PREMIUM_CREATOR_PROFILE_VIEWS,
            "paywall_views",
            "total_stripe_views",
            "app_sessions",
            "discover_tab_views",
            "leaderboard_tab_views",
            "premium_tab_views",
            "total_copy_starts",
            "total_ach_transfers",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut numeric: Vec<FieldName> = Outcome::ALL.iter().map(|o| o.field().to_string()).collect();
        numeric.push(fields::SUBSCRIBED_WITHIN_7_DAYS.into());
        numeric.extend(predictors.iter().cloned());

        let categorical = [
            fields::INCOME,
            fields::NET_WORTH,
            fields::INVESTING_EXPERIENCE_YEARS,
            fields::INVESTING_ACTIVITY,
            fields::INVESTMENT_TYPE,
            fields::INVESTING_OBJECTIVE,
            fields::ACQUISITION_SURVEY,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            id_field: default_id_field(),
            numeric,
            categorical,
            predictors,
            extensions: Vec::new(),
        }
    }

    /// Opt extra numeric columns in as predictors.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.extensions.extend(extensions.into_iter().map(Into::into));
        self
    }

    /// Predictors followed by extensions, deduplicated, outcomes excluded.
    pub fn predictors(&self) -> Vec<FieldName> {
        let mut seen = HashSet::new();
        self.predictors
            .iter()
            .chain(self.extensions.iter())
            .filter(|f| !Outcome::is_outcome_field(f))
            .filter(|f| seen.insert((*f).clone()))
            .cloned()
            .collect()
    }

    /// Every numeric column a record carries: known fields plus extensions.
    pub fn numeric_fields(&self) -> Vec<FieldName> {
        let mut seen = HashSet::new();
        self.numeric
            .iter()
            .chain(self.extensions.iter())
            .filter(|f| seen.insert((*f).clone()))
            .cloned()
            .collect()
    }

    pub fn is_numeric(&self, field: &str) -> bool {
        self.numeric.iter().any(|f| f == field) || self.extensions.iter().any(|f| f == field)
    }

    pub fn is_categorical(&self, field: &str) -> bool {
        self.categorical.iter().any(|f| f == field)
    }

    /// True when the key is consumed by this schema in any role.
    pub fn knows(&self, key: &str) -> bool {
        key == self.id_field || self.is_numeric(key) || self.is_categorical(key)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        for outcome in Outcome::ALL {
            if !self.numeric.iter().any(|f| f == outcome.field()) {
                return Err(AnalysisError::InvalidConfig {
                    reason: format!("outcome field '{}' missing from numeric fields", outcome.field()),
                });
            }
        }
        for predictor in &self.predictors {
            if !self.numeric.iter().any(|f| f == predictor) {
                return Err(AnalysisError::UnknownField { field: predictor.clone() });
            }
        }
        for ext in &self.extensions {
            if self.numeric.iter().any(|f| f == ext) || self.is_categorical(ext) || *ext == self.id_field {
                return Err(AnalysisError::InvalidConfig {
                    reason: format!("extension '{ext}' collides with a known field"),
                });
            }
        }
        if let Some(f) = self.numeric.iter().find(|f| self.is_categorical(f)) {
            return Err(AnalysisError::InvalidConfig {
                reason: format!("field '{f}' declared both numeric and categorical"),
            });
        }
        Ok(())
    }
}
