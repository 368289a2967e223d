//! Shared primitive types used across the analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier. Carried through, never analyzed.
pub type UserId = String;

/// A numeric or categorical field name.
pub type FieldName = String;

/// The canonical analysis-run identifier.
pub type RunId = String;

/// The three conversion metrics every predictor is tested against.
///
/// Each outcome is both a magnitude (the numeric field on the record)
/// and a conversion flag (magnitude > 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "total_deposits")]
    Deposits,
    #[serde(rename = "total_copies")]
    Copies,
    #[serde(rename = "total_subscriptions")]
    Subscriptions,
}

impl Outcome {
    /// Fixed iteration order for reports and storage.
    pub const ALL: [Outcome; 3] = [Outcome::Deposits, Outcome::Copies, Outcome::Subscriptions];

    /// The numeric field carrying this outcome's magnitude.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Deposits      => "total_deposits",
            Self::Copies        => "total_copies",
            Self::Subscriptions => "total_subscriptions",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposits      => "Deposits",
            Self::Copies        => "Copies",
            Self::Subscriptions => "Subscriptions",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.field() == field)
    }

    pub fn is_outcome_field(field: &str) -> bool {
        Self::from_field(field).is_some()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}
