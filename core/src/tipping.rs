//! Tipping-point detector.
//!
//! Buckets users by the integer part of a predictor, computes the
//! conversion rate per bucket, and reports the bucket where the rate
//! jumps most sharply into "meaningfully converting" territory.
//!
//! This is a cheap one-dimensional change-point heuristic. The noise
//! floor and the conversion floor are parameters (`TippingConfig`).

use crate::{
    record::UserRecord,
    types::{FieldName, Outcome},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TippingConfig {
    /// Buckets with fewer users than this are discarded as noise.
    pub min_bucket_size: u64,
    /// A jump only counts if it lands in a bucket converting above this rate.
    pub min_conversion_rate: f64,
}

impl Default for TippingConfig {
    fn default() -> Self {
        Self {
            min_bucket_size: 10,
            min_conversion_rate: 0.10,
        }
    }
}

/// A predictor threshold, or "N/A" when no qualifying jump exists.
/// Serialized as a JSON number or the string "N/A".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TippingRepr", into = "TippingRepr")]
pub enum TippingPoint {
    Threshold(i64),
    NotApplicable,
}

const NOT_APPLICABLE: &str = "N/A";

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TippingRepr {
    Threshold(i64),
    Label(String),
}

impl From<TippingPoint> for TippingRepr {
    fn from(point: TippingPoint) -> Self {
        match point {
            TippingPoint::Threshold(v) => TippingRepr::Threshold(v),
            TippingPoint::NotApplicable => TippingRepr::Label(NOT_APPLICABLE.into()),
        }
    }
}

impl TryFrom<TippingRepr> for TippingPoint {
    type Error = String;

    fn try_from(repr: TippingRepr) -> Result<Self, Self::Error> {
        match repr {
            TippingRepr::Threshold(v) => Ok(TippingPoint::Threshold(v)),
            TippingRepr::Label(s) if s == NOT_APPLICABLE => Ok(TippingPoint::NotApplicable),
            TippingRepr::Label(s) => Err(format!("invalid tipping point '{s}'")),
        }
    }
}

impl TippingPoint {
    pub fn threshold(&self) -> Option<i64> {
        match self {
            Self::Threshold(v) => Some(*v),
            Self::NotApplicable => None,
        }
    }
}

impl fmt::Display for TippingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold(v) => write!(f, "{v}"),
            Self::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub total: u64,
    pub converted: u64,
}

impl BucketStats {
    pub fn conversion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.converted as f64 / self.total as f64
        }
    }
}

/// Bucket key for a cleaned predictor value: floor, with negatives at 0.
pub fn bucket_key(value: f64) -> i64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as i64
    } else {
        0
    }
}

/// predictor bucket → (total, converted) for one (predictor, outcome) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionHistogram {
    pub buckets: BTreeMap<i64, BucketStats>,
}

impl ConversionHistogram {
    pub fn from_users(users: &[UserRecord], predictor: &str, outcome: Outcome) -> Self {
        let mut histogram = Self::default();
        for user in users {
            histogram.record(user.value(predictor), user.converted(outcome));
        }
        histogram
    }

    pub fn record(&mut self, predictor_value: f64, converted: bool) {
        let bucket = self.buckets.entry(bucket_key(predictor_value)).or_default();
        bucket.total += 1;
        if converted {
            bucket.converted += 1;
        }
    }

    /// Insert a pre-aggregated bucket (used when the grouping happened upstream).
    pub fn with_bucket(mut self, key: i64, total: u64, converted: u64) -> Self {
        self.buckets.insert(key, BucketStats { total, converted });
        self
    }

    pub fn tipping_point(&self, config: &TippingConfig) -> TippingPoint {
        // BTreeMap iteration is already ascending by predictor value.
        let rates: Vec<(i64, f64)> = self
            .buckets
            .iter()
            .filter(|(_, b)| b.total >= config.min_bucket_size)
            .map(|(key, b)| (*key, b.conversion_rate()))
            .collect();

        if rates.len() < 2 {
            return TippingPoint::NotApplicable;
        }

        let mut best: Option<(i64, f64)> = None;
        for pair in rates.windows(2) {
            let (_, prev_rate) = pair[0];
            let (key, rate) = pair[1];
            let increase = rate - prev_rate;
            if rate > config.min_conversion_rate
                && increase > 0.0
                && best.map_or(true, |(_, top)| increase > top)
            {
                best = Some((key, increase));
            }
        }

        best.map_or(TippingPoint::NotApplicable, |(key, _)| TippingPoint::Threshold(key))
    }
}

pub fn find_tipping_point(
    users: &[UserRecord],
    predictor: &str,
    outcome: Outcome,
    config: &TippingConfig,
) -> TippingPoint {
    ConversionHistogram::from_users(users, predictor, outcome).tipping_point(config)
}

/// outcome → predictor → tipping point for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TippingPointMap {
    pub points: BTreeMap<Outcome, BTreeMap<FieldName, TippingPoint>>,
}

impl TippingPointMap {
    /// Fill every (outcome, predictor) histogram in a single pass over users.
    pub fn compute(users: &[UserRecord], predictors: &[FieldName], config: &TippingConfig) -> Self {
        let mut histograms: Vec<Vec<ConversionHistogram>> =
            vec![vec![ConversionHistogram::default(); predictors.len()]; Outcome::ALL.len()];

        for user in users {
            for (oi, outcome) in Outcome::ALL.iter().enumerate() {
                let converted = user.converted(*outcome);
                for (pi, predictor) in predictors.iter().enumerate() {
                    histograms[oi][pi].record(user.value(predictor), converted);
                }
            }
        }

        let mut points = BTreeMap::new();
        for (outcome, row) in Outcome::ALL.iter().zip(histograms) {
            let per_predictor = predictors
                .iter()
                .zip(row)
                .map(|(predictor, histogram)| (predictor.clone(), histogram.tipping_point(config)))
                .collect();
            points.insert(*outcome, per_predictor);
        }
        Self { points }
    }

    pub fn get(&self, outcome: Outcome, predictor: &str) -> TippingPoint {
        self.points
            .get(&outcome)
            .and_then(|row| row.get(predictor))
            .copied()
            .unwrap_or(TippingPoint::NotApplicable)
    }
}
