use crate::{
    error::{AnalysisError, AnalysisResult},
    schema::{fields, FieldSchema},
    stats::DEFAULT_SIGNIFICANCE_THRESHOLD,
    tipping::TippingConfig,
    types::FieldName,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionConfig {
    /// |t| strictly above this is significant.
    pub significance_threshold: f64,
    /// How many drivers per outcome the summary cards show.
    pub top_driver_count: usize,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            top_driver_count: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryConfig {
    /// Categorical fields broken down in the summary, in display order.
    pub demographic_fields: Vec<FieldName>,
    /// Warn when the unclassified persona share (0 to 1) exceeds this.
    pub unclassified_warning_share: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            demographic_fields: [
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
            .collect(),
            unclassified_warning_share: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AnalyzerConfigFile {
    #[serde(default)]
    tipping_point: TippingConfig,
    #[serde(default)]
    regression: RegressionConfig,
    #[serde(default)]
    summary: SummaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzerConfig {
    pub schema: FieldSchema,
    pub tipping_point: TippingConfig,
    pub regression: RegressionConfig,
    pub summary: SummaryConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AnalyzerConfig {
    /// Load from the data/ directory.
    /// In tests, use AnalyzerConfig::builtin().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let schema_path = format!("{data_dir}/schema/fields.json");
        let schema_content = std::fs::read_to_string(&schema_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {schema_path}: {e}"))?;
        let schema: FieldSchema = serde_json::from_str(&schema_content)?;

        let analyzer_path = format!("{data_dir}/analysis/analyzer_config.json");
        let analyzer_content = std::fs::read_to_string(&analyzer_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {analyzer_path}: {e}"))?;
        let file: AnalyzerConfigFile = serde_json::from_str(&analyzer_content)?;

        let config = Self {
            schema,
            tipping_point: file.tipping_point,
            regression: file.regression,
            summary: file.summary,
        };
        config.validate()?;
        Ok(config)
    }

    /// Hardcoded defaults matching the shipped data/ files.
    pub fn builtin() -> Self {
        Self {
            schema: FieldSchema::builtin(),
            tipping_point: TippingConfig::default(),
            regression: RegressionConfig::default(),
            summary: SummaryConfig::default(),
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        self.schema.validate()?;

        let rate = self.tipping_point.min_conversion_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(AnalysisError::InvalidConfig {
                reason: format!("tipping_point.min_conversion_rate {rate} outside [0, 1]"),
            });
        }
        if self.tipping_point.min_bucket_size == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "tipping_point.min_bucket_size must be at least 1".into(),
            });
        }
        let threshold = self.regression.significance_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AnalysisError::InvalidConfig {
                reason: format!("regression.significance_threshold {threshold} must be positive"),
            });
        }
        let share = self.summary.unclassified_warning_share;
        if !(0.0..=1.0).contains(&share) {
            return Err(AnalysisError::InvalidConfig {
                reason: format!("summary.unclassified_warning_share {share} outside [0, 1]"),
            });
        }
        for field in &self.summary.demographic_fields {
            if !self.schema.is_categorical(field) {
                return Err(AnalysisError::UnknownField { field: field.clone() });
            }
        }
        Ok(())
    }
}
