use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Corrupt stored value '{value}' in {table}")]
    CorruptRecord { table: &'static str, value: String },

    #[error("Analysis run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
