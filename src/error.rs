//! Error types for grade-affinity
//!
//! One enum for the whole library; binaries wrap it in `anyhow` for context.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// grade-affinity error types
#[derive(Error, Debug)]
pub enum Error {
    /// Test features and test labels disagree on identifiers after filtering
    #[error("Data mismatch: {0}")]
    DataMismatch(String),

    /// A column requested by name is not present in a table
    #[error("Missing column '{column}' in {table}")]
    MissingColumn {
        /// Column that was looked up
        column: String,
        /// Table (usually a file path) that lacked it
        table: String,
    },

    /// Symbolic model name outside the known regressor set
    #[error("Unexpected model type '{0}'\nExpected one of: linearRegression, Ridge, Lasso, ElasticNet, SVR, DecisionTree, RandomForest, XGBoost")]
    UnknownModelType(String),

    /// Caller supplied arguments that cannot be honoured
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session operation invoked before its prerequisites
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Cell that could not be parsed as a number
    #[error("Parse error in column '{column}' (row {row}): '{value}' is not a number")]
    Parse {
        /// Column name
        column: String,
        /// 1-based data row
        row: usize,
        /// Offending cell text
        value: String,
    },

    /// Receptor or ligand structure could not be read
    #[error("Structure error: {0}")]
    Structure(String),

    /// Regressor fitting failed (e.g. invalid targets for the criterion)
    #[error("Model error: {0}")]
    Model(String),

    /// Plot rendering failed
    #[error("Plot error: {0}")]
    Plot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (plans, model artifacts) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
