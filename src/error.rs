//! Error type shared by every pipeline stage.
//!
//! Variants fall into three groups: fatal configuration errors raised on
//! purpose (no control files, no standard match, unknown sheet), malformed
//! input (missing columns, unparseable numbers) and plain I/O or format
//! failures from the underlying crates.

use std::path::PathBuf;

/// Errors that can occur while preparing, reconciling or reporting a job
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// I/O error reading or writing a table
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV/TSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// GraphML parsing error
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid TOML configuration
    #[error("TOML configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Expected column is absent from a table
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn {
        /// Column that was looked up
        column: String,
        /// Human readable table description
        table: String,
    },

    /// A required cell is empty
    #[error("Missing value in column '{column}' at row {row}")]
    MissingValue {
        /// Column of the empty cell
        column: String,
        /// Zero-based data row index
        row: usize,
    },

    /// A cell could not be interpreted as a number
    #[error("Invalid number '{value}' in column '{column}'")]
    InvalidNumber {
        /// Column of the offending cell
        column: String,
        /// Raw cell text
        value: String,
    },

    /// Malformed feature identifier
    #[error("Invalid feature identifier '{0}'")]
    InvalidIdentifier(String),

    /// Job has no control samples
    #[error("No {job} control files found in folder {folder}")]
    NoControlFiles {
        /// Job name
        job: String,
        /// Control folder that was scanned
        folder: PathBuf,
    },

    /// No feature fell inside the reference-standard window
    #[error("No {standard} feature found for job {job}")]
    NoStandardMatch {
        /// Job name
        job: String,
        /// Standard name
        standard: String,
    },

    /// Ionization mode other than POS or NEG
    #[error("Invalid ionization mode '{value}' for job {job}. Must be either \"POS\" or \"NEG\"")]
    InvalidIonization {
        /// Job name
        job: String,
        /// Value found in the job table
        value: String,
    },

    /// Output sheet name not known to the report writer
    #[error("Sheet name '{0}' not recognized")]
    UnknownSheet(String),

    /// Job name not present in the job table
    #[error("Job '{0}' not found in job table")]
    UnknownJob(String),

    /// Expected input file could not be located
    #[error("Missing input: {0}")]
    MissingInput(String),
}

impl PipelineError {
    /// Convenience constructor for [`PipelineError::MissingColumn`]
    pub fn missing_column(column: impl Into<String>, table: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            table: table.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PipelineError>;
