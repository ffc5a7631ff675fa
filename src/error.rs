use thiserror::Error;

use crate::range::RangeViolation;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidRange(#[from] RangeViolation),

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Server-reported failure. The message is shown to the user as-is.
    #[error("{0}")]
    Server(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
