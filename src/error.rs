//! Error types for the drive_inventory crate.

use thiserror::Error;

/// Errors that can occur while authenticating, listing or reporting.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Failed to read or write local file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Consent flow failed: {0}")]
    ConsentFlowError(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("File '{file}' has no {field}")]
    MissingField { file: String, field: &'static str },
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
