//! Error types for fulfillment.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FulfillmentError {
    #[error("Invalid table name {0}")]
    InvalidTable(String),

    #[error("No data found for {0}")]
    NoData(String),

    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    #[error("Dataset backend error: {0}")]
    Backend(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed dataset response: {0}")]
    Malformed(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FulfillmentError {
    /// Short stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            FulfillmentError::InvalidTable(_) => "invalid_table",
            FulfillmentError::NoData(_) => "no_data",
            FulfillmentError::Timeout(_) => "timeout",
            FulfillmentError::Backend(_) => "backend",
            FulfillmentError::Http(_) => "http",
            FulfillmentError::Malformed(_) => "malformed",
            FulfillmentError::Auth(_) => "auth",
            FulfillmentError::Json(_) => "json",
        }
    }

    /// True for the expected "nothing to report" outcome, as opposed to a failure
    /// of the backend or of this service.
    pub fn is_no_data(&self) -> bool {
        matches!(self, FulfillmentError::NoData(_))
    }
}
