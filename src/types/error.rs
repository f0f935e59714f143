use thiserror::Error;

/// awscost error types
#[derive(Error, Debug)]
pub enum CostReportError {
    /// A billing record is missing a required field or holds an unparseable value
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// More than one currency unit observed within one period
    #[error("mixed currency: expected {expected}, found {found}")]
    MixedCurrency { expected: String, found: String },

    /// Billing period is empty, reversed or not a `YYYY-MM-DD` date
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Billing source failed (API call or saved response)
    #[error("billing error: {0}")]
    Billing(String),

    /// Failed to parse a JSON response
    #[error("parse error: {0}")]
    Parse(String),

    /// Notification transport rejected the message
    #[error("notify error: {0}")]
    Notify(String),

    /// HTTP request failed
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for awscost
pub type Result<T> = std::result::Result<T, CostReportError>;
