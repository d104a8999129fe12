// error.rs
use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the price backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid sample for {symbol}: {reason}")]
    InvalidSample { symbol: String, reason: String },

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    /// HTTP 404 from the realtime routes means the symbol has no rows yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Server { status: 404, .. })
    }
}
