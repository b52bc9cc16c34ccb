use thiserror::Error;

/// Failure modes of a single HTTP request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Timeouts and bad statuses are worth another attempt within the retry
    /// budget; transport-level failures (DNS, connection refused) are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Status(_))
    }
}

/// Failure modes of turning one flat page into a record. Any of these fails
/// the whole record; the extractor logs and skips it.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no {0} element in page")]
    MissingElement(&'static str),
    #[error("spec list too short: expected at least {expected} values, found {found}")]
    SpecTooShort { expected: usize, found: usize },
    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("malformed plan-images payload: {0}")]
    PlanImages(#[from] serde_json::Error),
}

/// Per-record failure: either the page never arrived or it did not parse.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
