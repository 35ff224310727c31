use thiserror::Error;

/// Terminal failure of a scoring-oracle call, after retries are exhausted.
///
/// The pipeline records these per candidate; they never abort a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleFailure {
    #[error("oracle request timed out: {0}")]
    Timeout(String),

    #[error("oracle returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("oracle rate limit exceeded, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("oracle authentication failed: {0}")]
    Unauthorized(String),
}

impl OracleFailure {
    /// Transient failures are retried with backoff; `Unauthorized` fails fast.
    pub fn is_transient(&self) -> bool {
        !matches!(self, OracleFailure::Unauthorized(_))
    }
}

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Scoring oracle failure: {0}")]
    Oracle(#[from] OracleFailure),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Cache write failure: {0}")]
    CacheWrite(String),

    #[error("Cache read failure: {0}")]
    CacheRead(String),
}

pub type Result<T> = std::result::Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_not_transient() {
        assert!(!OracleFailure::Unauthorized("bad key".into()).is_transient());
        assert!(OracleFailure::Timeout("30s elapsed".into()).is_transient());
        assert!(OracleFailure::RateLimited { retry_after: Some(7) }.is_transient());
        assert!(OracleFailure::InvalidResponse("not json".into()).is_transient());
    }
}
