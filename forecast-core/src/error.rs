use thiserror::Error;

/// Boundary error for [`crate::service::ForecastService::get_forecast`].
///
/// Degraded upstream responses never surface here; those come back as a
/// forecast with `status.success = "false"`.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A required provider parameter was absent from the request. Raised
    /// before any normalization, caching, or network activity.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// Unexpected internal failure (adapter parse error, serialization, ...),
    /// re-raised after being counted.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ForecastError {
    /// Whether the caller, not the upstream, is at fault ("bad request").
    pub fn is_bad_request(&self) -> bool {
        matches!(self, ForecastError::MissingParameter(_))
    }
}
