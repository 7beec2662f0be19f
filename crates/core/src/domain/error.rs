use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid {0} parameter")]
    InvalidInput(&'static str),

    #[error("API key not configured")]
    Configuration,

    #[error("upstream rejected credentials")]
    UpstreamAuth,

    #[error("upstream rate limit exceeded")]
    UpstreamRateLimited,

    #[error("Empty response from upstream model")]
    UpstreamEmptyResponse,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    UpstreamOther(String),

    #[error("network error: {0}")]
    Network(String),
}

impl AnalysisError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse(detail.into())
    }

    /// Failures caused by the upstream service rather than by the request or the payload.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Configuration
                | Self::UpstreamAuth
                | Self::UpstreamEmptyResponse
                | Self::UpstreamOther(_)
        )
    }
}
