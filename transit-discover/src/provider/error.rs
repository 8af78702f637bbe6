//! Provider error types.

use super::convert::ConversionError;

/// Errors from a transit-data provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A recognized failure mode of the upstream data source, such as a
    /// route computation it does not support
    #[error("provider error {code}: {message}")]
    Flagged { code: String, message: String },

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// JSON deserialization or conversion failed
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    /// Whether this is a provider-flagged error.
    pub fn is_flagged(&self) -> bool {
        matches!(self, ProviderError::Flagged { .. })
    }

    /// The provider's error code, for flagged errors.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProviderError::Flagged { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<ConversionError> for ProviderError {
    fn from(err: ConversionError) -> Self {
        ProviderError::Json {
            message: err.to_string(),
            body: None,
        }
    }
}
