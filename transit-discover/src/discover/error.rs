//! Discovery error types.

use std::time::Duration;

use crate::provider::{ProfileError, ProviderError};

/// Invalid crawl configuration. Raised before any query is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("task timeout must be positive")]
    ZeroTimeout,

    #[error("event channel capacity must be at least 1")]
    ZeroChannelCapacity,

    #[error("locations fallback must request at least 1 result")]
    ZeroLocationsResults,

    #[error("trip lookback must not be negative")]
    NegativeLookback,

    #[error("invalid provider profile: {0}")]
    Profile(#[from] ProfileError),
}

/// Fatal crawl errors. The stream ends right after yielding one.
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A task failed with an error that is not provider-flagged
    #[error("{task} failed: {source}")]
    Provider {
        task: String,
        #[source]
        source: ProviderError,
    },

    /// A task exceeded its wall-clock budget
    #[error("{task} timed out after {after:?}")]
    Timeout { task: String, after: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DiscoverError::Timeout {
            task: "departures(A)".into(),
            after: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "departures(A) timed out after 10s");

        let err = DiscoverError::Provider {
            task: "trip(t1, X1)".into(),
            source: ProviderError::Api {
                status: 500,
                message: "boom".into(),
            },
        };
        assert_eq!(err.to_string(), "trip(t1, X1) failed: API error 500: boom");

        let err: DiscoverError = ConfigError::ZeroConcurrency.into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: concurrency must be at least 1"
        );
    }
}
