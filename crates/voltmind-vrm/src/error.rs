//! Error types for the VRM client.

/// Maximum response-body length kept in error snippets.
pub(crate) const SNIPPET_LIMIT: usize = 400;

/// VRM client error types.
#[derive(Debug, thiserror::Error)]
pub enum VrmError {
    /// Configuration is missing or invalid
    #[error("Configuration error:\n- {}", problems.join("\n- "))]
    Config { problems: Vec<String> },

    /// The remote API answered with a non-success status
    #[error("VRM request failed: {status} (endpoint {endpoint})")]
    Api {
        status: u16,
        endpoint: String,
        snippet: String,
    },

    /// The request never completed (connect failure, timeout, ...)
    #[error("VRM request error for {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Client construction failed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl VrmError {
    /// Whether this is an API failure with a 404 status, used by widget
    /// tools to report "not available" instead of failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VrmError::Api { status: 404, .. })
    }
}

/// Result type for VRM operations.
pub type Result<T> = std::result::Result<T, VrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_problems() {
        let err = VrmError::Config {
            problems: vec!["VRM_API_TOKEN is required.".to_string()],
        };
        assert!(err.to_string().contains("VRM_API_TOKEN"));
    }

    #[test]
    fn test_is_not_found() {
        let err = VrmError::Api {
            status: 404,
            endpoint: "/x".to_string(),
            snippet: String::new(),
        };
        assert!(err.is_not_found());
        let err = VrmError::Api {
            status: 500,
            endpoint: "/x".to_string(),
            snippet: String::new(),
        };
        assert!(!err.is_not_found());
    }
}
