//! Error types for the core crate.

/// Core error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// Glob pattern could not be translated into a matcher
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No attribute codes could be resolved for a time-series query
    #[error("no attribute codes resolved from signals: {}", signals.join(", "))]
    UnresolvedSignals { signals: Vec<String> },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnresolvedSignals {
            signals: vec!["dbus:/Dc/0/Voltage".to_string()],
        };
        assert!(err.to_string().contains("dbus:/Dc/0/Voltage"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert!(matches!(core_err, CoreError::Serialization(_)));
    }
}
