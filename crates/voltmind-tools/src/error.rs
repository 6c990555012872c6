//! Error types for the tools crate.

use voltmind_core::CoreError;
use voltmind_vrm::VrmError;

/// Tool error types.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool not found
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Invalid arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Remote API failure
    #[error(transparent)]
    Vrm(#[from] VrmError),

    /// Normalization/resolution failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToolError::NotFound("gps".to_string());
        assert!(err.to_string().contains("gps"));
    }

    #[test]
    fn test_core_error_passthrough() {
        let core = CoreError::UnresolvedSignals {
            signals: vec!["dbus:/Pv/V".to_string()],
        };
        let err: ToolError = core.into();
        assert!(err.to_string().contains("dbus:/Pv/V"));
    }
}
