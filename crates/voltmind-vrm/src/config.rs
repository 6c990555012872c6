//! Environment-driven configuration.
//!
//! The server is configured entirely through environment variables so it
//! can run as a spawned subprocess with no config file:
//!
//! - `VRM_API_TOKEN`: access token, required
//! - `VRM_SITE_ID`: numeric installation id, required
//! - `VRM_AUTH_HEADER`: header the token travels in, default `X-Authorization`

use std::env;
use std::time::Duration;

use crate::error::{Result, VrmError};

/// Fixed API base URL.
pub const BASE_URL: &str = "https://vrmapi.victronenergy.com/v2";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default byte budget for chunked responses.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 128_000;

/// Environment variable names.
pub mod env_vars {
    pub const API_TOKEN: &str = "VRM_API_TOKEN";
    pub const SITE_ID: &str = "VRM_SITE_ID";
    pub const AUTH_HEADER: &str = "VRM_AUTH_HEADER";
}

/// Validated client configuration.
#[derive(Debug, Clone)]
pub struct VrmConfig {
    pub token: String,
    pub site_id: u64,
    pub auth_header: String,
    pub base_url: String,
    pub timeout: Duration,
    pub default_max_chunk_bytes: usize,
}

impl VrmConfig {
    /// Load and validate configuration from the environment.
    ///
    /// Every problem is collected so a misconfigured deployment reports all
    /// of them at once instead of one per restart.
    pub fn from_env() -> Result<Self> {
        let token = env::var(env_vars::API_TOKEN)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let site_id_raw = env::var(env_vars::SITE_ID)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let auth_header = env::var(env_vars::AUTH_HEADER)
            .ok()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "X-Authorization".to_string());

        let mut problems = Vec::new();
        if token.is_none() {
            problems.push(format!("{} is required.", env_vars::API_TOKEN));
        }
        let site_id = match &site_id_raw {
            None => {
                problems.push(format!(
                    "{} is required and must be numeric.",
                    env_vars::SITE_ID
                ));
                None
            }
            Some(raw) => match raw.parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    problems.push(format!(
                        "{} is required and must be numeric.",
                        env_vars::SITE_ID
                    ));
                    None
                }
            },
        };

        match (token, site_id) {
            (Some(token), Some(site_id)) if problems.is_empty() => Ok(Self {
                token,
                site_id,
                auth_header,
                base_url: BASE_URL.to_string(),
                timeout: REQUEST_TIMEOUT,
                default_max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            }),
            _ => Err(VrmError::Config { problems }),
        }
    }

    /// Configuration for tests and embedding, pointing at an arbitrary base
    /// URL.
    pub fn for_base_url(base_url: impl Into<String>, token: impl Into<String>, site_id: u64) -> Self {
        Self {
            token: token.into(),
            site_id,
            auth_header: "X-Authorization".to_string(),
            base_url: base_url.into(),
            timeout: REQUEST_TIMEOUT,
            default_max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_base_url() {
        let cfg = VrmConfig::for_base_url("http://localhost:9", "tok", 7);
        assert_eq!(cfg.site_id, 7);
        assert_eq!(cfg.auth_header, "X-Authorization");
        assert_eq!(cfg.default_max_chunk_bytes, DEFAULT_MAX_CHUNK_BYTES);
    }
}
