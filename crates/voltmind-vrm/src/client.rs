//! JSON client for the VRM API.

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::VrmConfig;
use crate::error::{Result, VrmError, SNIPPET_LIMIT};

/// Async client for the remote installation API.
///
/// One instance is shared by every tool; requests carry the configured
/// token header and time out after the configured duration.
#[derive(Debug, Clone)]
pub struct VrmClient {
    http: Client,
    config: VrmConfig,
}

impl VrmClient {
    /// Build a client from validated configuration.
    pub fn new(config: VrmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// The configured installation id.
    pub fn site_id(&self) -> u64 {
        self.config.site_id
    }

    /// Default chunk budget for listing tools.
    pub fn default_max_chunk_bytes(&self) -> usize {
        self.config.default_max_chunk_bytes
    }

    /// GET an API path (e.g. `/installations/123/diagnostics`) and parse
    /// the response as JSON.
    ///
    /// Non-success statuses become [`VrmError::Api`] carrying the endpoint
    /// and a truncated body snippet. A body that is not a JSON object or
    /// array is wrapped as `{"raw": <text>}`.
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(endpoint = path, "vrm request");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header(
                self.config.auth_header.as_str(),
                format!("Token {}", self.config.token),
            )
            .send()
            .await
            .map_err(|source| VrmError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| VrmError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        if !status.is_success() {
            let snippet: String = text.chars().take(SNIPPET_LIMIT).collect();
            warn!(endpoint = path, status = status.as_u16(), "vrm request failed");
            return Err(VrmError::Api {
                status: status.as_u16(),
                endpoint: path.to_string(),
                snippet,
            });
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(parsed) if parsed.is_object() || parsed.is_array() => Ok(parsed),
            _ => Ok(json!({ "raw": text })),
        }
    }

    /// GET a per-installation path: `/installations/{site}{suffix}`.
    pub async fn get_site_json(&self, suffix: &str) -> Result<Value> {
        let path = format!("/installations/{}{}", self.config.site_id, suffix);
        self.get_json(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VrmConfig;

    #[test]
    fn test_client_construction() {
        let client = VrmClient::new(VrmConfig::for_base_url("http://localhost:9", "tok", 7));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().site_id(), 7);
    }

    #[tokio::test]
    async fn test_transport_error_carries_endpoint() {
        // Nothing listens on this port; the request must fail as transport.
        let cfg = VrmConfig::for_base_url("http://127.0.0.1:1", "tok", 7);
        let client = VrmClient::new(cfg).unwrap();
        let err = client.get_json("/installations/7/diagnostics").await.unwrap_err();
        match err {
            VrmError::Transport { endpoint, .. } => {
                assert_eq!(endpoint, "/installations/7/diagnostics");
            }
            other => panic!("expected transport error, got {other}"),
        }
    }
}
