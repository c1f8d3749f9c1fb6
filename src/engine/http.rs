//! HTTP deployment engine client.
//!
//! This client speaks the engine's declare-resource capability: each
//! realization is a single `POST /v1/resources` call carrying the
//! resolved declaration, answered with the engine-side resource id and
//! the produced output attributes. Retry policy belongs to the engine
//! side; the client reports each failure exactly once.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{EngineError, Result, TerraliftError};
use crate::graph::ResourceDeclaration;
use crate::output::OutputMap;

use super::provider::{DeploymentEngine, RealizedResource};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// HTTP client for a remote deployment engine.
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    /// HTTP client.
    client: Client,
    /// Engine base URL.
    base_url: String,
    /// Bearer token.
    token: String,
}

/// Request body for a realization call.
#[derive(Debug, Serialize)]
struct RealizeRequest<'a> {
    /// Resource type tag.
    #[serde(rename = "type")]
    resource_type: &'a str,
    /// Logical resource name.
    name: &'a str,
    /// Declaration fingerprint, the engine's change-detection key: an
    /// unchanged fingerprint lets the engine treat the call as a no-op.
    fingerprint: String,
    /// Fully resolved properties.
    properties: &'a serde_json::Map<String, serde_json::Value>,
}

/// Response body of a successful realization call.
#[derive(Debug, Deserialize)]
struct RealizeResponse {
    /// Engine-side resource id.
    id: String,
    /// Output attributes produced by the realization.
    #[serde(default)]
    outputs: HashMap<String, serde_json::Value>,
}

/// Error body the engine may return.
#[derive(Debug, Deserialize)]
struct EngineErrorResponse {
    /// Error message.
    message: String,
}

impl HttpEngineClient {
    /// Creates a new engine client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(base_url: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Maps an error response to an [`EngineError`].
    async fn error_from_response(response: reqwest::Response) -> TerraliftError {
        let status = response.status();
        let message = response
            .json::<EngineErrorResponse>()
            .await
            .map_or_else(|_| String::from("no error details"), |body| body.message);

        let error = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                EngineError::AuthenticationFailed { message }
            }
            _ => EngineError::api_error(status.as_u16(), message),
        };
        TerraliftError::Engine(error)
    }
}

#[async_trait]
impl DeploymentEngine for HttpEngineClient {
    async fn realize(
        &self,
        declaration: &ResourceDeclaration,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<RealizedResource> {
        let url = format!("{}/v1/resources", self.base_url);
        let request = RealizeRequest {
            resource_type: declaration.resource_type(),
            name: declaration.name(),
            fingerprint: declaration.fingerprint(),
            properties,
        };

        debug!(resource = %declaration.ident(), %url, "Realizing via engine API");
        trace!(body = %serde_json::to_string(&request).unwrap_or_default());

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: RealizeResponse = response.json().await.map_err(|e| {
            TerraliftError::Engine(EngineError::InvalidResponse {
                message: e.to_string(),
            })
        })?;

        Ok(RealizedResource {
            resource_id: body.id,
            outputs: body.outputs.into_iter().collect::<OutputMap>(),
        })
    }

    fn engine_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn declaration() -> ResourceDeclaration {
        ResourceDeclaration::new("filesystem", "storage").with_property("path", "/www")
    }

    #[tokio::test]
    async fn test_realize_success() {
        let server = MockServer::start().await;
        let decl = declaration();
        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "type": "filesystem",
                "name": "storage",
                "fingerprint": decl.fingerprint(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "fs-123",
                "outputs": { "id": "fs-123", "arn": "arn:fs-123" },
            })))
            .mount(&server)
            .await;

        let client = HttpEngineClient::new(&server.uri(), "secret").unwrap();
        let properties = serde_json::Map::new();

        let realized = client.realize(&decl, &properties).await.unwrap();
        assert_eq!(realized.resource_id, "fs-123");
        assert_eq!(realized.outputs["arn"], serde_json::json!("arn:fs-123"));
    }

    #[tokio::test]
    async fn test_realize_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "message": "capacity exhausted",
            })))
            .mount(&server)
            .await;

        let client = HttpEngineClient::new(&server.uri(), "secret").unwrap();
        let decl = declaration();
        let properties = serde_json::Map::new();

        let err = client.realize(&decl, &properties).await.unwrap_err();
        assert!(matches!(
            err,
            TerraliftError::Engine(EngineError::ApiRequestFailed { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_realize_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "bad token",
            })))
            .mount(&server)
            .await;

        let client = HttpEngineClient::new(&server.uri(), "wrong").unwrap();
        let decl = declaration();
        let properties = serde_json::Map::new();

        let err = client.realize(&decl, &properties).await.unwrap_err();
        assert!(matches!(
            err,
            TerraliftError::Engine(EngineError::AuthenticationFailed { .. })
        ));
    }
}
