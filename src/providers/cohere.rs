//! Cohere Provider
//!
//! HTTP client for the primary provider's `/v1/generate` endpoint. The
//! response body is kept as raw JSON so the usage extractor can probe it,
//! and rate-limit headers are captured when the API exposes them.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client;

use crate::providers::types::{GenerateRequest, ProviderResponse, RateLimitInfo};
use crate::providers::{GenerateProvider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";

/// Client for the Cohere generate API.
///
/// The `reqwest::Client` is shared with the other provider client; its
/// configured timeout is the only bound on call latency the gateway has.
pub struct CohereClient {
    client: Client,
    base_url: String,
}

impl CohereClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Override the API base URL (used by tests and self-hosted deployments).
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Build the JSON body for `POST /v1/generate`. Absent optional fields
    /// are omitted so the provider applies its own defaults.
    fn build_request_body(request: &GenerateRequest) -> serde_json::Value {
        let mut body = serde_json::json!({ "prompt": request.prompt });

        if let Some(ref model) = request.model {
            body["model"] = serde_json::json!(model);
        }
        if let Some(max) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }

    /// Pull the generated text out of a response body.
    fn extract_text(raw: &serde_json::Value) -> Result<String, ProviderError> {
        raw["generations"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedResponse("missing generations[0].text".into()))
    }
}

impl GenerateProvider for CohereClient {
    fn id(&self) -> &str {
        "cohere"
    }

    fn name(&self) -> &str {
        "Cohere"
    }

    fn generate(
        &self,
        request: &GenerateRequest,
        secret: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderResponse, ProviderError>> + Send + '_>> {
        let request = request.clone();
        let secret = secret.to_string();
        Box::pin(async move {
            let url = format!("{}/v1/generate", self.base_url.trim_end_matches('/'));
            let body = Self::build_request_body(&request);

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&secret)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            let rate_limit = RateLimitInfo::from_headers(resp.headers());

            if status.as_u16() == 429 {
                let message = resp.text().await.unwrap_or_default();
                return Err(ProviderError::RateLimited { message });
            }
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let raw: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            let text = Self::extract_text(&raw)?;

            Ok(ProviderResponse {
                text,
                raw,
                rate_limit,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
