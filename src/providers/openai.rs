//! OpenAI Provider
//!
//! HTTP client for the fallback provider's `/v1/chat/completions` endpoint.
//! Like the primary client, the body is kept as raw JSON for the usage
//! extractor and rate-limit headers are captured when present.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client;

use crate::providers::types::{ChatRequest, ProviderResponse, RateLimitInfo};
use crate::providers::{ChatProvider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI chat completions API.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Override the API base URL (used by tests and compatible proxies).
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Build the JSON body for `POST /v1/chat/completions`.
    fn build_request_body(request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
        });

        if let Some(max) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }

    /// Pull the assistant message text out of a response body.
    fn extract_text(raw: &serde_json::Value) -> Result<String, ProviderError> {
        raw["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("missing choices[0].message.content".into())
            })
    }
}

impl ChatProvider for OpenAiClient {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn chat(
        &self,
        request: &ChatRequest,
        secret: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderResponse, ProviderError>> + Send + '_>> {
        let request = request.clone();
        let secret = secret.to_string();
        Box::pin(async move {
            let url = format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            );
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::ChatMessage;
    use serde_json::json;

    fn make_request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![ChatMessage::user("Negotiate my salary")],
            max_tokens: None,
            temperature: None,
        }
    }

    #[test]
    fn test_build_request_body_minimal() {
        let body = OpenAiClient::build_request_body(&make_request());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Negotiate my salary");
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_build_request_body_passes_tuning_fields() {
        let mut request = make_request();
        request.max_tokens = Some(500);
        request.temperature = Some(0.7);

        let body = OpenAiClient::build_request_body(&request);
        assert_eq!(body["max_tokens"], 500);
        let temp = body["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 0.001, "temperature was {temp}");
    }

    #[test]
    fn test_extract_text() {
        let raw = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Sure." } }]
        });
        assert_eq!(OpenAiClient::extract_text(&raw).unwrap(), "Sure.");
    }

    #[test]
    fn test_extract_text_missing_is_malformed() {
        let raw = json!({ "choices": [] });
        let err = OpenAiClient::extract_text(&raw).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn test_client_identity() {
        let client = OpenAiClient::new(Client::new());
        assert_eq!(client.id(), "openai");
        assert_eq!(client.name(), "OpenAI");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }
}
