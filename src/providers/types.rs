use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Request in the primary provider's generate shape. Feature code builds
/// this directly; the gateway translates it for the fallback path only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub prompt: String,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Request in the fallback provider's chat shape, produced by the gateway's
/// translation of a [`GenerateRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Normalized provider response.
///
/// `raw` keeps the full response body so the token-usage extractor can probe
/// whatever usage shape this provider version happens to expose.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub raw: serde_json::Value,
    pub rate_limit: RateLimitInfo,
}

/// Rate-limit headroom reported by the provider, when it exposes any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: Option<i64>,
    pub reset: Option<i64>,
}

impl RateLimitInfo {
    /// Capture `x-ratelimit-remaining` / `x-ratelimit-reset` from response
    /// headers. Absent or unparseable headers are simply dropped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_i64(headers, "x-ratelimit-remaining"),
            reset: header_i64(headers, "x-ratelimit-reset"),
        }
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
