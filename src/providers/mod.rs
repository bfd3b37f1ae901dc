//! Provider Module
//!
//! Defines the provider traits and error type, plus the concrete HTTP
//! clients for the two providers the gateway fronts (Cohere primary,
//! OpenAI fallback) and the defensive token-usage extractor.

pub mod cohere;
pub mod openai;
pub mod types;
pub mod usage;

use std::future::Future;
use std::pin::Pin;

use crate::providers::types::{ChatRequest, GenerateRequest, ProviderResponse};

// Re-exports for convenience.
pub use self::cohere::CohereClient;
pub use self::openai::OpenAiClient;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Errors that can occur during a provider call.
///
/// A primary-provider error is recovered locally by the fallback attempt;
/// a fallback error after a primary failure is folded into
/// [`GatewayError::BothProvidersFailed`](crate::error::GatewayError) at the
/// gateway boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

/// The primary provider's generate contract.
///
/// Async methods return boxed futures so the trait is dyn-compatible (can be
/// used as `Arc<dyn GenerateProvider>`). The credential is passed per call
/// because the registry selects it for each invocation.
pub trait GenerateProvider: Send + Sync {
    /// Provider identifier used for metering and logs (e.g. "cohere").
    fn id(&self) -> &str;

    /// Human-readable display name.
    fn name(&self) -> &str;

    /// Non-streaming text generation.
    fn generate(
        &self,
        request: &GenerateRequest,
        secret: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderResponse, ProviderError>> + Send + '_>>;
}

/// The fallback provider's chat contract. Requests reach it only through
/// the gateway's translation of a failed primary request.
pub trait ChatProvider: Send + Sync {
    /// Provider identifier used for metering and logs (e.g. "openai").
    fn id(&self) -> &str;

    /// Human-readable display name.
    fn name(&self) -> &str;

    /// Non-streaming chat completion.
    fn chat(
        &self,
        request: &ChatRequest,
        secret: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderResponse, ProviderError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_rate_limited() {
        let err = ProviderError::RateLimited {
            message: "monthly token cap reached".into(),
        };
        assert_eq!(err.to_string(), "Rate limited: monthly token cap reached");
    }

    #[test]
    fn test_provider_error_api() {
        let err = ProviderError::Api {
            status: 500,
            message: "internal error".into(),
        };
        assert_eq!(err.to_string(), "API error (500): internal error");
    }

    #[test]
    fn test_provider_error_malformed() {
        let err = ProviderError::MalformedResponse("missing generations[0].text".into());
        assert_eq!(
            err.to_string(),
            "Malformed response: missing generations[0].text"
        );
    }

    #[test]
    fn test_provider_error_other() {
        let err = ProviderError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
