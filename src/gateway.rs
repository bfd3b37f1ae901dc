//! Call Gateway
//!
//! The single front door for outbound AI provider calls. Each invocation
//! selects a primary credential, attempts the primary provider, falls back
//! at most once to the secondary provider on any failure, and records
//! telemetry before returning.
//!
//! Telemetry is best-effort: a metering write that fails is logged and
//! swallowed, it never changes the outcome already produced by the
//! provider calls. Quota counters are advisory and are not consulted
//! before dispatch.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::GatewayError;
use crate::metrics::{
    CallLogEntry, FallbackEvent, MetricsStore, current_period, format_timestamp,
};
use crate::providers::types::{ChatMessage, ChatRequest, GenerateRequest, RateLimitInfo};
use crate::providers::usage::extract_tokens;
use crate::providers::{
    ChatProvider, CohereClient, GenerateProvider, OpenAiClient, ProviderError,
};
use crate::registry::CredentialRegistry;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a successful gateway invocation returns: the generated text plus
/// enough attribution detail for the caller to display or bill.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub text: String,
    /// Provider that actually served the call.
    pub provider: String,
    /// Owner label the call was metered against.
    pub owner: String,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub used_fallback: bool,
}

// ---------------------------------------------------------------------------
// Internal resolution
// ---------------------------------------------------------------------------

/// One executed provider call, successful or not yet classified.
struct ServedCall {
    text: String,
    provider: String,
    owner: String,
    tokens: u64,
    duration_ms: u64,
    rate_limit: RateLimitInfo,
}

impl ServedCall {
    fn from_response(
        provider: &str,
        owner: &str,
        response: crate::providers::types::ProviderResponse,
        duration_ms: u64,
    ) -> Self {
        let tokens = extract_tokens(&response.raw);
        Self {
            text: response.text,
            provider: provider.to_string(),
            owner: owner.to_string(),
            tokens,
            duration_ms,
            rate_limit: response.rate_limit,
        }
    }
}

/// How an invocation resolved, decided before any telemetry is written.
/// Exactly one call log entry is derived from each variant, describing the
/// call that was actually executed (or last attempted).
enum Resolution {
    /// Primary provider served the call.
    Primary(ServedCall),
    /// Primary failed, secondary served the call.
    Fallback {
        served: ServedCall,
        primary_error: ProviderError,
    },
    /// Primary failed and the fallback attempt failed too.
    BothFailed {
        primary_error: ProviderError,
        fallback_error: ProviderError,
        owner: String,
        duration_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// CallGateway
// ---------------------------------------------------------------------------

/// Orchestrates credential selection, the primary call, single-shot
/// fallback, and telemetry recording.
pub struct CallGateway {
    registry: CredentialRegistry,
    metrics: MetricsStore,
    primary: Box<dyn GenerateProvider>,
    fallback: Box<dyn ChatProvider>,
    fallback_model: String,
}

impl CallGateway {
    pub fn new(
        registry: CredentialRegistry,
        metrics: MetricsStore,
        primary: Box<dyn GenerateProvider>,
        fallback: Box<dyn ChatProvider>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            metrics,
            primary,
            fallback,
            fallback_model: fallback_model.into(),
        }
    }

    /// Wire up the default provider pair (Cohere primary, OpenAI fallback)
    /// from configuration, sharing one HTTP client between them.
    pub fn from_config(config: &Config, db: Database) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .unwrap_or_default();

        Self::new(
            CredentialRegistry::from_config(config),
            MetricsStore::new(db),
            Box::new(CohereClient::new(http.clone())),
            Box::new(OpenAiClient::new(http)),
            config.fallback.model.clone(),
        )
    }

    /// Execute one generation call.
    ///
    /// `endpoint` is a free-form label for the calling feature (for example
    /// `"cover_letter"`), recorded in the call log for per-feature reporting.
    ///
    /// Fails fast with [`GatewayError::NoCredentialConfigured`] before any
    /// provider traffic or telemetry write when the primary provider has no
    /// credential. After that point every invocation writes exactly one call
    /// log entry and one usage increment, plus one fallback event when the
    /// secondary provider was attempted.
    pub async fn call(
        &self,
        request: GenerateRequest,
        endpoint: &str,
    ) -> Result<CallOutcome, GatewayError> {
        let credential = self.registry.select_primary(self.primary.id())?;
        debug!(
            provider = self.primary.id(),
            owner = %credential.owner,
            endpoint,
            "primary credential selected"
        );

        let started = Instant::now();
        let resolution = match self.primary.generate(&request, &credential.secret).await {
            Ok(response) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    provider = self.primary.id(),
                    owner = %credential.owner,
                    duration_ms,
                    "primary call succeeded"
                );
                Resolution::Primary(ServedCall::from_response(
                    self.primary.id(),
                    &credential.owner,
                    response,
                    duration_ms,
                ))
            }
            Err(primary_error) => {
                warn!(
                    provider = self.primary.id(),
                    owner = %credential.owner,
                    error = %primary_error,
                    "primary call failed, attempting fallback"
                );
                self.attempt_fallback(&request, primary_error).await
            }
        };

        self.record_telemetry(&resolution, endpoint).await;

        match resolution {
            Resolution::Primary(served) => Ok(CallOutcome {
                text: served.text,
                provider: served.provider,
                owner: served.owner,
                tokens_used: served.tokens,
                duration_ms: served.duration_ms,
                used_fallback: false,
            }),
            Resolution::Fallback { served, .. } => Ok(CallOutcome {
                text: served.text,
                provider: served.provider,
                owner: served.owner,
                tokens_used: served.tokens,
                duration_ms: served.duration_ms,
                used_fallback: true,
            }),
            Resolution::BothFailed {
                primary_error,
                fallback_error,
                ..
            } => {
                error!(
                    primary = self.primary.id(),
                    fallback = self.fallback.id(),
                    primary_error = %primary_error,
                    fallback_error = %fallback_error,
                    "both providers failed"
                );
                Err(GatewayError::BothProvidersFailed {
                    primary: primary_error.to_string(),
                    fallback: fallback_error.to_string(),
                })
            }
        }
    }

    /// Single-shot secondary attempt. A missing fallback credential is
    /// treated as a failed attempt, not a configuration error surfaced to
    /// the caller, so the combined error still names both providers.
    async fn attempt_fallback(
        &self,
        request: &GenerateRequest,
        primary_error: ProviderError,
    ) -> Resolution {
        let started = Instant::now();

        let credential = match self.registry.fallback_credential() {
            Ok(credential) => credential,
            Err(err) => {
                return Resolution::BothFailed {
                    primary_error,
                    fallback_error: ProviderError::Other(err.to_string()),
                    owner: format!("{}_fallback", self.fallback.id()),
                    duration_ms: started.elapsed().as_millis() as u64,
                };
            }
        };

        let chat = self.map_to_fallback(request);
        match self.fallback.chat(&chat, &credential.secret).await {
            Ok(response) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    provider = self.fallback.id(),
                    duration_ms,
                    "fallback call succeeded"
                );
                Resolution::Fallback {
                    served: ServedCall::from_response(
                        self.fallback.id(),
                        &credential.owner,
                        response,
                        duration_ms,
                    ),
                    primary_error,
                }
            }
            Err(fallback_error) => Resolution::BothFailed {
                primary_error,
                fallback_error,
                owner: credential.owner,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        }
    }

    /// Translate a generation request into the fallback provider's chat
    /// shape: the prompt becomes a single user message and the configured
    /// fallback model replaces whatever primary model was requested.
    fn map_to_fallback(&self, request: &GenerateRequest) -> ChatRequest {
        ChatRequest {
            model: self.fallback_model.clone(),
            messages: vec![ChatMessage::user(&request.prompt)],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    /// Derive and write the telemetry for one resolved invocation: exactly
    /// one call log entry, one usage increment, and a fallback event when
    /// the secondary provider was attempted. Each write failure is logged
    /// and swallowed.
    async fn record_telemetry(&self, resolution: &Resolution, endpoint: &str) {
        let now = Utc::now();
        let timestamp = format_timestamp(now);

        let (entry, fallback_attempt) = match resolution {
            Resolution::Primary(served) => {
                (self.build_entry(served, endpoint, &timestamp, None), None)
            }
            Resolution::Fallback {
                served,
                primary_error,
            } => (
                self.build_entry(served, endpoint, &timestamp, None),
                Some((primary_error.to_string(), true)),
            ),
            Resolution::BothFailed {
                primary_error,
                fallback_error,
                owner,
                duration_ms,
            } => (
                CallLogEntry {
                    id: Uuid::new_v4().to_string(),
                    timestamp: timestamp.clone(),
                    provider: self.fallback.id().to_string(),
                    endpoint: endpoint.to_string(),
                    key_owner: owner.clone(),
                    duration_ms: *duration_ms,
                    success: false,
                    error: Some(fallback_error.to_string()),
                    tokens_used: 0,
                    rate_limit_remaining: None,
                    rate_limit_reset: None,
                },
                Some((primary_error.to_string(), false)),
            ),
        };

        if let Err(err) = self.metrics.log_call(&entry).await {
            warn!(error = %err, "failed to record call log entry");
        }

        let errors = if entry.success { 0 } else { 1 };
        if let Err(err) = self
            .metrics
            .increment_usage(
                &entry.provider,
                &entry.key_owner,
                &current_period(),
                1,
                entry.tokens_used,
                errors,
            )
            .await
        {
            warn!(error = %err, "failed to update usage counters");
        }

        if let Some((original_error, fallback_success)) = fallback_attempt {
            let event = FallbackEvent {
                id: Uuid::new_v4().to_string(),
                timestamp,
                primary_provider: self.primary.id().to_string(),
                fallback_provider: self.fallback.id().to_string(),
                success: fallback_success,
                original_error,
            };
            if let Err(err) = self.metrics.log_fallback(&event).await {
                warn!(error = %err, "failed to record fallback event");
            }
        }
    }

    fn build_entry(
        &self,
        served: &ServedCall,
        endpoint: &str,
        timestamp: &str,
        error: Option<String>,
    ) -> CallLogEntry {
        CallLogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: timestamp.to_string(),
            provider: served.provider.clone(),
            endpoint: endpoint.to_string(),
            key_owner: served.owner.clone(),
            duration_ms: served.duration_ms,
            success: error.is_none(),
            error,
            tokens_used: served.tokens,
            rate_limit_remaining: served.rate_limit.remaining,
            rate_limit_reset: served.rate_limit.reset,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialConfig, SelectionPolicy};
    use crate::providers::types::ProviderResponse;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // -- stub providers ------------------------------------------------------

    struct StubGenerate {
        results: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
        calls: AtomicUsize,
    }

    impl StubGenerate {
        fn new(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl GenerateProvider for Arc<StubGenerate> {
        fn id(&self) -> &str {
            "cohere"
        }

        fn name(&self) -> &str {
            "Stub Cohere"
        }

        fn generate(
            &self,
            _request: &GenerateRequest,
            _secret: &str,
        ) -> Pin<Box<dyn Future<Output = Result<ProviderResponse, ProviderError>> + Send + '_>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self
                .results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::Other("stub exhausted".to_string())));
            Box::pin(async move { result })
        }
    }

    struct StubChat {
        results: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl StubChat {
        fn new(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatProvider for Arc<StubChat> {
        fn id(&self) -> &str {
            "openai"
        }

        fn name(&self) -> &str {
            "Stub OpenAI"
        }

        fn chat(
            &self,
            request: &ChatRequest,
            _secret: &str,
        ) -> Pin<Box<dyn Future<Output = Result<ProviderResponse, ProviderError>> + Send + '_>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            let result = self
                .results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::Other("stub exhausted".to_string())));
            Box::pin(async move { result })
        }
    }

    // -- harness -------------------------------------------------------------

    fn ok_response(text: &str, raw: serde_json::Value) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            text: text.to_string(),
            raw,
            rate_limit: RateLimitInfo::default(),
        })
    }

    fn test_config(fallback_secret: Option<&str>) -> Config {
        let mut config = Config::default();
        config.primary.credentials = vec![CredentialConfig {
            owner: "alice".to_string(),
            secret: "co-key-alice".to_string(),
        }];
        config.primary.quota_limit = 1000;
        config.fallback.secret = fallback_secret.map(str::to_string);
        config.fallback.model = "gpt-4o-mini".to_string();
        config
    }

    struct Harness {
        gateway: CallGateway,
        metrics: MetricsStore,
        db: Database,
        primary: Arc<StubGenerate>,
        chat: Arc<StubChat>,
    }

    fn harness(
        config: &Config,
        primary: Vec<Result<ProviderResponse, ProviderError>>,
        fallback: Vec<Result<ProviderResponse, ProviderError>>,
    ) -> Harness {
        let db = Database::open_in_memory().unwrap();
        let primary = Arc::new(StubGenerate::new(primary));
        let chat = Arc::new(StubChat::new(fallback));

        let gateway = CallGateway::new(
            CredentialRegistry::from_config(config),
            MetricsStore::new(db.clone()),
            Box::new(Arc::clone(&primary)),
            Box::new(Arc::clone(&chat)),
            config.fallback.model.clone(),
        );

        Harness {
            gateway,
            metrics: MetricsStore::new(db.clone()),
            db,
            primary,
            chat,
        }
    }

    fn window() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
        let now = Utc::now();
        (
            now - chrono::Duration::hours(1),
            now + chrono::Duration::hours(1),
        )
    }

    // -- scenarios -----------------------------------------------------------

    #[tokio::test]
    async fn test_primary_success_records_one_entry_and_no_fallback() {
        let h = harness(
            &test_config(Some("sk-fallback")),
            vec![ok_response(
                "Dear hiring manager",
                json!({ "meta": { "billed_units": { "input_tokens": 40, "output_tokens": 60 } } }),
            )],
            vec![],
        );

        let outcome = h
            .gateway
            .call(GenerateRequest::new("write a cover letter"), "cover_letter")
            .await
            .unwrap();

        assert_eq!(outcome.text, "Dear hiring manager");
        assert_eq!(outcome.provider, "cohere");
        assert_eq!(outcome.owner, "alice");
        assert_eq!(outcome.tokens_used, 100);
        assert!(!outcome.used_fallback);
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);

        let (start, end) = window();
        let stats = h.metrics.usage_stats(start, end, None, None).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].provider, "cohere");
        assert_eq!(stats[0].key_owner, "alice");
        assert_eq!(stats[0].total_calls, 1);
        assert_eq!(stats[0].successful_calls, 1);
        assert_eq!(stats[0].total_tokens, 100);

        assert!(h.metrics.fallback_events(start, end).await.unwrap().is_empty());
        assert_eq!(
            h.metrics
                .monthly_usage("cohere", &current_period())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_primary_failure_masked_by_fallback() {
        let h = harness(
            &test_config(Some("sk-fallback")),
            vec![Err(ProviderError::Api {
                status: 500,
                message: "internal error".to_string(),
            })],
            vec![ok_response(
                "Fallback text",
                json!({ "usage": { "prompt_tokens": 30, "completion_tokens": 90 } }),
            )],
        );

        let outcome = h
            .gateway
            .call(GenerateRequest::new("write a cover letter"), "cover_letter")
            .await
            .unwrap();

        assert_eq!(outcome.text, "Fallback text");
        assert_eq!(outcome.provider, "openai");
        assert_eq!(outcome.owner, "openai_fallback");
        assert_eq!(outcome.tokens_used, 120);
        assert!(outcome.used_fallback);

        let (start, end) = window();
        let events = h.metrics.fallback_events(start, end).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
        assert_eq!(events[0].primary_provider, "cohere");
        assert_eq!(events[0].fallback_provider, "openai");
        assert_eq!(events[0].original_error, "API error (500): internal error");

        // Exactly one call log entry, describing the executed fallback call.
        let stats = h.metrics.usage_stats(start, end, None, None).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].provider, "openai");
        assert_eq!(stats[0].key_owner, "openai_fallback");
        assert_eq!(stats[0].total_calls, 1);
        assert_eq!(stats[0].successful_calls, 1);

        assert_eq!(
            h.metrics
                .monthly_usage("openai", &current_period())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_fallback_request_mapping() {
        let h = harness(
            &test_config(Some("sk-fallback")),
            vec![Err(ProviderError::RateLimited {
                message: "slow down".to_string(),
            })],
            vec![ok_response("ok", json!({}))],
        );

        let request = GenerateRequest {
            model: Some("command".to_string()),
            prompt: "summarize my experience".to_string(),
            max_tokens: Some(256),
            temperature: Some(0.4),
        };
        h.gateway.call(request, "summary").await.unwrap();

        let seen = h.chat.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        // Primary model names never leak to the fallback provider.
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].messages.len(), 1);
        assert_eq!(seen[0].messages[0].role, "user");
        assert_eq!(seen[0].messages[0].content, "summarize my experience");
        assert_eq!(seen[0].max_tokens, Some(256));
        assert_eq!(seen[0].temperature, Some(0.4));
    }

    #[tokio::test]
    async fn test_both_providers_failing_surfaces_combined_error() {
        let h = harness(
            &test_config(Some("sk-fallback")),
            vec![Err(ProviderError::RateLimited {
                message: "slow down".to_string(),
            })],
            vec![Err(ProviderError::Api {
                status: 401,
                message: "bad key".to_string(),
            })],
        );

        let err = h
            .gateway
            .call(GenerateRequest::new("anything"), "cover_letter")
            .await
            .unwrap_err();

        match err {
            GatewayError::BothProvidersFailed { primary, fallback } => {
                assert_eq!(primary, "Rate limited: slow down");
                assert_eq!(fallback, "API error (401): bad key");
            }
            other => panic!("expected BothProvidersFailed, got {other:?}"),
        }

        let (start, end) = window();
        let events = h.metrics.fallback_events(start, end).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!(events[0].original_error, "Rate limited: slow down");

        let errors = h.metrics.recent_errors(10).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].provider, "openai");
        assert_eq!(errors[0].key_owner, "openai_fallback");
        assert_eq!(errors[0].error.as_deref(), Some("API error (401): bad key"));
        assert_eq!(errors[0].tokens_used, 0);

        // The failed invocation still counts toward usage, with an error.
        let stats = h.metrics.usage_stats(start, end, None, None).await.unwrap();
        assert_eq!(stats[0].failed_calls, 1);
    }

    #[tokio::test]
    async fn test_missing_fallback_credential_counts_as_fallback_failure() {
        let h = harness(
            &test_config(None),
            vec![Err(ProviderError::Api {
                status: 503,
                message: "down".to_string(),
            })],
            vec![ok_response("never reached", json!({}))],
        );

        let err = h
            .gateway
            .call(GenerateRequest::new("anything"), "cover_letter")
            .await
            .unwrap_err();

        match err {
            GatewayError::BothProvidersFailed { primary, fallback } => {
                assert_eq!(primary, "API error (503): down");
                assert!(fallback.contains("openai"), "got: {fallback}");
            }
            other => panic!("expected BothProvidersFailed, got {other:?}"),
        }

        // The secondary client itself was never invoked.
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);

        let (start, end) = window();
        let events = h.metrics.fallback_events(start, end).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
    }

    #[tokio::test]
    async fn test_no_credential_fails_fast_with_zero_writes() {
        let mut config = test_config(Some("sk-fallback"));
        config.primary.credentials.clear();

        let h = harness(&config, vec![ok_response("unused", json!({}))], vec![]);

        let err = h
            .gateway
            .call(GenerateRequest::new("anything"), "cover_letter")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoCredentialConfigured(_)));

        assert_eq!(h.primary.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);

        let (start, end) = window();
        assert!(h.metrics.usage_stats(start, end, None, None).await.unwrap().is_empty());
        assert!(h.metrics.fallback_events(start, end).await.unwrap().is_empty());
        assert_eq!(
            h.metrics
                .monthly_usage("cohere", &current_period())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_rate_limited_primary_still_meters_fallback_tokens() {
        let h = harness(
            &test_config(Some("sk-fallback")),
            vec![Err(ProviderError::RateLimited {
                message: "monthly cap reached".to_string(),
            })],
            vec![ok_response(
                "served by fallback",
                json!({ "usage": { "total_tokens": 120 } }),
            )],
        );

        let outcome = h
            .gateway
            .call(GenerateRequest::new("anything"), "cover_letter")
            .await
            .unwrap();
        assert_eq!(outcome.tokens_used, 120);

        let (start, end) = window();
        let stats = h
            .metrics
            .usage_stats(start, end, Some("openai"), None)
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_tokens, 120);
    }

    #[tokio::test]
    async fn test_telemetry_failure_does_not_change_outcome() {
        let h = harness(
            &test_config(Some("sk-fallback")),
            vec![ok_response(
                "still served",
                json!({ "usage": { "total_tokens": 10 } }),
            )],
            vec![],
        );

        // Break the telemetry tables out from under the gateway.
        h.db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE call_log; DROP TABLE usage_quota;")
        })
        .unwrap();

        let outcome = h
            .gateway
            .call(GenerateRequest::new("anything"), "cover_letter")
            .await
            .unwrap();
        assert_eq!(outcome.text, "still served");
        assert!(!outcome.used_fallback);
    }

    #[tokio::test]
    async fn test_round_robin_rotates_owner_attribution() {
        let mut config = test_config(Some("sk-fallback"));
        config.primary.credentials = vec![
            CredentialConfig {
                owner: "alice".to_string(),
                secret: "k1".to_string(),
            },
            CredentialConfig {
                owner: "bob".to_string(),
                secret: "k2".to_string(),
            },
        ];
        config.primary.selection_policy = SelectionPolicy::RoundRobin;

        let h = harness(
            &config,
            vec![ok_response("a", json!({})), ok_response("b", json!({}))],
            vec![],
        );

        let first = h
            .gateway
            .call(GenerateRequest::new("one"), "cover_letter")
            .await
            .unwrap();
        let second = h
            .gateway
            .call(GenerateRequest::new("two"), "cover_letter")
            .await
            .unwrap();
        assert_eq!(first.owner, "alice");
        assert_eq!(second.owner, "bob");
    }
}
