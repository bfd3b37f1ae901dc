//! Credential Registry
//!
//! Holds the provider credentials loaded from configuration, keyed by
//! provider name, together with the per-provider monthly quota limits and
//! the single fallback credential. Read-mostly after startup: the only
//! mutable state is the round-robin cursor, so the registry can be shared
//! across tasks as a plain `Arc` without a lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{Config, SelectionPolicy};
use crate::error::GatewayError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A configured credential with its owner attribution label.
#[derive(Debug, Clone)]
pub struct Credential {
    pub owner: String,
    pub secret: String,
}

/// The credential chosen for one call: who to bill and what to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCredential {
    pub owner: String,
    pub secret: String,
}

// ---------------------------------------------------------------------------
// CredentialRegistry
// ---------------------------------------------------------------------------

/// Registry of provider credentials and quota limits.
///
/// Selection among multiple primary credentials is governed by the
/// configured [`SelectionPolicy`]. `Static` always picks the first
/// configured credential and keeps no state between calls; `RoundRobin`
/// cycles with an atomic cursor.
pub struct CredentialRegistry {
    /// Provider name -> configured credentials, in configuration order.
    credentials: HashMap<String, Vec<Credential>>,
    /// Provider name -> monthly call cap. Absent or 0 means unlimited.
    quota_limits: HashMap<String, u64>,
    primary_provider: String,
    fallback_provider: String,
    fallback_secret: Option<String>,
    policy: SelectionPolicy,
    /// Round-robin cursor. Unused under the `Static` policy.
    cursor: AtomicUsize,
}

impl CredentialRegistry {
    /// Build the registry from loaded configuration. Empty credential lists
    /// are not rejected here; they surface as [`GatewayError::NoCredentialConfigured`]
    /// at the point of use.
    pub fn from_config(config: &Config) -> Self {
        let mut credentials: HashMap<String, Vec<Credential>> = HashMap::new();
        credentials.insert(
            config.primary.provider.clone(),
            config
                .primary
                .credentials
                .iter()
                .map(|c| Credential {
                    owner: c.owner.clone(),
                    secret: c.secret.clone(),
                })
                .collect(),
        );

        let mut quota_limits = HashMap::new();
        if config.primary.quota_limit > 0 {
            quota_limits.insert(config.primary.provider.clone(), config.primary.quota_limit);
        }

        Self {
            credentials,
            quota_limits,
            primary_provider: config.primary.provider.clone(),
            fallback_provider: config.fallback.provider.clone(),
            fallback_secret: config.fallback.secret.clone(),
            policy: config.primary.selection_policy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Name of the configured primary provider.
    pub fn primary_provider(&self) -> &str {
        &self.primary_provider
    }

    /// Name of the configured fallback provider.
    pub fn fallback_provider(&self) -> &str {
        &self.fallback_provider
    }

    /// Choose a credential for the named provider according to the selection
    /// policy.
    ///
    /// Errors with [`GatewayError::NoCredentialConfigured`] when the provider
    /// has no credentials -- a startup configuration problem, not a condition
    /// to retry.
    pub fn select_primary(&self, provider: &str) -> Result<SelectedCredential, GatewayError> {
        let creds = self
            .credentials
            .get(provider)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GatewayError::NoCredentialConfigured(provider.to_string()))?;

        let index = match self.policy {
            SelectionPolicy::Static => 0,
            SelectionPolicy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % creds.len(),
        };

        let cred = &creds[index];
        Ok(SelectedCredential {
            owner: cred.owner.clone(),
            secret: cred.secret.clone(),
        })
    }

    /// Configured monthly call cap for a provider. 0 means unlimited, which
    /// callers must treat distinctly from an exhausted quota.
    pub fn quota_limit(&self, provider: &str) -> u64 {
        self.quota_limits.get(provider).copied().unwrap_or(0)
    }

    /// The single fallback-provider credential. Usage on the fallback path
    /// is attributed to the synthetic owner `"<provider>_fallback"` so it is
    /// never conflated with a primary key owner.
    pub fn fallback_credential(&self) -> Result<SelectedCredential, GatewayError> {
        let secret = self
            .fallback_secret
            .clone()
            .ok_or_else(|| GatewayError::NoCredentialConfigured(self.fallback_provider.clone()))?;
        Ok(SelectedCredential {
            owner: format!("{}_fallback", self.fallback_provider),
            secret,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
