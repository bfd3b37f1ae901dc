/// Errors surfaced by the gateway and its read-side consumers.
///
/// Only `BothProvidersFailed` reaches feature callers at runtime; a primary
/// provider failure is recovered locally by the fallback attempt, and
/// telemetry write failures are logged and absorbed (see `gateway`).
/// `NoCredentialConfigured` indicates startup misconfiguration, not a
/// condition to retry.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No credential configured for provider: {0}")]
    NoCredentialConfigured(String),

    #[error("Both providers failed; primary: {primary}; fallback: {fallback}")]
    BothProvidersFailed { primary: String, fallback: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Template error: {0}")]
    Template(String),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        tracing::error!(error = %err, "Database error");
        Self::Database(err.to_string())
    }
}

impl From<minijinja::Error> for GatewayError {
    fn from(err: minijinja::Error) -> Self {
        Self::Template(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_credential_display() {
        let err = GatewayError::NoCredentialConfigured("cohere".into());
        assert_eq!(
            err.to_string(),
            "No credential configured for provider: cohere"
        );
    }

    #[test]
    fn test_both_failed_contains_both_messages() {
        let err = GatewayError::BothProvidersFailed {
            primary: "Rate limited: slow down".into(),
            fallback: "API error (500): boom".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Rate limited: slow down"));
        assert!(text.contains("API error (500): boom"));
    }

    #[test]
    fn test_database_error_from_rusqlite() {
        let err: GatewayError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, GatewayError::Database(_)));
    }
}
