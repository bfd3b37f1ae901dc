use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Primary provider: the service feature code targets directly. Several
/// credentials may be configured, each attributing usage to an owner label.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrimaryConfig {
    #[serde(default = "default_primary_provider")]
    pub provider: String,
    /// Credentials tried according to `selection_policy`.
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
    /// Monthly call cap across all owners. 0 means unlimited.
    #[serde(default)]
    pub quota_limit: u64,
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            provider: default_primary_provider(),
            credentials: Vec::new(),
            quota_limit: 0,
            selection_policy: SelectionPolicy::default(),
        }
    }
}

/// A single provider credential with its owner attribution label.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    pub owner: String,
    pub secret: String,
}

/// Fallback provider: invoked once when the primary call fails. Usage on
/// this path is attributed to the synthetic owner `"<provider>_fallback"`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_provider")]
    pub provider: String,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Model the mapped fallback request is sent to.
    #[serde(default = "default_fallback_model")]
    pub model: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            provider: default_fallback_provider(),
            secret: None,
            model: default_fallback_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Request timeout for provider calls. The gateway itself implements no
    /// timeout or cancellation; this is the only bound on call latency.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Selection policy
// ---------------------------------------------------------------------------

/// How the registry chooses among multiple primary credentials.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Always the first configured credential. Callers must not assume any
    /// state is kept between calls.
    #[default]
    Static,
    /// Cycle through the credential list with an atomic cursor.
    RoundRobin,
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::RoundRobin => write!(f, "round_robin"),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "static" => Ok(Self::Static),
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            _ => Err(format!("Unknown selection policy: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_db_path() -> PathBuf {
    PathBuf::from("tollgate.db")
}
fn default_primary_provider() -> String {
    "cohere".to_string()
}
fn default_fallback_provider() -> String {
    "openai".to_string()
}
fn default_fallback_model() -> String {
    "gpt-4o-mini".to_string()
}
const fn default_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting prefixed with `TOLLGATE_` takes precedence over
    /// the file value, so secrets can be kept out of the file entirely.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        macro_rules! env_str {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                }
            };
        }
        macro_rules! env_bool {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                }
            };
        }
        macro_rules! env_parse {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                    }
                }
            };
        }

        // -- Database --
        if let Ok(val) = std::env::var("TOLLGATE_DATABASE_PATH") {
            self.database.path = PathBuf::from(val);
        }

        // -- Primary provider --
        //
        // TOLLGATE_PRIMARY_SECRET injects a single credential, replacing any
        // file-configured credential with the same owner. The owner label
        // defaults to "default" and can be set with TOLLGATE_PRIMARY_OWNER.
        if let Ok(secret) = std::env::var("TOLLGATE_PRIMARY_SECRET") {
            let owner = std::env::var("TOLLGATE_PRIMARY_OWNER")
                .unwrap_or_else(|_| "default".to_string());
            self.primary.credentials.retain(|c| c.owner != owner);
            self.primary.credentials.push(CredentialConfig { owner, secret });
        }
        env_parse!("TOLLGATE_PRIMARY_QUOTA_LIMIT", self.primary.quota_limit);
        if let Ok(val) = std::env::var("TOLLGATE_PRIMARY_SELECTION_POLICY") {
            if let Ok(policy) = val.parse() {
                self.primary.selection_policy = policy;
            }
        }

        // -- Fallback provider --
        if let Ok(val) = std::env::var("TOLLGATE_FALLBACK_SECRET") {
            self.fallback.secret = if val.is_empty() { None } else { Some(val) };
        }
        env_str!("TOLLGATE_FALLBACK_MODEL", self.fallback.model);

        // -- HTTP --
        env_parse!("TOLLGATE_HTTP_TIMEOUT_SECS", self.http.timeout_secs);

        // -- Logging --
        env_str!("TOLLGATE_LOG_LEVEL", self.logging.level);
        env_bool!("TOLLGATE_LOG_JSON", self.logging.json);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
