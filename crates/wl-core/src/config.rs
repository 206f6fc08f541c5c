use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.windlass/config.toml`.
///
/// **Security**: this struct never stores API keys or secrets. Credentials
/// are read from environment variables at runtime; the config only names
/// the variable to read. See [`CredentialProvider`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load config from `~/.windlass/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings not expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.scan_period_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.scan_period_secs must be positive".into(),
            ));
        }
        if !(self.gas.fallback_gwei > 0.0) {
            return Err(ConfigError::Validation(
                "gas.fallback_gwei must be positive".into(),
            ));
        }
        if self.gas.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "gas.poll_interval_secs must be positive".into(),
            ));
        }
        if self.gas.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "gas.request_timeout_secs must be positive".into(),
            ));
        }
        if self.intent.model.trim().is_empty() {
            return Err(ConfigError::Validation("intent.model must be set".into()));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".windlass")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scan period in seconds. One scan at a time; overruns skip the next
    /// tick instead of queueing it.
    #[serde(default = "default_scan_period_secs")]
    pub scan_period_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_period_secs: default_scan_period_secs(),
        }
    }
}

fn default_scan_period_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// JSON-RPC endpoint for `eth_gasPrice`. When unset, the monitor always
    /// answers with `fallback_gwei`.
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Answer used whenever the fee oracle is unreachable.
    #[serde(default = "default_fallback_gwei")]
    pub fallback_gwei: f64,
    /// Poll interval for `wait_for_ceiling`, seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Overall timeout for `wait_for_ceiling`, seconds.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    /// Per-request HTTP timeout, seconds. Keeps the scan loop from stalling
    /// on a slow oracle.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            fallback_gwei: default_fallback_gwei(),
            poll_interval_secs: default_poll_interval_secs(),
            wait_timeout_secs: default_wait_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_fallback_gwei() -> f64 {
    25.0
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_wait_timeout_secs() -> u64 {
    300
}
fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Generative model for the primary classification path.
    #[serde(default = "default_model")]
    pub model: String,
    /// Env var name holding the model API key (default: `GEMINI_API_KEY`).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request HTTP timeout, seconds.
    #[serde(default = "default_intent_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_intent_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_intent_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

// ---------------------------------------------------------------------------
// CredentialProvider
// ---------------------------------------------------------------------------

/// Env-var-backed credential reads. Keeps secrets out of config files.
pub struct CredentialProvider;

impl CredentialProvider {
    /// Read the model API key from the env var named in the config.
    /// `None` means the model path is disabled and classification runs
    /// rule-based only.
    pub fn model_api_key(config: &IntentConfig) -> Option<String> {
        Self::from_env(&config.api_key_env)
    }

    /// Read a credential from a named env var.
    pub fn from_env(var_name: &str) -> Option<String> {
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
