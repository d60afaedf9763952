//! Configuration management for pagepilot
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/pagepilot/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{PilotError, Result};

/// Main configuration for pagepilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser configuration
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Page agent timing configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Permission policy configuration
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Audit log configuration
    #[serde(default)]
    pub audit: AuditConfig,
    /// Consent prompt configuration
    #[serde(default)]
    pub consent: ConsentConfig,
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Session name for agent-browser
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Upper bound for a single script evaluation in ms
    pub eval_timeout_ms: u64,
    /// Inject the page runtime when a page does not already carry it
    pub inject_runtime: bool,
}

/// Page agent timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Interval between element discovery attempts
    /// Default: 250
    pub poll_interval_ms: u64,
    /// Total budget for element discovery
    /// Default: 3000
    pub discovery_timeout_ms: u64,
    /// Minimum spacing between mutating actions
    /// Default: 350
    pub min_action_interval_ms: u64,
    /// How long to wait for the page runtime to appear
    /// Default: 5000
    pub runtime_ready_timeout_ms: u64,
    /// Default waitFor budget when the caller gives none
    /// Default: 10000
    pub default_wait_timeout_ms: u64,
    /// Sleep used by waitFor when no condition was given
    /// Default: 500
    pub stabilize_ms: u64,
    /// Maximum characters returned by extract
    /// Default: 4000
    pub max_extract_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            discovery_timeout_ms: 3000,
            min_action_interval_ms: env::var("PAGEPILOT_MIN_ACTION_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(350),
            runtime_ready_timeout_ms: 5000,
            default_wait_timeout_ms: 10000,
            stabilize_ms: 500,
            max_extract_chars: 4000,
        }
    }
}

/// Permission policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Domains on which click/select/typeText require consent
    pub sensitive_domains: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            sensitive_domains: DEFAULT_SENSITIVE_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

/// Identity and banking providers treated as sensitive out of the box
pub const DEFAULT_SENSITIVE_DOMAINS: &[&str] = &[
    "accounts.google.com",
    "login.microsoftonline.com",
    "login.live.com",
    "appleid.apple.com",
    "idmsa.apple.com",
    "auth0.com",
    "okta.com",
    "paypal.com",
    "chase.com",
    "bankofamerica.com",
    "wellsfargo.com",
    "citi.com",
    "hsbc.com",
];

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Profile name; each profile gets its own log
    pub profile: String,
    /// Explicit log path, overriding the per-profile default
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            profile: env::var("PAGEPILOT_PROFILE").unwrap_or_else(|_| "default".to_string()),
            path: env::var("PAGEPILOT_AUDIT_PATH").ok().map(PathBuf::from),
        }
    }
}

/// Consent prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Seconds before an unanswered prompt resolves to denied
    pub timeout_secs: Option<u64>,
    /// Seconds an approval stays usable for the next mutating action
    pub grant_ttl_secs: u64,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(120),
            grant_ttl_secs: 60,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            session_name: env::var("PAGEPILOT_BROWSER_SESSION")
                .unwrap_or_else(|_| "pagepilot".to_string()),
            headed: env::var("PAGEPILOT_BROWSER_HEADED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            eval_timeout_ms: 10000,
            inject_runtime: true,
        }
    }
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn min_action_interval(&self) -> Duration {
        Duration::from_millis(self.min_action_interval_ms)
    }

    pub fn runtime_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.runtime_ready_timeout_ms)
    }
}

impl ConsentConfig {
    /// Prompt timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn grant_ttl(&self) -> Duration {
        Duration::from_secs(self.grant_ttl_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pagepilot")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(PilotError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| PilotError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text; missing sections take defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PilotError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| PilotError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PilotError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| PilotError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Resolve where the audit log for the configured profile lives
    pub fn audit_path(&self) -> PathBuf {
        if let Some(path) = &self.audit.path {
            return path.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pagepilot")
            .join(&self.audit.profile)
            .join("audit.json")
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
