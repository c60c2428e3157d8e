//! Client configuration
//!
//! The provider routing table, polling policy, and per-language policy bits
//! live in one immutable `ClientConfig` built at startup and passed by
//! reference (`Arc`) into the registry, dispatcher, and poller. Minimal YAML
//! works out of the box: every field has a sensible default, so an empty
//! config file yields a fully functional client against the public CE
//! endpoints.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core_types::Flavor;
use crate::errors::ClientError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub providers: ProviderTable,
    #[serde(default)]
    pub polling: PollingConfig,
    /// Languages whose source must be transmitted unencoded because the
    /// backend expects literal text rather than a transport-safe wrapper.
    #[serde(default = "default_passthrough_languages")]
    pub passthrough_languages: Vec<i64>,
    /// Languages that require a bundled auxiliary archive, keyed by language
    /// id, with the URL the archive is fetched from (once per process).
    #[serde(default = "default_asset_languages")]
    pub asset_languages: HashMap<i64, String>,
    #[serde(default)]
    pub defaults: SessionDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTable {
    #[serde(default = "default_ce")]
    pub ce: FlavorConfig,
    #[serde(default = "default_extra_ce")]
    pub extra_ce: FlavorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavorConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable to read the API key from when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default)]
    pub initial_wait_ms: u64,
    #[serde(default)]
    pub wait: WaitStrategy,
    #[serde(default = "default_max_probe_requests")]
    pub max_probe_requests: u32,
}

/// Deterministic backoff policy: the delay is a pure function of the attempt
/// index, never of wall-clock time, so policies can be swapped without
/// touching the poll state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum WaitStrategy {
    Constant { ms: u64 },
    Linear { ms: u64 },
    Exponential { base_ms: u64, cap_ms: u64 },
}

impl WaitStrategy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = match self {
            WaitStrategy::Constant { ms } => *ms,
            WaitStrategy::Linear { ms } => ms.saturating_mul(attempt as u64 + 1),
            WaitStrategy::Exponential { base_ms, cap_ms } => {
                let shifted = base_ms.saturating_mul(1u64 << attempt.min(32));
                shifted.min(*cap_ms)
            }
        };
        Duration::from_millis(ms)
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Constant { ms: 100 }
    }
}

/// Initial editor/session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "default_language_id")]
    pub language_id: i64,
    #[serde(default = "default_flavor")]
    pub flavor: Flavor,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub stdin: String,
    #[serde(default)]
    pub compiler_options: String,
    #[serde(default)]
    pub command_line_arguments: String,
}

impl ClientConfig {
    /// Load configuration from a YAML file and resolve environment-provided
    /// API keys.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ClientError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_str(content: &str) -> Result<Self, ClientError> {
        let mut config: ClientConfig = serde_yaml::from_str(content)
            .map_err(|e| ClientError::Config(format!("Failed to parse YAML config: {}", e)))?;
        config.resolve_environment();
        config.validate()?;
        Ok(config)
    }

    pub fn flavor(&self, flavor: Flavor) -> &FlavorConfig {
        match flavor {
            Flavor::Ce => &self.providers.ce,
            Flavor::ExtraCe => &self.providers.extra_ce,
        }
    }

    pub fn is_passthrough(&self, language_id: i64) -> bool {
        self.passthrough_languages.contains(&language_id)
    }

    pub fn asset_url(&self, language_id: i64) -> Option<&str> {
        self.asset_languages.get(&language_id).map(String::as_str)
    }

    fn resolve_environment(&mut self) {
        for flavor_config in [&mut self.providers.ce, &mut self.providers.extra_ce] {
            if flavor_config.api_key.is_none() {
                if let Some(env_var) = &flavor_config.api_key_env {
                    flavor_config.api_key = std::env::var(env_var).ok();
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        for flavor in Flavor::ALL {
            if self.flavor(flavor).base_url.trim().is_empty() {
                return Err(ClientError::Config(format!("empty base URL for flavor {}", flavor)));
            }
        }
        if self.polling.max_probe_requests == 0 {
            return Err(ClientError::Config(
                "polling.max_probe_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            providers: ProviderTable::default(),
            polling: PollingConfig::default(),
            passthrough_languages: default_passthrough_languages(),
            asset_languages: default_asset_languages(),
            defaults: SessionDefaults::default(),
        }
    }
}

impl Default for ProviderTable {
    fn default() -> Self {
        Self { ce: default_ce(), extra_ce: default_extra_ce() }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_wait_ms: 0,
            wait: WaitStrategy::default(),
            max_probe_requests: default_max_probe_requests(),
        }
    }
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            language_id: default_language_id(),
            flavor: default_flavor(),
            file_name: default_file_name(),
            source: default_source(),
            stdin: String::new(),
            compiler_options: String::new(),
            command_line_arguments: String::new(),
        }
    }
}

fn default_ce() -> FlavorConfig {
    FlavorConfig {
        base_url: "https://ce.judge0.com".to_string(),
        api_key: None,
        api_key_env: None,
    }
}

fn default_extra_ce() -> FlavorConfig {
    FlavorConfig {
        base_url: "https://extra-ce.judge0.com".to_string(),
        api_key: None,
        api_key_env: None,
    }
}

fn default_max_probe_requests() -> u32 {
    50
}

fn default_passthrough_languages() -> Vec<i64> {
    vec![44]
}

fn default_asset_languages() -> HashMap<i64, String> {
    // SQLite submissions need the bundled database archive.
    HashMap::from([(82, "https://ide.judge0.com/data/additional_files_zip_base64.txt".to_string())])
}

fn default_language_id() -> i64 {
    71
}

fn default_flavor() -> Flavor {
    Flavor::Ce
}

fn default_file_name() -> String {
    "main.py".to_string()
}

fn default_source() -> String {
    "print(\"hello, world\")\n".to_string()
}
