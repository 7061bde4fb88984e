//! Configuration loading for muninnd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag; must exist)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//! 4. built-in defaults
//!
//! Secrets are loaded separately with mandatory permission checks, from a
//! `secrets.toml` beside the config file that was loaded, or from the user
//! and system directories above. Keys missing from the file fall back to
//! `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` and `GEMINI_API_KEY`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::providers::RetryConfig;
use crate::registry::{ANTHROPIC, CacheKeyScope, GEMINI, ModelSet, OPENAI};
use crate::{MuninnError, Result};

const CONFIG_DIR: &str = ".muninn";
const SYSTEM_DIR: &str = "/etc/muninn";
const CONFIG_FILE: &str = "config.toml";
const SECRETS_FILE: &str = "secrets.toml";

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub embedding_cache: EmbeddingCacheSection,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Per-provider overrides, keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:5000).
    #[serde(default = "default_address")]
    pub address: String,
    /// Deadline for one provider call in seconds (default: 60).
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn default_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_call_timeout() -> u64 {
    60
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Interval of the background expiry sweep (default: 300).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    #[serde(default)]
    pub key_scope: CacheKeyScope,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
            key_scope: CacheKeyScope::default(),
        }
    }
}

impl CacheSection {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.max_entries)
            .ttl(Duration::from_secs(self.ttl_secs))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Embedding cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingCacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

impl Default for EmbeddingCacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl(),
        }
    }
}

impl EmbeddingCacheSection {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.max_entries)
            .ttl(Duration::from_secs(self.ttl_secs))
    }
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl() -> u64 {
    30 * 60
}

fn default_cleanup_interval() -> u64 {
    5 * 60
}

/// Provider selection preferences.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfig {
    /// Provider tried first when a request has no override.
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Fallback order (default: gemini, openai, anthropic).
    #[serde(default)]
    pub order: Option<Vec<String>>,
}

/// Per-provider endpoint and model overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub primary_model: Option<String>,
    #[serde(default)]
    pub code_model: Option<String>,
    #[serde(default)]
    pub embeddings_model: Option<String>,
}

impl ProviderConfig {
    /// Apply the model overrides on top of `defaults`.
    pub fn models(&self, defaults: ModelSet) -> ModelSet {
        ModelSet {
            primary: self.primary_model.clone().unwrap_or(defaults.primary),
            code: self.code_model.clone().unwrap_or(defaults.code),
            embeddings: self.embeddings_model.clone().or(defaults.embeddings),
        }
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
    #[serde(default)]
    pub anthropic: Option<ApiKeySecret>,
    #[serde(default)]
    pub gemini: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Provider name → environment variable name mapping.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    (OPENAI, "OPENAI_API_KEY"),
    (ANTHROPIC, "ANTHROPIC_API_KEY"),
    (GEMINI, "GEMINI_API_KEY"),
];

/// Whether a key can be used: non-empty and not a placeholder.
pub fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && !key.to_ascii_lowercase().contains("dummy")
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Falls back to defaults when no file exists, unless an explicit
    /// path was given.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Ok(candidate_dirs()
            .into_iter()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|path| path.exists()))
    }

    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }
}

/// User then system configuration directories.
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(2);
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(CONFIG_DIR));
    }
    dirs.push(PathBuf::from(SYSTEM_DIR));
    dirs
}

impl Secrets {
    /// Load secrets with permission checks.
    ///
    /// Looks beside `config` first (when it came from a file), then in
    /// the user and system directories. Returns empty secrets if no file
    /// exists, leaving the environment as the only source.
    pub fn load(config: &Config) -> Result<Self> {
        let beside = config
            .source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let found = beside
            .into_iter()
            .chain(candidate_dirs())
            .map(|dir| dir.join(SECRETS_FILE))
            .find(|path| path.exists());

        match found {
            Some(path) => {
                Self::check_permissions(&path)?;
                Self::load_from_file(&path)
            }
            None => Ok(Secrets::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    pub fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(MuninnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Usable API key for a provider, falling back to its environment
    /// variable.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.api_key_with(provider, |var| std::env::var(var).ok())
    }

    /// Like [`api_key`](Self::api_key) with an explicit environment lookup.
    pub fn api_key_with(
        &self,
        provider: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let from_file = match provider {
            OPENAI => self.openai.as_ref(),
            ANTHROPIC => self.anthropic.as_ref(),
            GEMINI => self.gemini.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone())
        .filter(|key| is_usable_key(key));

        from_file.or_else(|| {
            PROVIDER_ENV_VARS
                .iter()
                .find(|(name, _)| *name == provider)
                .and_then(|(_, var)| env(var))
                .filter(|key| is_usable_key(key))
        })
    }
}
