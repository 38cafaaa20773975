//! Configuration for fairgate

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hosting API connection settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Bot identity used for the tracking issue and markers
    #[serde(default)]
    pub bot: BotConfig,

    /// Validation store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Repository scanning settings
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Hosting API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Installation token (usually supplied via GITHUB_TOKEN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Linear backoff step between attempts
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Longest Retry-After the client will sleep for before giving up
    #[serde(default = "default_max_retry_wait_secs")]
    pub max_retry_wait_secs: u64,

    /// Maximum pages followed for list endpoints
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

/// Bot identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// App slug; the account login is `<name>[bot]`
    #[serde(default = "default_bot_name")]
    pub name: String,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to the user data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

/// Scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File name suffixes treated as workflow-description files
    #[serde(default = "default_workflow_suffixes")]
    pub workflow_suffixes: Vec<String>,

    /// Deepest directory level visited by the workflow walk
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_max_attempts() -> usize {
    4
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_retry_wait_secs() -> u64 {
    60
}

fn default_max_pages() -> usize {
    10
}

fn default_bot_name() -> String {
    "fairgate".to_string()
}

fn default_workflow_suffixes() -> Vec<String> {
    vec![".cwl".to_string()]
}

fn default_max_depth() -> usize {
    16
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_retry_wait_secs: default_max_retry_wait_secs(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workflow_suffixes: default_workflow_suffixes(),
            max_depth: default_max_depth(),
        }
    }
}

impl BotConfig {
    /// Login of the bot account that authors the tracking issue
    pub fn login(&self) -> String {
        format!("{}[bot]", self.name)
    }

    /// Mention used inside hidden markers
    pub fn marker_tag(&self) -> String {
        format!("@{}-bot", self.name)
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fairgate").join("config.toml"))
    }

    /// Load configuration from `path` (or the default location) or return defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else if path.is_some() {
            anyhow::bail!("Config file not found: {:?}", config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.storage.database {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("No data directory available; set storage.database"))?;
        Ok(data_dir.join("fairgate").join("fairgate.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(config.github.max_attempts > 0);
        assert_eq!(config.scan.workflow_suffixes, vec![".cwl".to_string()]);
        assert_eq!(config.bot.login(), "fairgate[bot]");
        assert_eq!(config.bot.marker_tag(), "@fairgate-bot");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [github]
            max_attempts = 2

            [bot]
            name = "codefair"
            "#,
        )
        .unwrap();

        assert_eq!(config.github.max_attempts, 2);
        assert_eq!(config.github.max_pages, 10);
        assert_eq!(config.bot.login(), "codefair[bot]");
        assert_eq!(config.scan.max_depth, 16);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.scan.workflow_suffixes.push(".ga".to_string());
        config.save(&path).unwrap();

        let loaded = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded.scan.workflow_suffixes.len(), 2);
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_or_default(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
