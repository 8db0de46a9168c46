use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::{error, info};

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub user_agent: String,
    pub api_base_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "github-events-monitor/1.0".to_string()),
            api_base_url: env::var("GITHUB_API_BASE")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
        }
    }
}

impl GitHubConfig {
    /// Check if a bearer token is configured
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Event store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "github_events.db".to_string()),
            ),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub poll_interval_seconds: u64,
    pub max_events_per_fetch: Option<usize>,
    pub target_repositories: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let target_repositories = env::var("TARGET_REPOSITORIES")
            .map(|raw| {
                raw.split(',')
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            poll_interval_seconds: env::var("POLL_INTERVAL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            max_events_per_fetch: env::var("MAX_EVENTS_PER_FETCH")
                .ok()
                .and_then(|v| v.parse().ok()),
            target_repositories,
        }
    }
}

/// Web API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

/// Consolidated application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub storage: StorageConfig,
    pub collector: CollectorConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Create a new configuration from environment variables and an optional config file
    pub fn new(config_file: Option<&str>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(file_path) = config_file {
            config = config.load_from_file(file_path)?;
        }

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from a JSON file, environment variables taking precedence
    pub fn load_from_file(self, config_file: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::with_name(config_file).required(false))
            .add_source(Environment::default().separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Config = builder
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!("Configuration loaded from file: {}", config_file);
        Ok(config)
    }

    /// Save current configuration to a JSON file
    pub fn save_to_file(&self, config_file: &str) -> Result<()> {
        let config_json =
            serde_json::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(config_file, config_json).context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", config_file);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.web.port == 0 {
            errors.push("Invalid API port");
        }
        if self.collector.poll_interval_seconds == 0 {
            errors.push("Poll interval must be positive");
        }
        if self.storage.database_path.as_os_str().is_empty() {
            errors.push("Database path must not be empty");
        }
        if let Some(0) = self.collector.max_events_per_fetch {
            errors.push("Max events per fetch must be positive when set");
        }

        if !errors.is_empty() {
            let error_msg = format!("Configuration validation failed: {}", errors.join(", "));
            error!("{}", error_msg);
            return Err(anyhow::anyhow!(error_msg));
        }

        Ok(())
    }
}
