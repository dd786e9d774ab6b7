//! Configuration management for nbharvest using the prefer crate.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::jobs::QueueConfig;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// GitHub API credential for the search/repo endpoints.
    pub github_api_key: Option<String>,
    /// Custom user agent for HTTP requests (None = built-in default).
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests in milliseconds.
    pub request_delay_ms: u64,
    /// Search query override (None = every Livebook notebook).
    pub search_query: Option<String>,
    /// Search page size.
    pub search_per_page: u32,
    /// Queue dedup window in seconds.
    pub dedup_window_secs: u64,
    /// Retry attempt ceiling per job.
    pub max_attempts: u32,
    /// Worker count for the job runner.
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to the platform data dir for user data
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("nbharvest");

        Self {
            data_dir,
            database_filename: "nbharvest.db".to_string(),
            github_api_key: None,
            user_agent: None,
            request_timeout: 30,
            request_delay_ms: 500,
            search_query: None,
            search_per_page: 30,
            dedup_window_secs: 600,
            max_attempts: 5,
            workers: 4,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Queue configuration derived from these settings.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            dedup_window: Duration::from_secs(self.dedup_window_secs),
            max_attempts: self.max_attempts,
            ..QueueConfig::default()
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default)]
    pub target: Option<String>,
    /// Database filename.
    #[serde(default)]
    pub database: Option<String>,
    /// GitHub API credential. The GITHUB_API_KEY environment variable takes
    /// precedence over this value.
    #[serde(default)]
    pub github_api_key: Option<String>,
    /// User agent string.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub request_timeout: Option<u64>,
    /// Delay between requests in milliseconds.
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    /// Search query override.
    #[serde(default)]
    pub search_query: Option<String>,
    /// Search page size.
    #[serde(default)]
    pub search_per_page: Option<u32>,
    /// Queue dedup window in seconds.
    #[serde(default)]
    pub dedup_window_secs: Option<u64>,
    /// Retry attempt ceiling per job.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Worker count for the job runner.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Config {
    /// Load configuration using the prefer crate.
    /// Automatically discovers nbharvest config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("nbharvest").await {
            Ok(pref_config) => {
                let target: Option<String> = pref_config.get("target").ok();
                let database: Option<String> = pref_config.get("database").ok();
                let github_api_key: Option<String> = pref_config.get("github_api_key").ok();
                let user_agent: Option<String> = pref_config.get("user_agent").ok();
                let request_timeout: Option<u64> = pref_config.get("request_timeout").ok();
                let request_delay_ms: Option<u64> = pref_config.get("request_delay_ms").ok();
                let search_query: Option<String> = pref_config.get("search_query").ok();
                let search_per_page: Option<u32> = pref_config.get("search_per_page").ok();
                let dedup_window_secs: Option<u64> =
                    pref_config.get("dedup_window_secs").ok();
                let max_attempts: Option<u32> = pref_config.get("max_attempts").ok();
                let workers: Option<usize> = pref_config.get("workers").ok();

                Config {
                    target,
                    database,
                    github_api_key,
                    user_agent,
                    request_timeout,
                    request_delay_ms,
                    search_query,
                    search_per_page,
                    dedup_window_secs,
                    max_attempts,
                    workers,
                }
            }
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    ///
    /// The GITHUB_API_KEY environment variable wins over the config file.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref target) = self.target {
            let path = shellexpand::tilde(target);
            settings.data_dir = PathBuf::from(path.as_ref());
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref key) = self.github_api_key {
            settings.github_api_key = Some(key.clone());
        }
        if let Ok(key) = std::env::var("GITHUB_API_KEY") {
            if !key.is_empty() {
                settings.github_api_key = Some(key);
            }
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(ref query) = self.search_query {
            settings.search_query = Some(query.clone());
        }
        if let Some(per_page) = self.search_per_page {
            settings.search_per_page = per_page;
        }
        if let Some(window) = self.dedup_window_secs {
            settings.dedup_window_secs = window;
        }
        if let Some(attempts) = self.max_attempts {
            settings.max_attempts = attempts;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.database_filename, "nbharvest.db");
        assert!(settings
            .database_path()
            .to_string_lossy()
            .ends_with("nbharvest.db"));
        assert!(settings.github_api_key.is_none());
        assert_eq!(settings.queue_config().max_attempts, 5);
    }

    #[test]
    fn test_apply_overrides() {
        let config = Config {
            target: Some("/tmp/nbh-test".into()),
            database: Some("custom.db".into()),
            request_timeout: Some(10),
            workers: Some(8),
            ..Config::default()
        };

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert_eq!(settings.data_dir, PathBuf::from("/tmp/nbh-test"));
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/tmp/nbh-test/custom.db")
        );
        assert_eq!(settings.request_timeout, 10);
        assert_eq!(settings.workers, 8);
    }
}
