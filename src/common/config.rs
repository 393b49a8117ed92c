//! Configuration file handling

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Filter id shipped with the tool, always resolvable without a config file
pub const DEFAULT_FILTER_ID: &str = "4d26770a93b91a100d4d317a7bba10d6";

/// Human-readable name for [`DEFAULT_FILTER_ID`]
pub const DEFAULT_FILTER_NAME: &str = "Choice of Medical Plan";

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Progress polling settings
    #[serde(default)]
    pub poll: PollConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Extra filter id to name mappings, merged over the built-in ones
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

/// Progress polling settings
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    /// Seconds to wait between progress requests and between retries
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Give up polling after this many seconds (unbounded when absent)
    #[serde(default)]
    pub max_duration_secs: Option<u64>,

    /// Stop polling as soon as a results link appears, even before a
    /// terminal status, and skip the detailed report
    #[serde(default)]
    pub early_exit_on_results_link: bool,

    /// Status labels that end the run
    #[serde(default = "default_terminal_statuses")]
    pub terminal_statuses: Vec<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_duration_secs: None,
            early_exit_on_results_link: false,
            terminal_statuses: default_terminal_statuses(),
        }
    }
}

impl PollConfig {
    /// Interval between progress requests
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Optional polling budget
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

fn default_interval() -> u64 {
    5
}

fn default_terminal_statuses() -> Vec<String> {
    ["Completed", "Successful", "Error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// HTTP client settings
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Filter id to name mappings: built-in entries overlaid with `[filters]`
    pub fn filter_names(&self) -> HashMap<String, String> {
        let mut names = HashMap::new();
        names.insert(DEFAULT_FILTER_ID.to_string(), DEFAULT_FILTER_NAME.to_string());
        names.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        names
    }
}
