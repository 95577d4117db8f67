//! Configuration loading for the fleet aggregator.
//!
//! Settings come from fleetmond.toml under the platform config directory,
//! with CLI flags taking precedence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::score::ScoreWeights;

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "fleetmon";

/// Default aggregator config file name.
const CONFIG_FILE_NAME: &str = "fleetmond.toml";

/// Aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Hub endpoints to poll, e.g. "http://10.0.0.5:50051".
    #[serde(default)]
    pub hubs: Vec<String>,

    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Path to the score database. None disables persistence.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Scoring weights, must sum to 1.0.
    #[serde(default)]
    pub weights: ScoreWeights,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            hubs: Vec::new(),
            poll_interval_secs: 10,
            request_timeout_secs: 5,
            db_path: None,
            weights: ScoreWeights::default(),
            log_level: "info".to_string(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Get the configuration directory path.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "fleetmon", CONFIG_DIR_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default path for the score database.
pub fn default_db_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "fleetmon", CONFIG_DIR_NAME)
        .context("Could not resolve data directory")?;
    let base = dirs.data_local_dir().to_path_buf();
    std::fs::create_dir_all(&base)
        .with_context(|| format!("Failed to create data directory {:?}", base))?;
    Ok(base.join("scores.db"))
}

/// Load aggregator configuration from file, falling back to defaults when
/// the file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<AggregatorConfig> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let Some(dir) = config_dir() else {
                debug!("No config directory available, using defaults");
                return Ok(AggregatorConfig::default());
            };
            dir.join(CONFIG_FILE_NAME)
        }
    };

    if !config_path.exists() {
        debug!("Config not found at {:?}, using defaults", config_path);
        return Ok(AggregatorConfig::default());
    }

    info!("Loading config from {:?}", config_path);
    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {:?}", config_path))?;

    let config: AggregatorConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", config_path))?;

    if !config.weights.is_valid() {
        anyhow::bail!("Score weights in {:?} must sum to 1.0", config_path);
    }

    Ok(config)
}

/// Generate an example fleetmond.toml configuration.
pub fn example_config() -> String {
    r#"# Fleetmon Aggregator Configuration
# Place this file at ~/.config/fleetmon/fleetmond.toml

# Hub endpoints to poll
hubs = ["http://127.0.0.1:50051"]

# Seconds between poll cycles
poll_interval_secs = 10

# Per-request HTTP timeout in seconds
request_timeout_secs = 5

# Score database path (omit to disable persistence)
# db_path = "/var/lib/fleetmon/scores.db"

# Log level: trace, debug, info, warn, error
log_level = "info"

# Scoring weights (must sum to 1.0)
[weights]
cpu = 0.40
load = 0.30
memory = 0.20
net_in = 0.05
net_out = 0.05
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AggregatorConfig::default();
        assert!(config.hubs.is_empty());
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.request_timeout_secs, 5);
        assert!(config.db_path.is_none());
        assert!(config.weights.is_valid());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
hubs = ["http://10.0.0.5:50051"]
"#;
        let config: AggregatorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.hubs, vec!["http://10.0.0.5:50051"]);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
hubs = ["http://a:50051", "http://b:50051"]
poll_interval_secs = 30
request_timeout_secs = 3
db_path = "/tmp/scores.db"
log_level = "debug"

[weights]
cpu = 0.5
load = 0.2
memory = 0.2
net_in = 0.05
net_out = 0.05
"#;
        let config: AggregatorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.hubs.len(), 2);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/scores.db")));
        assert!((config.weights.cpu - 0.5).abs() < 1e-9);
        assert!(config.weights.is_valid());
    }

    #[test]
    fn test_example_config_valid() {
        let toml = example_config();
        let config: AggregatorConfig =
            toml::from_str(&toml).expect("Example config should parse");
        assert!(config.weights.is_valid());
    }
}
