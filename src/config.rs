//! Agent configuration, loaded from TOML.
//!
//! Every table and field is optional; missing values fall back to defaults.
//!
//! ```toml
//! [planner]
//! top_k = 5
//! fetch_url = "https://cars.example.com/listings"
//!
//! [fetcher]
//! timeout_secs = 5
//!
//! [executor]
//! run_timeout_secs = 60
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub planner: PlannerConfig,
    pub searcher: SearcherConfig,
    pub fetcher: FetcherConfig,
    pub executor: ExecutorConfig,
}

/// Settings for the template planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Number of search results requested by the search step.
    pub top_k: u32,
    /// URL fetched by the fetch step.
    pub fetch_url: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            fetch_url: "https://example.com".into(),
        }
    }
}

/// Settings for the built-in search tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearcherConfig {
    /// Base URL of generated result links.
    pub base_url: String,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://example.com".into(),
        }
    }
}

/// Settings for the HTTP fetch tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Response bodies are truncated to this many bytes.
    pub max_response_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_response_bytes: 256 * 1024,
        }
    }
}

/// Settings for plan execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Overall run deadline, checked between steps. `None` = no deadline.
    pub run_timeout_secs: Option<u64>,
}

impl AgentConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = AgentConfig::from_toml("").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.planner.top_k, 3);
        assert_eq!(config.fetcher.timeout_secs, 10);
        assert_eq!(config.executor.run_timeout_secs, None);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = AgentConfig::from_toml(
            "[planner]\ntop_k = 7\n\n[executor]\nrun_timeout_secs = 30\n",
        )
        .unwrap();
        assert_eq!(config.planner.top_k, 7);
        assert_eq!(config.planner.fetch_url, "https://example.com");
        assert_eq!(config.executor.run_timeout_secs, Some(30));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("conf").join("agent.toml");
        let mut config = AgentConfig::default();
        config.searcher.base_url = "https://search.example".into();
        config.save(&path).unwrap();
        assert_eq!(AgentConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "[planner\n").unwrap();
        assert!(matches!(
            AgentConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
