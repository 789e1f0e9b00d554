//! Configuration management for relayd.
//!
//! Loads settings from /etc/relay/config.toml or uses defaults. The active
//! configuration is swapped atomically on reload; utterances already past
//! orchestrator entry keep the configuration they started with.

use anyhow::{bail, Result};
use relay_common::trace::DebugLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/relay/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/relay/config.toml";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Trace verbosity appended to answers
    #[serde(default)]
    pub debug_level: DebugLevel,

    /// Unix socket the daemon listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

fn default_socket_path() -> String {
    relay_common::SOCKET_PATH.to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            debug_level: DebugLevel::default(),
            socket_path: default_socket_path(),
        }
    }
}

/// Deterministic-layer gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Minimum match score required to act without agent confirmation
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Minimum gap between the top two scores; a smaller gap is ambiguous
    #[serde(default = "default_tie_margin")]
    pub tie_margin: f64,
}

fn default_confidence_threshold() -> f64 {
    0.82
}

fn default_tie_margin() -> f64 {
    0.05
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            tie_margin: default_tie_margin(),
        }
    }
}

/// Entity catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Exposed-entities endpoint of the host platform
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Background refresh interval in seconds
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_source_url() -> String {
    "http://127.0.0.1:8123/api/relay/entities".to_string()
}

fn default_refresh_secs() -> u64 {
    60
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

/// Service execution collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Service call endpoint of the host platform
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_execution_timeout")]
    pub timeout_secs: u64,
}

fn default_service_url() -> String {
    "http://127.0.0.1:8123/api/relay/services".to_string()
}

fn default_execution_timeout() -> u64 {
    10
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            timeout_secs: default_execution_timeout(),
        }
    }
}

/// Conversation agent collaborators configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_primary_name")]
    pub primary_name: String,

    #[serde(default = "default_primary_url")]
    pub primary_url: String,

    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,

    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,

    /// Per-agent timeout in seconds
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
}

fn default_primary_name() -> String {
    "assist".to_string()
}

fn default_primary_url() -> String {
    "http://127.0.0.1:8123/api/relay/agents/assist".to_string()
}

fn default_fallback_name() -> String {
    "llm".to_string()
}

fn default_fallback_url() -> String {
    "http://127.0.0.1:8123/api/relay/agents/llm".to_string()
}

fn default_agent_timeout() -> u64 {
    30
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            primary_name: default_primary_name(),
            primary_url: default_primary_url(),
            fallback_name: default_fallback_name(),
            fallback_url: default_fallback_url(),
            timeout_secs: default_agent_timeout(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub agents: AgentsConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(|e| {
            warn!("Config not found, using defaults: {}", e);
            Config::default()
        })
    }

    /// Load config from file, propagating the failure. Used by reload so an
    /// invalid file leaves the previous configuration in place.
    pub fn try_load() -> Result<Self> {
        Self::load_from_path(CONFIG_PATH).or_else(|_| Self::load_from_path(DEFAULT_CONFIG_PATH))
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded config from {}", path);
        Ok(config)
    }

    /// Check value ranges the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.routing.confidence_threshold) {
            bail!(
                "confidence_threshold must be within [0, 1], got {}",
                self.routing.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.routing.tie_margin) {
            bail!(
                "tie_margin must be within [0, 1], got {}",
                self.routing.tie_margin
            );
        }
        if self.catalog.refresh_secs == 0 {
            bail!("catalog refresh_secs must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.routing.confidence_threshold, 0.82);
        assert_eq!(config.routing.tie_margin, 0.05);
        assert_eq!(config.catalog.refresh_secs, 60);
        assert_eq!(config.daemon.debug_level, DebugLevel::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
[daemon]
debug_level = "verbose"

[routing]
confidence_threshold = 0.9
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.daemon.debug_level, DebugLevel::Verbose);
        assert_eq!(config.routing.confidence_threshold, 0.9);
        // Defaults for missing fields
        assert_eq!(config.routing.tie_margin, 0.05);
        assert_eq!(config.agents.primary_name, "assist");
    }

    #[test]
    fn test_load_from_path_rejects_bad_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[routing]\nconfidence_threshold = 1.5").unwrap();
        let result = Config::load_from_path(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_path_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[agents]
primary_name = "rules"
primary_url = "http://10.0.0.2:9000/agents/rules"
timeout_secs = 5
"#
        )
        .unwrap();
        let config = Config::load_from_path(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.agents.primary_name, "rules");
        assert_eq!(config.agents.timeout_secs, 5);
        assert_eq!(config.agents.fallback_name, "llm");
    }
}
