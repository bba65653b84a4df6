//! TOML-based configuration for Atlas
//!
//! Server, orchestration and resilience settings, per-agent switches and
//! routing overrides are read from `atlas.toml`. Every field has a default,
//! so an empty file (or no file at all) yields a working configuration.

use crate::agents::router::{Intent, RoutingTable};
use crate::agents::{OrchestratorConfig, BUILTIN_AGENTS};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Config file used when none is given explicitly
pub const DEFAULT_CONFIG_PATH: &str = "atlas.toml";

/// Root configuration structure loaded from atlas.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub resilience: ResilienceSettings,

    /// Per-agent switches keyed by agent id
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSettings>,

    /// Stage template overrides keyed by intent name
    #[serde(default)]
    pub routing: BTreeMap<String, RoutingSettings>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= Orchestrator Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// End-to-end deadline per request in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Requests processed at once before new ones are turned away
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Requests per caller (`user_id`) per hour; 0 disables the limit
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_requests_per_hour() -> u32 {
    100
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

// ============= Resilience Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Consecutive transient failures that open a circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Total attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Timeout for a single attempt
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

// ============= Agent & Routing Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Disabled agents resolve to their fallback
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Agents of the stage, in order
    #[serde(default)]
    pub agents: Vec<String>,
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    DisabledAgentRouted,
    EmptyRoute,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown agent '{0}' in {1}")]
    UnknownAgent(String, String),

    #[error("Unknown intent '{0}' in [routing]")]
    UnknownIntent(String),
}

impl AppConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::FileNotFound(_)) => {
                info!(
                    path = %path.as_ref().display(),
                    "No configuration file, using built-in defaults"
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate ranges and agent references
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be greater than 0".into(),
            ));
        }
        if !matches!(self.server.log_format.as_str(), "text" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "server.log_format must be 'text' or 'json', got '{}'",
                self.server.log_format
            )));
        }
        if self.orchestrator.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.request_timeout_ms must be greater than 0".into(),
            ));
        }
        if !(1..=10_000).contains(&self.orchestrator.max_concurrent_requests) {
            return Err(ConfigError::ValidationError(format!(
                "orchestrator.max_concurrent_requests must be between 1 and 10000, got {}",
                self.orchestrator.max_concurrent_requests
            )));
        }

        let resilience = &self.resilience;
        if resilience.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "resilience.failure_threshold must be at least 1".into(),
            ));
        }
        if !(1..=10).contains(&resilience.max_attempts) {
            return Err(ConfigError::ValidationError(format!(
                "resilience.max_attempts must be between 1 and 10, got {}",
                resilience.max_attempts
            )));
        }
        if resilience.base_delay_ms > resilience.max_delay_ms {
            return Err(ConfigError::ValidationError(format!(
                "resilience.base_delay_ms ({}) exceeds resilience.max_delay_ms ({})",
                resilience.base_delay_ms, resilience.max_delay_ms
            )));
        }
        if resilience.call_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "resilience.call_timeout_ms must be greater than 0".into(),
            ));
        }

        for id in self.agents.keys() {
            if !BUILTIN_AGENTS.contains(&id.as_str()) {
                return Err(ConfigError::UnknownAgent(id.clone(), "[agents]".into()));
            }
        }

        for (name, route) in &self.routing {
            match Intent::parse(name) {
                None | Some(Intent::Combined) => {
                    return Err(ConfigError::UnknownIntent(name.clone()))
                }
                Some(_) => {}
            }
            for agent in &route.agents {
                if !BUILTIN_AGENTS.contains(&agent.as_str()) {
                    return Err(ConfigError::UnknownAgent(
                        agent.clone(),
                        format!("[routing.{}]", name),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Validate configuration with warnings for suspicious but legal settings
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        let table = self.routing_table()?;
        for id in self.disabled_agents() {
            if table.agent_ids().any(|routed| routed == id) {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::DisabledAgentRouted,
                    message: format!(
                        "Agent '{}' is disabled but still routed; it will always answer with its fallback",
                        id
                    ),
                });
            }
        }
        for (name, route) in &self.routing {
            if route.agents.is_empty() {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::EmptyRoute,
                    message: format!(
                        "[routing.{}] has no agents; requests with this intent get no stage",
                        name
                    ),
                });
            }
        }

        Ok(warnings)
    }

    /// Agent ids switched off in `[agents.*]`
    pub fn disabled_agents(&self) -> impl Iterator<Item = &str> {
        self.agents
            .iter()
            .filter(|(_, settings)| !settings.enabled)
            .map(|(id, _)| id.as_str())
    }

    /// Default routing table with `[routing.*]` overrides applied
    pub fn routing_table(&self) -> Result<RoutingTable, ConfigError> {
        let mut table = RoutingTable::default();
        for (name, route) in &self.routing {
            let intent = Intent::parse(name)
                .filter(|intent| *intent != Intent::Combined)
                .ok_or_else(|| ConfigError::UnknownIntent(name.clone()))?;
            table = table.with_template(intent, route.agents.clone());
        }
        Ok(table)
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(
            self.resilience.failure_threshold,
            Duration::from_secs(self.resilience.cooldown_secs),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.resilience.max_attempts,
            Duration::from_millis(self.resilience.base_delay_ms),
            Duration::from_millis(self.resilience.max_delay_ms),
        )
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.resilience.call_timeout_ms)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            request_timeout: Duration::from_millis(self.orchestrator.request_timeout_ms),
            max_concurrent_requests: self.orchestrator.max_concurrent_requests,
            requests_per_hour: self.orchestrator.requests_per_hour,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.orchestrator.request_timeout_ms, 30_000);
        assert_eq!(config.circuit_breaker(), CircuitBreakerConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.call_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.orchestrator_config(),
            OrchestratorConfig::default()
        );
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            log_format = "json"

            [orchestrator]
            request_timeout_ms = 5000
            max_concurrent_requests = 4
            requests_per_hour = 0

            [resilience]
            failure_threshold = 2
            cooldown_secs = 5
            max_attempts = 4

            [agents.social-media]
            enabled = false

            [routing.marketing]
            agents = ["campaign-manager", "local-marketing"]
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.circuit_breaker().failure_threshold, 2);
        assert_eq!(config.retry_policy().max_attempts, 4);
        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.request_timeout, Duration::from_secs(5));
        assert_eq!(orchestrator.max_concurrent_requests, 4);
        assert_eq!(orchestrator.requests_per_hour, 0);
        assert_eq!(config.disabled_agents().collect::<Vec<_>>(), vec!["social-media"]);

        let table = config.routing_table().unwrap();
        assert_eq!(
            table.template(Intent::Marketing),
            &["campaign-manager".to_string(), "local-marketing".to_string()]
        );
        assert_eq!(table.template(Intent::Website).len(), 3);
    }

    #[test]
    fn test_rejects_unknown_routing_agent() {
        let err = AppConfig::from_toml(
            r#"
            [routing.website]
            agents = ["website-builder", "wordpress-sync"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAgent(ref id, _) if id == "wordpress-sync"));
    }

    #[test]
    fn test_rejects_combined_route() {
        let err = AppConfig::from_toml("[routing.combined]\nagents = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownIntent(_)));
    }

    #[test]
    fn test_rejects_bad_ranges() {
        assert!(AppConfig::from_toml("[resilience]\nmax_attempts = 0\n").is_err());
        assert!(AppConfig::from_toml("[resilience]\nfailure_threshold = 0\n").is_err());
        assert!(
            AppConfig::from_toml("[resilience]\nbase_delay_ms = 5000\nmax_delay_ms = 100\n")
                .is_err()
        );
        assert!(AppConfig::from_toml("[server]\nlog_format = \"yaml\"\n").is_err());
        assert!(
            AppConfig::from_toml("[orchestrator]\nmax_concurrent_requests = 0\n").is_err()
        );
    }

    #[test]
    fn test_warnings() {
        let config = AppConfig::from_toml(
            r#"
            [agents.seo-optimizer]
            enabled = false

            [routing.analytics]
            agents = []
            "#,
        )
        .unwrap();
        let warnings = config.validate_with_warnings().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .any(|w| w.kind == ConfigWarningKind::DisabledAgentRouted));
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 4100").unwrap();
        assert_eq!(AppConfig::load(file.path()).unwrap().server.port, 4100);

        let missing = file.path().with_extension("absent.toml");
        assert!(matches!(
            AppConfig::load(&missing),
            Err(ConfigError::FileNotFound(_))
        ));
        assert_eq!(AppConfig::load_or_default(&missing).unwrap().server.port, 3000);
    }
}
