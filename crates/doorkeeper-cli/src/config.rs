//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `doorkeeper.toml` in the working directory unless a path is
//! given. Every field has a default, so the file is optional; without one
//! the controller runs a single door `A` with the default timings.
//! Environment variables take precedence over file values. The result is
//! validated once and never changes afterwards.

use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use doorkeeper_core::constants::{
    DEFAULT_CLOSE_DURATION_MS, DEFAULT_MAX_CONNECTIONS, DEFAULT_OPEN_LIMIT_MS, DEFAULT_PORT,
    DEFAULT_TICK_MS, MAX_TICK_MS, MIN_TICK_MS,
};
use doorkeeper_core::{DoorId, DoorTiming};
use doorkeeper_protocol::ReplyFormat;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "doorkeeper.toml";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub reply: ReplyConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
    pub doors: Vec<DoorConfig>,
}

/// TCP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick period in milliseconds.
    pub tick_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// `plain` or `json`.
    pub format: ReplyFormat,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Virtual mechanisms instead of GPIO.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub enabled: bool,
    /// Extension time from closed to the open stop.
    pub travel_ms: u64,
    /// Doors whose mechanism never moves.
    pub jammed: Vec<DoorId>,
}

/// One door.
#[derive(Debug, Clone, Deserialize)]
pub struct DoorConfig {
    pub id: DoorId,
    #[serde(default = "default_open_limit_ms")]
    pub open_limit_ms: u64,
    #[serde(default = "default_close_duration_ms")]
    pub close_duration_ms: u64,
    /// GPIO wiring; required unless simulating.
    #[serde(default)]
    pub pins: Option<PinConfig>,
}

/// BCM pin numbers of one door.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PinConfig {
    pub extend: u8,
    pub retract: u8,
    #[serde(default)]
    pub enable: Option<u8>,
    pub limit: u8,
    #[serde(default = "default_limit_active_high")]
    pub limit_active_high: bool,
}

impl Config {
    /// Load configuration from `path`, or from `doorkeeper.toml` if present,
    /// then apply environment variable overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, if the file
    /// is malformed or if validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path, true)?,
            None => Self::from_file(Path::new(DEFAULT_CONFIG_FILE), false)?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("DOORKEEPER_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("DOORKEEPER_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("DOORKEEPER_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections must be non-zero".to_string(),
            ));
        }
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.scheduler.tick_ms) {
            return Err(ConfigError::Validation(format!(
                "tick_ms must be between {MIN_TICK_MS} and {MAX_TICK_MS}, got {}",
                self.scheduler.tick_ms
            )));
        }
        if self.doors.is_empty() {
            return Err(ConfigError::Validation(
                "at least one door is required".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for door in &self.doors {
            if !ids.insert(&door.id) {
                return Err(ConfigError::Validation(format!("duplicate door {}", door.id)));
            }
            door.timing()?;
        }
        for id in &self.simulation.jammed {
            if !ids.contains(id) {
                return Err(ConfigError::Validation(format!(
                    "jammed door {id} is not configured"
                )));
            }
        }
        Ok(())
    }

    /// The `host:port` listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not resolve.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.server.host, self.server.port)
    }

    /// Where the client subcommands connect by default: the listen address,
    /// with a wildcard host replaced by loopback.
    pub fn client_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "" => "127.0.0.1",
            host => host,
        };
        resolve(host, self.server.port)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.scheduler.tick_ms)
    }

    pub fn simulation_travel(&self) -> Duration {
        Duration::from_millis(self.simulation.travel_ms)
    }
}

impl DoorConfig {
    /// Validated motion timing.
    pub fn timing(&self) -> Result<DoorTiming, ConfigError> {
        DoorTiming::from_millis(&self.id, self.open_limit_ms, self.close_duration_ms)
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    (host, port)
        .to_socket_addrs()
        .map_err(ConfigError::Io)?
        .next()
        .ok_or_else(|| ConfigError::Validation(format!("{host}:{port} does not resolve")))
}

fn default_open_limit_ms() -> u64 {
    DEFAULT_OPEN_LIMIT_MS
}

fn default_close_duration_ms() -> u64 {
    DEFAULT_CLOSE_DURATION_MS
}

fn default_limit_active_high() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            scheduler: SchedulerConfig::default(),
            reply: ReplyConfig::default(),
            logging: LoggingConfig::default(),
            simulation: SimulationConfig::default(),
            doors: DoorId::new("A")
                .into_iter()
                .map(|id| DoorConfig {
                    id,
                    open_limit_ms: DEFAULT_OPEN_LIMIT_MS,
                    close_duration_ms: DEFAULT_CLOSE_DURATION_MS,
                    pins: None,
                })
                .collect(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "doorkeeper=info".to_string(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            travel_ms: 3_000,
            jammed: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.server.max_connections, 16);
        assert_eq!(config.scheduler.tick_ms, 10);
        assert_eq!(config.reply.format, ReplyFormat::Plain);
        assert_eq!(config.doors.len(), 1);
        assert_eq!(config.doors[0].id.as_str(), "A");
        assert!(!config.simulation.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.doors.len(), 1);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090
            max_connections = 4

            [scheduler]
            tick_ms = 20

            [reply]
            format = 'json'

            [logging]
            filter = 'debug'

            [simulation]
            enabled = true
            travel_ms = 1500
            jammed = ['B']

            [[doors]]
            id = 'A'
            open_limit_ms = 26500
            close_duration_ms = 29000
            pins = { extend = 17, retract = 27, enable = 22, limit = 5 }

            [[doors]]
            id = 'B'
            pins = { extend = 23, retract = 24, limit = 6, limit_active_high = false }
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.max_connections, 4);
        assert_eq!(config.tick(), Duration::from_millis(20));
        assert_eq!(config.reply.format, ReplyFormat::Json);
        assert_eq!(config.logging.filter, "debug");
        assert!(config.simulation.enabled);
        assert_eq!(config.simulation_travel(), Duration::from_millis(1500));
        assert_eq!(config.doors.len(), 2);

        let a = config.doors[0].pins.unwrap();
        assert_eq!((a.extend, a.retract, a.enable, a.limit), (17, 27, Some(22), 5));
        assert!(a.limit_active_high);

        let b = &config.doors[1];
        assert_eq!(b.open_limit_ms, DEFAULT_OPEN_LIMIT_MS);
        assert_eq!(b.close_duration_ms, DEFAULT_CLOSE_DURATION_MS);
        assert!(!b.pins.unwrap().limit_active_high);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_invalid_door_id() {
        let result: Result<Config, _> = toml::from_str("[[doors]]\nid = 'door-1'\n");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent.toml"), false).unwrap();
        assert_eq!(config.server.port, 8888);
    }

    #[test]
    fn should_fail_when_explicit_file_not_found() {
        let result = Config::from_file(Path::new("nonexistent.toml"), true);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn should_read_file_from_disk() {
        let path = std::env::temp_dir().join(format!("doorkeeper-{}.toml", std::process::id()));
        std::fs::write(&path, "[server]\nport = 7777\n").unwrap();
        let config = Config::from_file(&path, true).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.server.port, 7777);
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[
            ("DOORKEEPER_HOST", "10.0.0.5"),
            ("DOORKEEPER_PORT", "9999"),
            ("DOORKEEPER_LOG", "trace"),
        ]));
        assert_eq!(config.server.host, "10.0.0.5");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_rust_log_over_doorkeeper_log() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[("DOORKEEPER_LOG", "warn"), ("RUST_LOG", "debug")]));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let mut config = Config::default();
        config.apply_overrides(overrides(&[("DOORKEEPER_PORT", "eighty")]));
        assert_eq!(config.server.port, 8888);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_tick_out_of_range() {
        let mut config = Config::default();
        config.scheduler.tick_ms = 0;
        assert!(config.validate().is_err());
        config.scheduler.tick_ms = 5_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_empty_door_list() {
        let config: Config = toml::from_str("doors = []").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_duplicate_doors() {
        let config: Config = toml::from_str("[[doors]]\nid = 'A'\n[[doors]]\nid = 'A'\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate door A"), "{err}");
    }

    #[test]
    fn should_reject_zero_timing() {
        let config: Config = toml::from_str("[[doors]]\nid = 'A'\nopen_limit_ms = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_unknown_jammed_door() {
        let config: Config = toml::from_str("[simulation]\njammed = ['Z']\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_format_addresses() {
        let mut config = Config::default();
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:8888".parse().unwrap());
        assert_eq!(config.client_addr().unwrap(), "127.0.0.1:8888".parse().unwrap());

        config.server.host = "192.168.0.42".to_string();
        assert_eq!(config.client_addr().unwrap(), "192.168.0.42:8888".parse().unwrap());
    }
}
