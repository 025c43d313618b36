//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! servers_file = "mcp_agent.config.yaml"   # optional YAML registry
//!
//! [fleet]                  # proxy, ports, shutdown
//! [session]                # per-request timeout and retries
//! [logging]                # log file directory
//!
//! [[servers]]              # inline server entries
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// YAML server registry, relative to the file that names it.
    pub servers_file: Option<PathBuf>,

    /// Orchestrator settings.
    pub fleet: Option<FleetSettings>,

    /// Protocol session settings.
    pub session: Option<SessionSettings>,

    /// Log file settings.
    pub logging: Option<LoggingConfig>,

    /// Inline server entries, in configuration order.
    pub servers: Vec<ServerEntry>,
}

impl FleetConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Servers are merged by name across layers: an entry in `other`
    /// replaces the existing entry with the same name in place, and new
    /// names are appended. Repeated names within `other` are all kept.
    pub fn merge(&mut self, other: FleetConfig) {
        if other.servers_file.is_some() {
            self.servers_file = other.servers_file;
        }
        if other.fleet.is_some() {
            self.fleet = other.fleet;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }

        let existing = self.servers.len();
        let mut replaced = vec![false; existing];
        for entry in other.servers {
            let slot = self.servers[..existing]
                .iter()
                .position(|s| s.name == entry.name)
                .filter(|&i| !replaced[i]);
            match slot {
                Some(i) => {
                    replaced[i] = true;
                    self.servers[i] = entry;
                }
                None => self.servers.push(entry),
            }
        }
    }

    /// Orchestrator settings, or defaults.
    pub fn fleet(&self) -> FleetSettings {
        self.fleet.clone().unwrap_or_default()
    }

    /// Session settings, or defaults.
    pub fn session(&self) -> SessionSettings {
        self.session.clone().unwrap_or_default()
    }

    /// Enabled servers, in configuration order.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerEntry> {
        self.servers.iter().filter(|s| s.enabled)
    }

    /// Look up a server entry by name.
    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fleet Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Orchestrator settings.
///
/// ```toml
/// [fleet]
/// proxy_binary = "mcp-proxy"
/// base_port = 8080
/// settle_ms = 2000
/// shutdown_grace_secs = 5
/// client_name = "toolfleet"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSettings {
    /// Proxy executable placed in front of every server command.
    pub proxy_binary: String,
    /// First port handed out.
    pub base_port: u16,
    /// Pause after launching, before discovery.
    pub settle_ms: u64,
    /// Time a server gets to exit after SIGTERM.
    pub shutdown_grace_secs: u64,
    /// Client name advertised during the handshake.
    pub client_name: String,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            proxy_binary: "mcp-proxy".to_string(),
            base_port: 8080,
            settle_ms: 2000,
            shutdown_grace_secs: 5,
            client_name: "toolfleet".to_string(),
        }
    }
}

impl FleetSettings {
    /// Settle period as a duration.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Shutdown grace as a duration.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Protocol session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on each network call.
    pub request_timeout_secs: u64,
    /// Connection retries per call.
    pub retries: u32,
    /// Delay between connection retries.
    pub retry_delay_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            retries: 3,
            retry_delay_ms: 250,
        }
    }
}

impl SessionSettings {
    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry delay as a duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files. Defaults to `<config dir>/logs`.
    pub dir: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Entries
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a single tool server.
///
/// ```toml
/// [[servers]]
/// name = "filesystem"
/// command = "npx"
/// args = ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
/// description = "Filesystem access"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerEntry {
    /// Unique name for this server.
    pub name: String,
    /// Command the proxy runs.
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this server is started. Defaults to true.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ServerEntry {
    /// Create an enabled entry with no arguments.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            description: None,
            enabled: true,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set enabled state.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// YAML Server Registry
// ─────────────────────────────────────────────────────────────────────────────

/// One server in the YAML registry, keyed by name in the mapping.
#[derive(Debug, Deserialize)]
struct RegistryEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse a YAML server registry of the form `mcp: servers: {name: {...}}`.
///
/// Entries come back in mapping order.
pub fn parse_server_registry(yaml: &str, context: &str) -> Result<Vec<ServerEntry>> {
    let root: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let servers = root
        .get("mcp")
        .and_then(|mcp| mcp.get("servers"))
        .ok_or_else(|| ConfigError::MissingField {
            field: "mcp.servers".to_string(),
            context: context.to_string(),
        })?;

    let mapping = match servers {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(ConfigError::Invalid(format!(
                "mcp.servers in {} must be a mapping of server names",
                context
            )));
        }
    };

    mapping
        .iter()
        .map(|(key, value)| {
            let name = key.as_str().ok_or_else(|| {
                ConfigError::Invalid(format!("non-string server name in {}", context))
            })?;
            let entry: RegistryEntry = serde_yaml::from_value(value.clone())?;
            Ok(ServerEntry {
                name: name.to_string(),
                command: entry.command,
                args: entry.args,
                description: entry.description,
                enabled: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config = FleetConfig::from_toml("").unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.fleet(), FleetSettings::default());
        assert_eq!(config.fleet().base_port, 8080);
        assert_eq!(config.fleet().settle(), Duration::from_secs(2));
        assert_eq!(config.session().request_timeout(), Duration::from_secs(10));
        assert_eq!(config.session().retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
servers_file = "registry.yaml"

[fleet]
proxy_binary = "/opt/bin/mcp-proxy"
base_port = 9100
shutdown_grace_secs = 2

[session]
retries = 0

[logging]
dir = "/tmp/toolfleet-logs"

[[servers]]
name = "files"
command = "npx"
args = ["-y", "@modelcontextprotocol/server-filesystem"]
description = "Filesystem access"

[[servers]]
name = "git"
command = "uvx"
args = ["mcp-server-git"]
enabled = false
"#;
        let config = FleetConfig::from_toml(toml).unwrap();
        let fleet = config.fleet();
        assert_eq!(fleet.proxy_binary, "/opt/bin/mcp-proxy");
        assert_eq!(fleet.base_port, 9100);
        assert_eq!(fleet.settle_ms, 2000);
        assert_eq!(fleet.shutdown_grace(), Duration::from_secs(2));
        assert_eq!(config.session().retries, 0);
        assert_eq!(config.session().request_timeout_secs, 10);
        assert_eq!(
            config.logging.as_ref().unwrap().dir,
            Some(PathBuf::from("/tmp/toolfleet-logs"))
        );
        assert_eq!(config.servers_file, Some(PathBuf::from("registry.yaml")));

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].args.len(), 2);
        let enabled: Vec<_> = config.enabled_servers().map(|s| s.name.as_str()).collect();
        assert_eq!(enabled, vec!["files"]);
    }

    #[test]
    fn test_server_requires_command() {
        let err = FleetConfig::from_toml("[[servers]]\nname = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_overrides_sections_and_servers_by_name() {
        let mut base = FleetConfig::from_toml(
            r#"
[fleet]
base_port = 9000

[[servers]]
name = "a"
command = "one"

[[servers]]
name = "b"
command = "two"
"#,
        )
        .unwrap();
        let overlay = FleetConfig::from_toml(
            r#"
[session]
retries = 1

[[servers]]
name = "a"
command = "replaced"

[[servers]]
name = "c"
command = "three"
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.fleet().base_port, 9000);
        assert_eq!(base.session().retries, 1);
        let names: Vec<_> = base.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(base.server("a").unwrap().command, "replaced");
    }

    #[test]
    fn test_merge_keeps_duplicates_within_a_layer() {
        let mut base = FleetConfig::from_toml(
            "[[servers]]\nname = \"a\"\ncommand = \"one\"\n",
        )
        .unwrap();
        let overlay = FleetConfig::from_toml(
            r#"
[[servers]]
name = "a"
command = "first"

[[servers]]
name = "a"
command = "second"

[[servers]]
name = "b"
command = "x"

[[servers]]
name = "b"
command = "y"
"#,
        )
        .unwrap();

        base.merge(overlay);
        let entries: Vec<_> = base
            .servers
            .iter()
            .map(|s| (s.name.as_str(), s.command.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![("a", "first"), ("a", "second"), ("b", "x"), ("b", "y")]
        );
    }

    #[test]
    fn test_registry_keeps_mapping_order() {
        let yaml = r#"
mcp:
  servers:
    zeta:
      command: uvx
      args: ["mcp-server-git"]
    alpha:
      command: npx
      args: ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
      description: Files
    mid:
      command: ./server
"#;
        let entries = parse_server_registry(yaml, "test").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(entries[1].description.as_deref(), Some("Files"));
        assert!(entries[2].args.is_empty());
        assert!(entries.iter().all(|e| e.enabled));
    }

    #[test]
    fn test_registry_missing_section() {
        let err = parse_server_registry("other: {}\n", "registry.yaml").unwrap_err();
        match err {
            ConfigError::MissingField { field, context } => {
                assert_eq!(field, "mcp.servers");
                assert_eq!(context, "registry.yaml");
            }
            other => panic!("Expected missing field, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_empty_servers() {
        let entries = parse_server_registry("mcp:\n  servers:\n", "r").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_registry_rejects_list() {
        let err = parse_server_registry("mcp:\n  servers: [a, b]\n", "r").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_registry_invalid_yaml() {
        let err = parse_server_registry("mcp: [unclosed", "r").unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml(_)));
    }
}
