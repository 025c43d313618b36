//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/toolfleet/config.toml` (XDG user config)
//! 2. `./toolfleet.toml` (project-local)
//! 3. `--config <file>` replaces discovery entirely (handled by [`load_config_file`])
//!
//! After the layers are merged, the YAML registry named by `servers_file`
//! is read and its servers are appended after the inline `[[servers]]`.

use std::path::{Path, PathBuf};

use crate::types::parse_server_registry;
use crate::{ConfigError, FleetConfig, Result, ServerEntry};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "toolfleet.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "toolfleet";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "TOOLFLEET_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration, registry servers included.
    pub config: FleetConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `TOOLFLEET_CONFIG_DIR` and the platform default.
/// Malformed layers and an unreadable registry become warnings.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = FleetConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    if let Some(registry) = config.servers_file.clone() {
        match load_server_registry(&registry) {
            Ok(entries) => {
                config.servers.extend(entries);
                sources.push(ConfigSource {
                    path: registry,
                    loaded: true,
                });
            }
            Err(e) => {
                warnings.push(format!("Failed to load server registry: {}", e));
                sources.push(ConfigSource {
                    path: registry,
                    loaded: false,
                });
            }
        }
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
///
/// The registry named by `servers_file`, if any, must load too.
pub fn load_config_file(path: &Path) -> Result<FleetConfig> {
    let mut config = read_layer(path)?;
    if let Some(registry) = config.servers_file.clone() {
        config.servers.extend(load_server_registry(&registry)?);
    }
    Ok(config)
}

/// Load the YAML server registry at `path`.
pub fn load_server_registry(path: &Path) -> Result<Vec<ServerEntry>> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_server_registry(&contents, &path.display().to_string())
}

/// Get the XDG config file path for toolfleet.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for toolfleet.
///
/// Checks `TOOLFLEET_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Default directory for rolling log files.
pub fn default_log_dir() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join("logs"))
}

/// Read one TOML file, resolving `servers_file` against its directory.
fn read_layer(path: &Path) -> Result<FleetConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut config = FleetConfig::from_toml(&contents)?;

    if let Some(registry) = &config.servers_file
        && registry.is_relative()
        && let Some(parent) = path.parent()
    {
        config.servers_file = Some(parent.join(registry));
    }
    Ok(config)
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut FleetConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match read_layer(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const REGISTRY: &str = r#"
mcp:
  servers:
    filesystem:
      command: npx
      args: ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
    git:
      command: uvx
      args: ["mcp-server-git"]
"#;

    #[test]
    fn test_xdg_config_path_shape() {
        if let Some(p) = xdg_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/toolfleet.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolfleet.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_file_with_registry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("servers.yaml"), REGISTRY).unwrap();
        let path = dir.path().join("toolfleet.toml");
        fs::write(
            &path,
            r#"
servers_file = "servers.yaml"

[[servers]]
name = "inline"
command = "echo"
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        let names: Vec<_> = config.servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["inline", "filesystem", "git"]);
        assert_eq!(config.servers_file, Some(dir.path().join("servers.yaml")));
    }

    #[test]
    fn test_registry_duplicates_are_kept() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("servers.yaml"), REGISTRY).unwrap();
        let path = dir.path().join("toolfleet.toml");
        fs::write(
            &path,
            "servers_file = \"servers.yaml\"\n\n[[servers]]\nname = \"git\"\ncommand = \"uvx\"\n",
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.servers.iter().filter(|s| s.name == "git").count(), 2);
    }

    #[test]
    fn test_discovered_duplicates_are_kept() {
        let project_dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(
            project_dir.path().join("toolfleet.toml"),
            r#"
[[servers]]
name = "alpha"
command = "first"

[[servers]]
name = "alpha"
command = "second"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(empty_config_dir.path()))
                .unwrap();
        let commands: Vec<_> = loaded
            .config
            .servers
            .iter()
            .filter(|s| s.name == "alpha")
            .map(|s| s.command.as_str())
            .collect();
        assert_eq!(commands, vec!["first", "second"]);

        let explicit = load_config_file(&project_dir.path().join("toolfleet.toml")).unwrap();
        assert_eq!(explicit.servers.len(), loaded.config.servers.len());
    }

    #[test]
    fn test_explicit_file_requires_registry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolfleet.toml");
        fs::write(&path, "servers_file = \"missing.yaml\"\n").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert!(loaded.config.servers.is_empty());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_load_config_layered_merge() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[fleet]
base_port = 9000
proxy_binary = "user-proxy"

[[servers]]
name = "shared"
command = "user-command"
"#,
        )
        .unwrap();
        fs::write(
            project_dir.path().join("toolfleet.toml"),
            r#"
[fleet]
base_port = 9500

[[servers]]
name = "shared"
command = "project-command"

[[servers]]
name = "local"
command = "echo"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        let config = &loaded.config;

        // Sections replace whole, so the project layer's defaults win.
        assert_eq!(config.fleet().base_port, 9500);
        assert_eq!(config.fleet().proxy_binary, "mcp-proxy");
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.server("shared").unwrap().command, "project-command");
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_malformed_layer_warns_but_continues() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(dir.path().join("toolfleet.toml"), "not valid toml {{{{").unwrap();

        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert!(!loaded.warnings.is_empty());
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_unreadable_registry_warns() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("toolfleet.toml"),
            "servers_file = \"nope.yaml\"\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("server registry"));
        assert!(loaded.sources.iter().any(|s| !s.loaded && s.path.ends_with("nope.yaml")));
    }
}
