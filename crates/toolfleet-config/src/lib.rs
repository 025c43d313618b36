//! Configuration system for toolfleet.
//!
//! Provides TOML-based settings with:
//! - Orchestrator, session and logging sections (`[fleet]`, `[session]`, `[logging]`)
//! - Inline `[[servers]]` entries
//! - An optional YAML server registry (`mcp: servers:`) named by `servers_file`
//! - Config file layering (XDG user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, default_log_dir, load_config, load_config_file,
    load_config_with_options, load_server_registry, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
