//! CLI command handlers.

pub mod call;
pub mod run;
pub mod servers;
pub mod tools;

use anyhow::{Context as _, Result};

use toolfleet_config::{FleetConfig, ServerEntry};
use toolfleet_mcp::{Orchestrator, OrchestratorOptions, ServerSpec, SessionOptions, StartReport};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration.
    pub config: FleetConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Specs for every enabled server, in configuration order.
    pub fn server_specs(&self) -> Vec<ServerSpec> {
        self.config.enabled_servers().map(spec_from_entry).collect()
    }

    /// Spec for one enabled server.
    pub fn server_spec(&self, name: &str) -> Result<ServerSpec> {
        self.config
            .enabled_servers()
            .find(|s| s.name == name)
            .map(spec_from_entry)
            .with_context(|| format!("server '{}' is not configured", name))
    }

    /// Build an orchestrator from the `[fleet]` and `[session]` settings.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(orchestrator_options(&self.config))
    }
}

/// Convert a config entry into a launchable spec.
pub fn spec_from_entry(entry: &ServerEntry) -> ServerSpec {
    let spec = ServerSpec::new(&entry.name, &entry.command).with_args(entry.args.iter().cloned());
    match &entry.description {
        Some(description) => spec.with_description(description),
        None => spec,
    }
}

/// Orchestrator options from config, falling back to defaults per section.
pub fn orchestrator_options(config: &FleetConfig) -> OrchestratorOptions {
    let fleet = config.fleet();
    let session = config.session();

    OrchestratorOptions::default()
        .with_base_port(fleet.base_port)
        .with_settle(fleet.settle())
        .with_shutdown_grace(fleet.shutdown_grace())
        .with_proxy_binary(&fleet.proxy_binary)
        .with_session(
            SessionOptions::default()
                .with_client_name(&fleet.client_name)
                .with_request_timeout(session.request_timeout())
                .with_retries(session.retries, session.retry_delay()),
        )
}

/// Start `specs` and report any servers that were skipped.
///
/// Callers own the returned fleet and must call `stop_all` on every path.
pub async fn start_fleet(ctx: &Context, specs: Vec<ServerSpec>) -> Result<Orchestrator> {
    let mut fleet = ctx.orchestrator();
    let report = fleet.start_all(specs).await?;
    report_start_errors(&report);
    Ok(fleet)
}

/// Print skipped servers from a start report to stderr.
pub fn report_start_errors(report: &StartReport) {
    for err in &report.errors {
        eprintln!("warning: {}", err);
    }
}

/// Truncate a string to `max_len` characters, marking the cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
