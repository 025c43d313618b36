//! Orchestrator owning the fleet of managed server processes.
//!
//! The [`Orchestrator`] is the single owner of the pool: it assigns ports,
//! launches and stops processes, and fans discovery out across the fleet.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolfleet_mcp::{Orchestrator, OrchestratorOptions, ServerSpec};
//!
//! let mut fleet = Orchestrator::new(OrchestratorOptions::default());
//!
//! let report = fleet
//!     .start_all(vec![
//!         ServerSpec::new("files", "npx").with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]),
//!         ServerSpec::new("git", "uvx").with_arg("mcp-server-git"),
//!     ])
//!     .await?;
//! for err in &report.errors {
//!     eprintln!("skipped: {err}");
//! }
//!
//! for tagged in fleet.list_all_tools().await {
//!     println!("{} -> {}", tagged.server, tagged.tool.name);
//! }
//!
//! let stopped = fleet.stop_all().await;
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::process::{DEFAULT_SHUTDOWN_GRACE, LaunchOptions, ManagedProcess, StopOutcome};
use crate::protocol::{CallToolResult, ServerTool};
use crate::session::SessionOptions;
use crate::spec::ServerSpec;

/// First port handed out by a fresh orchestrator.
pub const DEFAULT_BASE_PORT: u16 = 8080;

/// Default pause after launching, so proxies can bind before discovery.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// First port assigned; later ports count up from here.
    pub base_port: u16,
    /// Pause after `start_all` launches its processes.
    pub settle: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub shutdown_grace: Duration,
    /// Proxy and session settings for each process.
    pub launch: LaunchOptions,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_BASE_PORT,
            settle: DEFAULT_SETTLE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            launch: LaunchOptions::default(),
        }
    }
}

impl OrchestratorOptions {
    /// Set the first port.
    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    /// Set the settle period.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the proxy executable.
    pub fn with_proxy_binary(mut self, proxy: impl Into<PathBuf>) -> Self {
        self.launch.proxy_binary = proxy.into();
        self
    }

    /// Set the per-process session options.
    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.launch.session = session;
        self
    }
}

/// One row of a pool snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolEntry {
    /// Server name.
    pub name: String,
    /// Assigned port.
    pub port: u16,
    /// Proxy endpoint.
    pub address: String,
    /// OS process id.
    pub pid: Option<u32>,
    /// Whether the process was running when the snapshot was taken.
    pub running: bool,
}

/// Outcome of [`Orchestrator::start_all`].
#[derive(Debug, Default)]
pub struct StartReport {
    /// The pool after the start, in launch order.
    pub pool: Vec<PoolEntry>,
    /// Entries that were skipped, with the reason.
    pub errors: Vec<McpError>,
}

impl StartReport {
    /// Port assigned to `name`, if it is in the pool.
    pub fn port_of(&self, name: &str) -> Option<u16> {
        self.pool.iter().find(|e| e.name == name).map(|e| e.port)
    }

    /// Number of duplicate names that were skipped.
    pub fn duplicate_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| matches!(e, McpError::DuplicateServer { .. }))
            .count()
    }

    /// Number of servers whose launch failed.
    pub fn launch_failure_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| matches!(e, McpError::Launch { .. }))
            .count()
    }

    /// Whether every requested server was started.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owner of the running fleet, keyed by server name in launch order.
pub struct Orchestrator {
    options: OrchestratorOptions,
    pool: Vec<ManagedProcess>,
    next_port: u32,
}

impl Orchestrator {
    /// Create an orchestrator with an empty pool.
    pub fn new(options: OrchestratorOptions) -> Self {
        let next_port = u32::from(options.base_port);
        Self {
            options,
            pool: Vec::new(),
            next_port,
        }
    }

    /// The orchestrator's settings.
    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    fn allocate_port(&mut self) -> Result<u16> {
        let port = u16::try_from(self.next_port)
            .map_err(|_| McpError::config("no ports left above the base port"))?;
        self.next_port += 1;
        Ok(port)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.pool.iter().position(|p| p.name() == name)
    }

    /// Launch one process per spec, in order.
    ///
    /// Invalid specs abort the whole call before anything is spawned.
    /// Duplicate names and launch failures are skipped and reported in the
    /// returned [`StartReport`]; the rest of the fleet still starts.
    pub async fn start_all(&mut self, specs: impl IntoIterator<Item = ServerSpec>) -> Result<StartReport> {
        let specs: Vec<ServerSpec> = specs.into_iter().collect();
        for spec in &specs {
            spec.validate()?;
        }

        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        let mut launched = 0usize;

        for spec in specs {
            if self.contains(&spec.name) || !seen.insert(spec.name.clone()) {
                tracing::warn!(server = %spec.name, "duplicate server name, skipping");
                errors.push(McpError::DuplicateServer { name: spec.name });
                continue;
            }

            let port = match self.allocate_port() {
                Ok(port) => port,
                Err(e) => {
                    tracing::error!(server = %spec.name, error = %e, "cannot assign port");
                    errors.push(e);
                    continue;
                }
            };

            match ManagedProcess::launch(spec, port, &self.options.launch) {
                Ok(process) => {
                    self.pool.push(process);
                    launched += 1;
                }
                Err(e) => {
                    tracing::error!(port, error = %e, "failed to launch server");
                    errors.push(e);
                }
            }
        }

        if launched > 0 && !self.options.settle.is_zero() {
            tokio::time::sleep(self.options.settle).await;
        }

        tracing::info!(
            launched,
            skipped = errors.len(),
            pool_size = self.pool.len(),
            "fleet start complete"
        );

        Ok(StartReport {
            pool: self.snapshot(),
            errors,
        })
    }

    /// Stop every process and clear the pool.
    ///
    /// Returns how many processes were running at stop time. The pool is
    /// emptied even if some processes failed to stop cleanly.
    pub async fn stop_all(&mut self) -> usize {
        if self.pool.is_empty() {
            return 0;
        }

        let grace = self.options.shutdown_grace;
        let outcomes = join_all(self.pool.iter_mut().map(|process| async move {
            let name = process.name().to_string();
            (name, process.stop(grace).await)
        }))
        .await;

        let stopped = count_running(outcomes);

        tracing::info!(stopped, total = self.pool.len(), "fleet stopped");
        self.pool.clear();
        stopped
    }

    /// Stop one server and remove it from the pool.
    pub async fn stop(&mut self, name: &str) -> Result<StopOutcome> {
        let index = self
            .position(name)
            .ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;
        let mut process = self.pool.remove(index);
        process.stop(self.options.shutdown_grace).await
    }

    /// Stop a server and relaunch it on a fresh port with a fresh session.
    ///
    /// Returns the new port. If the relaunch fails the server is removed
    /// from the pool.
    pub async fn restart(&mut self, name: &str) -> Result<u16> {
        let index = self
            .position(name)
            .ok_or_else(|| McpError::ServerNotFound(name.to_string()))?;

        let grace = self.options.shutdown_grace;
        if let Err(e) = self.pool[index].stop(grace).await {
            tracing::warn!(server = %name, error = %e, "failed to stop server before restart");
        }

        let spec = self.pool[index].spec().clone();
        let relaunched = self
            .allocate_port()
            .and_then(|port| ManagedProcess::launch(spec, port, &self.options.launch));

        match relaunched {
            Ok(process) => {
                let port = process.port();
                tracing::info!(server = %name, port, "server restarted");
                self.pool[index] = process;
                if !self.options.settle.is_zero() {
                    tokio::time::sleep(self.options.settle).await;
                }
                Ok(port)
            }
            Err(e) => {
                self.pool.remove(index);
                Err(e)
            }
        }
    }

    /// Look up a process by name.
    pub fn get(&self, name: &str) -> Option<&ManagedProcess> {
        self.pool.iter().find(|p| p.name() == name)
    }

    /// Look up a process by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ManagedProcess> {
        self.pool.iter_mut().find(|p| p.name() == name)
    }

    /// Whether a server with this name is in the pool.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Names in launch order.
    pub fn names(&self) -> Vec<&str> {
        self.pool.iter().map(|p| p.name()).collect()
    }

    /// Number of pooled processes.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Current state of every pooled process, in launch order.
    pub fn snapshot(&mut self) -> Vec<PoolEntry> {
        self.pool
            .iter_mut()
            .map(|p| PoolEntry {
                name: p.name().to_string(),
                port: p.port(),
                address: p.address(),
                pid: p.pid(),
                running: p.is_running(),
            })
            .collect()
    }

    /// Discover tools on every server concurrently.
    ///
    /// Results are concatenated in pool order, each tool tagged with its
    /// server. Servers that fail discovery contribute nothing.
    pub async fn list_all_tools(&mut self) -> Vec<ServerTool> {
        let per_server = join_all(self.pool.iter_mut().map(|process| async move {
            let server = process.name().to_string();
            let tools: Vec<_> = process.list_tools().await.collect();
            (server, tools)
        }))
        .await;

        per_server
            .into_iter()
            .flat_map(|(server, tools)| {
                tools.into_iter().map(move |tool| ServerTool {
                    server: server.clone(),
                    tool,
                })
            })
            .collect()
    }

    /// Invoke `tool` on the server called `server`.
    pub async fn call_tool(
        &mut self,
        server: &str,
        tool: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult> {
        let process = self
            .get_mut(server)
            .ok_or_else(|| McpError::ServerNotFound(server.to_string()))?;
        process.call_tool(tool, arguments).await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pool", &self.names())
            .field("next_port", &self.next_port)
            .finish()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Children are spawned with kill_on_drop, so dropping the pool kills them.
        if !self.pool.is_empty() {
            tracing::debug!(count = self.pool.len(), "dropping orchestrator, killing servers");
        }
    }
}

/// Count stop outcomes for processes that were running at stop time.
///
/// [`ManagedProcess::stop`] only fails after it has seen the process
/// running, so failures count too.
fn count_running(outcomes: Vec<(String, Result<StopOutcome>)>) -> usize {
    let mut running = 0;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(outcome) if outcome.was_running() => running += 1,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(server = %name, error = %e, "failed to stop server cleanly");
                running += 1;
            }
        }
    }
    running
}
