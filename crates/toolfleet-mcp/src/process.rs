//! One proxied tool server process and its protocol session.
//!
//! Each server runs as `<proxy> --port=<port> -- <command> <args...>`. The
//! proxy exposes the server's stdio transport at `http://localhost:<port>/mcp`.
//! Child output is captured into a bounded buffer instead of being forwarded
//! to our own console.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::error::{McpError, Result};
use crate::protocol::{CallToolResult, ToolDescriptor};
use crate::session::{ProtocolSession, SessionOptions, ToolSnapshot};
use crate::spec::ServerSpec;

/// Proxy executable used when none is configured.
pub const DEFAULT_PROXY_BINARY: &str = "mcp-proxy";

/// Default time a process gets to exit after SIGTERM.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default number of captured output lines kept per process.
pub const DEFAULT_OUTPUT_LINES: usize = 200;

/// Endpoint of the proxy listening on `port`.
pub fn address_for(port: u16) -> String {
    format!("http://localhost:{}/mcp", port)
}

/// Proxy arguments for launching `spec` on `port`.
pub fn proxy_args(spec: &ServerSpec, port: u16) -> Vec<String> {
    let mut args = Vec::with_capacity(spec.arguments.len() + 3);
    args.push(format!("--port={}", port));
    args.push("--".to_string());
    args.push(spec.command.clone());
    args.extend(spec.arguments.iter().cloned());
    args
}

/// Liveness of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process has not exited.
    Running,
    /// The process exited, with its code when one was reported.
    Exited(Option<i32>),
}

impl ProcessStatus {
    /// Whether the process is still running.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// How a call to [`ManagedProcess::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within the grace period after SIGTERM.
    Terminated,
    /// Outlived the grace period and was killed.
    Killed,
    /// Had already exited before `stop` was called.
    AlreadyStopped,
}

impl StopOutcome {
    /// Whether the process was running when `stop` was called.
    pub fn was_running(self) -> bool {
        !matches!(self, Self::AlreadyStopped)
    }
}

/// Settings shared by every process the orchestrator launches.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// The proxy executable placed in front of each server command.
    pub proxy_binary: PathBuf,
    /// Options for each process's protocol session.
    pub session: SessionOptions,
    /// How many captured output lines to keep per process.
    pub output_lines: usize,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            proxy_binary: PathBuf::from(DEFAULT_PROXY_BINARY),
            session: SessionOptions::default(),
            output_lines: DEFAULT_OUTPUT_LINES,
        }
    }
}

/// Which child stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// One captured line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Source stream.
    pub stream: OutputStream,
    /// Line contents without the trailing newline.
    pub line: String,
}

/// Ring buffer of recent child output, filled by background reader tasks.
#[derive(Debug, Clone)]
struct OutputBuffer {
    lines: Arc<Mutex<VecDeque<OutputLine>>>,
    capacity: usize,
}

impl OutputBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    fn push(&self, line: OutputLine) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    fn snapshot(&self) -> Vec<OutputLine> {
        self.lines.lock().iter().cloned().collect()
    }

    fn capture<R>(&self, server: String, stream: OutputStream, reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = self.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        tracing::trace!(server = %server, stream = ?stream, line = %line, "child output");
                        buffer.push(OutputLine { stream, line });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(server = %server, error = %e, "stopped reading child output");
                        break;
                    }
                }
            }
        });
    }
}

/// A running proxy process for one server, plus its protocol session.
///
/// The process handle is owned exclusively; nothing else signals it.
pub struct ManagedProcess {
    spec: ServerSpec,
    port: u16,
    child: Child,
    pid: Option<u32>,
    session: ProtocolSession,
    output: OutputBuffer,
}

impl ManagedProcess {
    /// Spawn the proxy for `spec` on `port`.
    ///
    /// Must be called from within a Tokio runtime. Spawn failures are
    /// returned as [`McpError::Launch`] and not retried.
    pub fn launch(spec: ServerSpec, port: u16, options: &LaunchOptions) -> Result<Self> {
        let session = ProtocolSession::new(&spec.name, address_for(port), options.session.clone())?;

        let mut cmd = Command::new(&options.proxy_binary);
        cmd.args(proxy_args(&spec, port))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            McpError::launch(
                &spec.name,
                format!(
                    "failed to spawn '{}': {}",
                    options.proxy_binary.display(),
                    e
                ),
            )
        })?;

        let output = OutputBuffer::new(options.output_lines);
        if let Some(stdout) = child.stdout.take() {
            output.capture(spec.name.clone(), OutputStream::Stdout, stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            output.capture(spec.name.clone(), OutputStream::Stderr, stderr);
        }

        let pid = child.id();
        tracing::info!(
            server = %spec.name,
            port,
            pid = pid.unwrap_or_default(),
            command = %spec.command,
            "launched server proxy"
        );

        Ok(Self {
            spec,
            port,
            child,
            pid,
            session,
            output,
        })
    }

    /// Server name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The spec this process was launched from.
    pub fn spec(&self) -> &ServerSpec {
        &self.spec
    }

    /// Port the proxy was told to listen on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// OS process id, as recorded at launch.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Endpoint of this server's proxy.
    pub fn address(&self) -> String {
        address_for(self.port)
    }

    /// The protocol session for this server.
    pub fn session(&self) -> &ProtocolSession {
        &self.session
    }

    /// Poll the process without blocking.
    pub fn status(&mut self) -> ProcessStatus {
        match self.child.try_wait() {
            Ok(None) => ProcessStatus::Running,
            Ok(Some(status)) => ProcessStatus::Exited(status.code()),
            Err(e) => {
                tracing::warn!(server = %self.spec.name, error = %e, "failed to poll process");
                ProcessStatus::Exited(None)
            }
        }
    }

    /// Whether the process is still running.
    pub fn is_running(&mut self) -> bool {
        self.status().is_running()
    }

    /// Recently captured stdout/stderr lines, oldest first.
    pub fn recent_output(&self) -> Vec<OutputLine> {
        self.output.snapshot()
    }

    /// Discover this server's tools, reporting why discovery failed.
    pub async fn try_list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        if let ProcessStatus::Exited(code) = self.status() {
            tracing::warn!(server = %self.spec.name, code = ?code, "server process has exited");
            return Err(McpError::NotRunning(self.spec.name.clone()));
        }
        self.session.try_list_tools().await
    }

    /// Discover this server's tools. Empty on any failure.
    pub async fn list_tools(&mut self) -> ToolSnapshot {
        if let ProcessStatus::Exited(code) = self.status() {
            tracing::warn!(server = %self.spec.name, code = ?code, "server process has exited");
            return ToolSnapshot::empty();
        }
        self.session.list_tools().await
    }

    /// Invoke a tool on this server.
    pub async fn call_tool(&mut self, tool: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        if !self.is_running() {
            return Err(McpError::NotRunning(self.spec.name.clone()));
        }
        self.session.call_tool(tool, arguments).await
    }

    /// Stop the process: SIGTERM, wait up to `grace`, then SIGKILL.
    ///
    /// Calling this on a process that already exited returns
    /// [`StopOutcome::AlreadyStopped`].
    pub async fn stop(&mut self, grace: Duration) -> Result<StopOutcome> {
        if !self.is_running() {
            tracing::debug!(server = %self.spec.name, "server already stopped");
            return Ok(StopOutcome::AlreadyStopped);
        }

        tracing::info!(server = %self.spec.name, pid = self.pid.unwrap_or_default(), "stopping server");
        self.terminate();
        self.session.reset();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(server = %self.spec.name, code = ?status.code(), "server exited");
                Ok(StopOutcome::Terminated)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                let timeout = McpError::ShutdownTimeout {
                    name: self.spec.name.clone(),
                    grace,
                };
                tracing::warn!(server = %self.spec.name, error = %timeout, "escalating to kill");
                self.child.kill().await?;
                Ok(StopOutcome::Killed)
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            tracing::debug!(server = %self.spec.name, error = %e, "SIGTERM not delivered");
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(server = %self.spec.name, error = %e, "kill not delivered");
        }
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("name", &self.spec.name)
            .field("port", &self.port)
            .field("pid", &self.pid)
            .field("session", self.session.state())
            .finish()
    }
}
