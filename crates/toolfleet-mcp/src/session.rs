//! Stateful protocol session with one proxied tool server.
//!
//! A [`ProtocolSession`] starts out [`SessionState::Uninitialized`]. The first
//! outbound call performs the `initialize` handshake and moves it to
//! [`SessionState::Ready`] or [`SessionState::Failed`]. A failed session
//! stays failed until [`ProtocolSession::reset`] is called, so a dead server
//! costs one handshake attempt rather than one per discovery call.

use std::future::Future;
use std::iter::FusedIterator;
use std::time::Duration;

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, ClientInfo, DEFAULT_CLIENT_NAME, InitializeParams,
    InitializeResult, JsonRpcNotification, JsonRpcRequest, ListToolsResult, ServerInfo,
    ToolDescriptor, methods,
};
use crate::transport::{HttpTransport, HttpTransportConfig};

/// Tunables for a protocol session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Name advertised in `clientInfo`.
    pub client_name: String,
    /// Upper bound on each network call.
    pub request_timeout: Duration,
    /// Connection retries per call, to ride out a proxy that is still binding.
    pub retries: u32,
    /// Delay between connection retries.
    pub retry_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            request_timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl SessionOptions {
    /// Set the advertised client name.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Set the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set connection retries and the delay between them.
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }
}

/// Handshake state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No handshake attempted yet.
    Uninitialized,
    /// Handshake succeeded.
    Ready {
        /// Token from the `mcp-session-id` header, if the server issued one.
        session_id: Option<String>,
    },
    /// Handshake failed; terminal until reset.
    Failed {
        /// Why the handshake failed.
        reason: String,
    },
}

/// A one-shot snapshot of the tools a server advertised.
///
/// Iterates in the order the server returned them.
#[derive(Debug)]
pub struct ToolSnapshot {
    tools: std::vec::IntoIter<ToolDescriptor>,
}

impl ToolSnapshot {
    /// A snapshot with no tools.
    pub fn empty() -> Self {
        Self::from(Vec::new())
    }
}

impl From<Vec<ToolDescriptor>> for ToolSnapshot {
    fn from(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools: tools.into_iter(),
        }
    }
}

impl Iterator for ToolSnapshot {
    type Item = ToolDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        self.tools.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tools.size_hint()
    }
}

impl ExactSizeIterator for ToolSnapshot {}

impl FusedIterator for ToolSnapshot {}

/// JSON-RPC session with a single proxied server.
#[derive(Debug)]
pub struct ProtocolSession {
    server: String,
    transport: HttpTransport,
    options: SessionOptions,
    state: SessionState,
    server_info: Option<ServerInfo>,
    next_id: u64,
}

impl ProtocolSession {
    /// Create an uninitialized session for the server at `address`.
    ///
    /// No network traffic happens until the first call.
    pub fn new(
        server: impl Into<String>,
        address: impl Into<String>,
        options: SessionOptions,
    ) -> Result<Self> {
        let config = HttpTransportConfig::new(address)
            .with_timeout(options.request_timeout)
            .with_retries(options.retries)
            .with_retry_delay(options.retry_delay);

        Ok(Self {
            server: server.into(),
            transport: HttpTransport::new(config)?,
            options,
            state: SessionState::Uninitialized,
            server_info: None,
            next_id: 0,
        })
    }

    /// Name of the server this session talks to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Endpoint this session posts to.
    pub fn address(&self) -> &str {
        self.transport.url()
    }

    /// Current handshake state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether the handshake has succeeded.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready { .. })
    }

    /// The session token, once issued.
    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Ready { session_id } => session_id.as_deref(),
            _ => None,
        }
    }

    /// Server identity from the initialize response, if it sent one.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Forget the handshake so the next call performs a fresh one.
    pub fn reset(&mut self) {
        tracing::debug!(server = %self.server, "resetting protocol session");
        self.state = SessionState::Uninitialized;
        self.server_info = None;
        self.next_id = 0;
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.options.request_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| McpError::Timeout(limit))?
    }

    /// Perform the handshake if it has not been attempted yet.
    pub async fn ensure_ready(&mut self) -> Result<()> {
        if let SessionState::Failed { reason } = &self.state {
            return Err(McpError::handshake(&self.server, reason));
        }
        if self.is_ready() {
            return Ok(());
        }

        match self.handshake().await {
            Ok(session_id) => {
                tracing::info!(
                    server = %self.server,
                    session = session_id.as_deref().unwrap_or("-"),
                    "MCP session ready"
                );
                self.state = SessionState::Ready { session_id };
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(server = %self.server, error = %reason, "MCP handshake failed");
                self.state = SessionState::Failed {
                    reason: reason.clone(),
                };
                Err(McpError::handshake(&self.server, reason))
            }
        }
    }

    async fn handshake(&mut self) -> Result<Option<String>> {
        let params = InitializeParams::for_client(ClientInfo::named(&self.options.client_name));
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            methods::INITIALIZE,
            Some(serde_json::to_value(&params)?),
        );

        let reply = self
            .bounded(self.transport.send_request(&request, None))
            .await?;
        let result = reply
            .response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))?;

        let init: InitializeResult = serde_json::from_value(result).unwrap_or_else(|e| {
            tracing::debug!(server = %self.server, error = %e, "unrecognised initialize result");
            InitializeResult::default()
        });
        if let Some(info) = &init.server_info {
            tracing::debug!(
                server = %self.server,
                remote = %info.name,
                version = %info.version,
                "initialize acknowledged"
            );
        }
        self.server_info = init.server_info;

        let session_id = reply.session_id;
        let notified = self
            .bounded(
                self.transport
                    .send_notification(&JsonRpcNotification::initialized(), session_id.as_deref()),
            )
            .await;
        if let Err(e) = notified {
            tracing::warn!(server = %self.server, error = %e, "initialized notification not accepted");
        }

        Ok(session_id)
    }

    /// List the server's tools, reporting why discovery failed.
    pub async fn try_list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_ready().await?;

        let request = JsonRpcRequest::new(self.next_request_id(), methods::TOOLS_LIST, None);
        let reply = self
            .bounded(self.transport.send_request(&request, self.session_id()))
            .await
            .map_err(|e| McpError::discovery(&self.server, e))?;

        let result = reply
            .response
            .into_result()
            .map_err(|e| McpError::discovery(&self.server, format!("{} ({})", e.message, e.code)))?;
        let listed: ListToolsResult =
            serde_json::from_value(result).map_err(|e| McpError::discovery(&self.server, e))?;

        tracing::debug!(
            server = %self.server,
            tool_count = listed.tools.len(),
            "listed MCP tools"
        );
        Ok(listed.tools)
    }

    /// List the server's tools.
    ///
    /// Never fails: any handshake or discovery error is logged and yields an
    /// empty snapshot, so one unreachable server cannot break discovery for
    /// the rest of the fleet.
    pub async fn list_tools(&mut self) -> ToolSnapshot {
        match self.try_list_tools().await {
            Ok(tools) => ToolSnapshot::from(tools),
            Err(e) => {
                tracing::warn!(server = %self.server, error = %e, "tool discovery unavailable");
                ToolSnapshot::empty()
            }
        }
    }

    /// Invoke a tool on the server.
    pub async fn call_tool(&mut self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        self.ensure_ready().await?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            methods::TOOLS_CALL,
            Some(serde_json::to_value(&params)?),
        );
        let reply = self
            .bounded(self.transport.send_request(&request, self.session_id()))
            .await?;
        let result = reply
            .response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(server = %self.server, tool = %name, "tool call returned error");
        } else {
            tracing::debug!(server = %self.server, tool = %name, "tool call succeeded");
        }

        Ok(call_result)
    }
}
