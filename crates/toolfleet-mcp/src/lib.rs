//! Multi-server MCP process orchestration for toolfleet.
//!
//! This crate launches one proxied tool server per configured entry, keeps
//! a stateful JSON-RPC session with each, and exposes fleet-wide tool
//! discovery and invocation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                               │
//! │  - Owns the pool, assigns ports from a monotonic counter    │
//! │  - start_all / stop_all / list_all_tools / restart          │
//! └─────────────────────────────────────────────────────────────┘
//!                           │ one per server
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ManagedProcess                                             │
//! │  - <proxy> --port=N -- <command> <args...>                  │
//! │  - Captures child output, SIGTERM then SIGKILL on stop      │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ProtocolSession                                            │
//! │  - Lazy initialize handshake, mcp-session-id tracking       │
//! │  - tools/list and tools/call over HTTP POST                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`ToolCatalog`] sits beside the orchestrator and describes what is
//! configured without starting anything.
//!
//! # Usage
//!
//! ```rust,ignore
//! use toolfleet_mcp::{Orchestrator, OrchestratorOptions, ServerSpec};
//!
//! let mut fleet = Orchestrator::new(OrchestratorOptions::default());
//! fleet.start_all(vec![ServerSpec::new("git", "uvx").with_arg("mcp-server-git")]).await?;
//!
//! for tagged in fleet.list_all_tools().await {
//!     println!("{}", tagged.qualified_name());
//! }
//!
//! let result = fleet.call_tool("git", "git_status", Some(json!({"repo_path": "."}))).await?;
//! println!("{:?}", result.text());
//!
//! fleet.stop_all().await;
//! ```
//!
//! # Protocol flow
//!
//! 1. Client posts `initialize` (id 0) and reads the `mcp-session-id` header
//! 2. Client posts the `initialized` notification
//! 3. Client posts `tools/list` and `tools/call` with the session header

pub mod catalog;
pub mod error;
pub mod pool;
pub mod process;
pub mod protocol;
pub mod session;
pub mod spec;
pub mod transport;

pub use catalog::{RuntimeKind, ToolCatalog, ToolMetadata, classify};
pub use error::{McpError, Result};
pub use pool::{Orchestrator, OrchestratorOptions, PoolEntry, StartReport};
pub use process::{
    LaunchOptions, ManagedProcess, OutputLine, OutputStream, ProcessStatus, StopOutcome,
};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerInfo, ServerTool,
    ToolContent, ToolDescriptor,
};
pub use session::{ProtocolSession, SessionOptions, SessionState, ToolSnapshot};
pub use spec::ServerSpec;
pub use transport::{HttpTransport, HttpTransportConfig, SESSION_HEADER};
