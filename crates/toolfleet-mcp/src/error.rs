//! Error types for fleet and MCP operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for fleet and MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for fleet and MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Malformed or missing server configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The same server name appeared twice.
    #[error("duplicate server name '{name}'")]
    DuplicateServer {
        /// The repeated name.
        name: String,
    },

    /// Failed to spawn the proxy process for a server.
    #[error("failed to launch server '{name}': {reason}")]
    Launch {
        /// Server name.
        name: String,
        /// Why the spawn failed.
        reason: String,
    },

    /// The initialize handshake did not complete.
    #[error("handshake with '{server}' failed: {reason}")]
    Handshake {
        /// Server name.
        server: String,
        /// Underlying cause.
        reason: String,
    },

    /// A tools/list call failed after the handshake.
    #[error("tool discovery on '{server}' failed: {reason}")]
    Discovery {
        /// Server name.
        server: String,
        /// Underlying cause.
        reason: String,
    },

    /// A process did not exit within its grace period.
    #[error("server '{name}' did not exit within {grace:?}")]
    ShutdownTimeout {
        /// Server name.
        name: String,
        /// The grace period that elapsed.
        grace: Duration,
    },

    /// No server with this name is in the pool.
    #[error("server '{0}' not found")]
    ServerNotFound(String),

    /// The server's process has exited.
    #[error("server '{0}' is not running")]
    NotRunning(String),

    /// Failed to communicate with the proxy.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server returned an error response.
    #[error("server error {code}: {message}")]
    ServerError {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// Timeout waiting for response.
    #[error("timeout after {0:?} waiting for response")]
    Timeout(Duration),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a launch error.
    pub fn launch(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Launch {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a handshake error.
    pub fn handshake(server: impl Into<String>, reason: impl ToString) -> Self {
        Self::Handshake {
            server: server.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a discovery error.
    pub fn discovery(server: impl Into<String>, reason: impl ToString) -> Self {
        Self::Discovery {
            server: server.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a server error from an error response.
    pub fn server_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::launch("alpha", "No such file or directory");
        assert!(err.to_string().contains("alpha"));
        assert!(err.to_string().contains("No such file"));

        let err = McpError::server_error(-32600, "Invalid Request", None);
        assert!(err.to_string().contains("-32600"));
        assert!(err.to_string().contains("Invalid Request"));

        let err = McpError::DuplicateServer {
            name: "beta".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate server name 'beta'");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: McpError = json_err.into();
        assert!(matches!(err, McpError::Json(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: McpError = io_err.into();
        assert!(matches!(err, McpError::Io(_)));
    }
}
