//! Server specifications as loaded from configuration.

use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};

/// How to launch one tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Unique name for this server.
    pub name: String,
    /// Command the proxy should run.
    pub command: String,
    /// Arguments passed to the command, in order.
    #[serde(default, alias = "args")]
    pub arguments: Vec<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServerSpec {
    /// Create a spec with no arguments or description.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            arguments: Vec::new(),
            description: None,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Replace the arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject specs that cannot possibly be launched.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(McpError::config("server name must not be empty"));
        }
        if self.command.trim().is_empty() {
            return Err(McpError::config(format!(
                "server '{}' has an empty command",
                self.name
            )));
        }
        Ok(())
    }
}
