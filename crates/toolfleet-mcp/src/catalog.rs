//! Static tool metadata derived from configuration.
//!
//! The catalog answers "what could be started" without launching anything,
//! so capabilities can be advertised before a user opts into a session.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::spec::ServerSpec;

/// Runtime a server command is launched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Node-based (`npx`, `node`, ...).
    Node,
    /// Python-based (`uvx`, `python`, ...).
    Python,
    /// Anything else.
    Other,
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Node => "node",
            Self::Python => "python",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

const NODE_PROGRAMS: &[&str] = &["npx", "node", "npm", "bunx"];
const PYTHON_PROGRAMS: &[&str] = &["uvx", "uv", "python", "python3", "pipx"];

/// Classify a server by the command that launches it.
///
/// Unrecognised commands are [`RuntimeKind::Other`].
pub fn classify(command: &str) -> RuntimeKind {
    if command.contains("npx") {
        return RuntimeKind::Node;
    }
    if command.contains("uvx") {
        return RuntimeKind::Python;
    }

    let program = command.split_whitespace().next().unwrap_or_default();
    let program = Path::new(program)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(program);

    if NODE_PROGRAMS.contains(&program) {
        RuntimeKind::Node
    } else if PYTHON_PROGRAMS.contains(&program) {
        RuntimeKind::Python
    } else {
        RuntimeKind::Other
    }
}

/// Advertised metadata for one configured server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Server name.
    pub name: String,
    /// Launch command.
    pub command: String,
    /// Launch arguments.
    pub args: Vec<String>,
    /// Runtime classification of the command.
    #[serde(rename = "type")]
    pub kind: RuntimeKind,
    /// Human-readable description.
    pub description: Option<String>,
}

impl From<&ServerSpec> for ToolMetadata {
    fn from(spec: &ServerSpec) -> Self {
        Self {
            name: spec.name.clone(),
            command: spec.command.clone(),
            args: spec.arguments.clone(),
            kind: classify(&spec.command),
            description: spec.description.clone(),
        }
    }
}

/// Metadata for every configured server, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    entries: Vec<ToolMetadata>,
}

impl ToolCatalog {
    /// Build a catalog from server specs.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a ServerSpec>) -> Self {
        Self {
            entries: specs.into_iter().map(ToolMetadata::from).collect(),
        }
    }

    /// All entries, in configuration order.
    pub fn all(&self) -> &[ToolMetadata] {
        &self.entries
    }

    /// Look up an entry by server name.
    pub fn get(&self, name: &str) -> Option<&ToolMetadata> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Whether a server with this name is configured.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Entries of one runtime kind.
    pub fn of_kind(&self, kind: RuntimeKind) -> impl Iterator<Item = &ToolMetadata> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
