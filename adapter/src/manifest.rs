//! Server descriptors
//!
//! A descriptor says how an installed MCP server is invoked. Descriptors
//! come from the configuration file and are only ever read here.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::launcher::LaunchError;

/// How the server executable is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Node,
    Python,
    Binary,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerType::Node => write!(f, "node"),
            ServerType::Python => write!(f, "python"),
            ServerType::Binary => write!(f, "binary"),
        }
    }
}

/// MCP transport spoken by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

/// Runtime version constraints, one per interpreted server type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeRequirements {
    pub node: Option<String>,
    pub python: Option<String>,
}

impl RuntimeRequirements {
    /// Constraint that applies to the given server type (empty if none)
    pub fn constraint_for(&self, server_type: ServerType) -> &str {
        let constraint = match server_type {
            ServerType::Node => self.node.as_deref(),
            ServerType::Python => self.python.as_deref(),
            ServerType::Binary => None,
        };
        constraint.unwrap_or("")
    }
}

/// A server definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Unique key; filled from the config table name when omitted
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    #[serde(default)]
    pub transport: TransportKind,
    /// Executable or script name inside the install directory
    pub entrypoint: String,
    /// Package directory name under `node_modules` (node servers)
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Expand `$VAR` references in `env` values against the ambient environment
    #[serde(default)]
    pub expand_env: bool,
    #[serde(default)]
    pub runtime: RuntimeRequirements,
}

impl ServerDescriptor {
    pub fn new(
        name: impl Into<String>,
        server_type: ServerType,
        entrypoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            server_type,
            transport: TransportKind::Stdio,
            entrypoint: entrypoint.into(),
            package: None,
            args: Vec::new(),
            env: HashMap::new(),
            expand_env: false,
            runtime: RuntimeRequirements::default(),
        }
    }

    /// Reject descriptors that cannot be launched safely
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.name.trim().is_empty() {
            return Err(LaunchError::Validation("server name is required".to_string()));
        }
        // The name doubles as the install directory name
        if self.name == ".." || self.name.contains('/') || self.name.contains('\\') {
            return Err(LaunchError::Validation(format!(
                "server name '{}' must be a plain directory name",
                self.name
            )));
        }
        if self.entrypoint.is_empty() {
            return Err(LaunchError::Validation(format!(
                "entrypoint is required for server '{}'",
                self.name
            )));
        }
        if self.entrypoint.contains("..")
            || self.entrypoint.contains('/')
            || self.entrypoint.contains('\\')
        {
            return Err(LaunchError::Validation(format!(
                "entrypoint '{}' for server '{}' must be a plain file name",
                self.entrypoint, self.name
            )));
        }
        Ok(())
    }

    /// Version constraint for this server's own runtime
    pub fn runtime_constraint(&self) -> &str {
        self.runtime.constraint_for(self.server_type)
    }
}
