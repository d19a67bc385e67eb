//! Runtime detection
//!
//! Finds the interpreter a server type needs (node, python) and reports its
//! version, so the launcher can check it against the server's constraint.

pub mod version;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::manifest::ServerType;

pub use version::{parse_version_components, satisfies};

/// A detected runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    pub name: String,
    /// Absolute path of the executable; empty for native binaries
    pub path: PathBuf,
    pub version: String,
}

impl Runtime {
    /// The pseudo-runtime for servers that are native executables
    pub fn binary() -> Self {
        Self {
            name: "binary".to_string(),
            path: PathBuf::new(),
            version: String::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("{0} not found in PATH")]
    NotFound(String),

    #[error("failed to get {name} version: {reason}")]
    VersionQuery { name: String, reason: String },
}

/// Detects the runtime a server type needs
#[async_trait]
pub trait RuntimeDetector: Send + Sync {
    async fn detect(&self, server_type: ServerType) -> Result<Runtime, DetectError>;
}

/// Detector backed by the real PATH
#[derive(Debug, Default, Clone)]
pub struct SystemDetector;

impl SystemDetector {
    pub fn new() -> Self {
        Self
    }

    pub async fn detect_node(&self) -> Result<Runtime, DetectError> {
        let path = which::which("node").map_err(|_| DetectError::NotFound("node".to_string()))?;
        let output = query_version("node", &path).await?;
        Ok(Runtime {
            name: "node".to_string(),
            path,
            version: output.trim().trim_start_matches('v').to_string(),
        })
    }

    pub async fn detect_npm(&self) -> Result<Runtime, DetectError> {
        let path = which::which("npm").map_err(|_| DetectError::NotFound("npm".to_string()))?;
        let output = query_version("npm", &path).await?;
        Ok(Runtime {
            name: "npm".to_string(),
            path,
            version: output.trim().to_string(),
        })
    }

    /// Tries `python3` first, then `python`
    pub async fn detect_python(&self) -> Result<Runtime, DetectError> {
        for name in ["python3", "python"] {
            let Ok(path) = which::which(name) else {
                continue;
            };
            let Ok(output) = query_version(name, &path).await else {
                continue;
            };
            // "Python 3.x.y"
            return Ok(Runtime {
                name: "python".to_string(),
                path,
                version: output.trim().trim_start_matches("Python ").to_string(),
            });
        }
        Err(DetectError::NotFound("python".to_string()))
    }

    /// Tries `pip3` first, then `pip`
    pub async fn detect_pip(&self) -> Result<Runtime, DetectError> {
        for name in ["pip3", "pip"] {
            let Ok(path) = which::which(name) else {
                continue;
            };
            let Ok(output) = query_version(name, &path).await else {
                continue;
            };
            // "pip 23.0 from /usr/lib/python3/dist-packages/pip (python 3.11)"
            if let Some(version) = output.split_whitespace().nth(1) {
                return Ok(Runtime {
                    name: "pip".to_string(),
                    path,
                    version: version.to_string(),
                });
            }
        }
        Err(DetectError::NotFound("pip".to_string()))
    }

    /// Status of every runtime a server might need, in a fixed order
    pub async fn check_all(&self) -> Vec<(&'static str, Result<Runtime, DetectError>)> {
        vec![
            ("node", self.detect_node().await),
            ("npm", self.detect_npm().await),
            ("python", self.detect_python().await),
            ("pip", self.detect_pip().await),
        ]
    }
}

#[async_trait]
impl RuntimeDetector for SystemDetector {
    async fn detect(&self, server_type: ServerType) -> Result<Runtime, DetectError> {
        match server_type {
            ServerType::Node => self.detect_node().await,
            ServerType::Python => self.detect_python().await,
            ServerType::Binary => Ok(Runtime::binary()),
        }
    }
}

/// Run `<path> --version` and return its stdout (stderr when stdout is empty)
async fn query_version(name: &str, path: &Path) -> Result<String, DetectError> {
    let output = Command::new(path)
        .arg("--version")
        .output()
        .await
        .map_err(|e| DetectError::VersionQuery {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(DetectError::VersionQuery {
            name: name.to_string(),
            reason: format!("exited with {}", output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        // Python 2 prints its version on stderr
        return Ok(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    Ok(stdout)
}
