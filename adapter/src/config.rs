//! Configuration loading
//!
//! [`AdapterConfig`] is built explicitly and passed to whoever needs it.
//! There is no process-wide instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::manifest::ServerDescriptor;

/// Project-local config file name
const CONFIG_FILE: &str = ".mcp-adapter.toml";

/// Default time a server gets to exit after the graceful signal
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/mcp-adapter/config.toml
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("mcp-adapter").join("config.toml");
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

/// On-disk shape of the config file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    adapter: AdapterSection,
    #[serde(default)]
    servers: HashMap<String, ServerDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
struct AdapterSection {
    base_dir: Option<PathBuf>,
    servers_dir: Option<PathBuf>,
    stop_timeout_secs: Option<u64>,
    log_level: Option<String>,
}

/// Resolved adapter configuration
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Root directory for adapter data
    pub base_dir: PathBuf,
    /// Where servers are installed, one directory per server name
    pub servers_dir: PathBuf,
    /// Graceful stop deadline before a forced kill
    pub stop_timeout: Duration,
    pub log_level: String,
    /// Known servers keyed by name
    pub servers: HashMap<String, ServerDescriptor>,
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".mcp-adapter")
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::new(default_base_dir())
    }
}

impl AdapterConfig {
    /// Create a config rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            servers_dir: base_dir.join("servers"),
            base_dir,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            log_level: "info".to_string(),
            servers: HashMap::new(),
        }
    }

    /// Load config from .mcp-adapter.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .mcp-adapter.toml
    /// 2. Check ~/.config/mcp-adapter/config.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(config_path) = find_config_file() {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;

        let base_dir = file
            .adapter
            .base_dir
            .map(|p| expand_path(&p))
            .unwrap_or_else(default_base_dir);
        let mut config = Self::new(base_dir);
        if let Some(servers_dir) = file.adapter.servers_dir {
            config.servers_dir = expand_path(&servers_dir);
        }
        if let Some(secs) = file.adapter.stop_timeout_secs {
            config.stop_timeout = Duration::from_secs(secs);
        }
        if let Some(level) = file.adapter.log_level {
            config.log_level = level;
        }

        config.servers = file
            .servers
            .into_iter()
            .map(|(name, mut server)| {
                if server.name.is_empty() {
                    server.name = name.clone();
                }
                (name, server)
            })
            .collect();

        Ok(config)
    }

    /// Move the data root, keeping everything else
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = expand_path(&base_dir.into());
        self.servers_dir = base_dir.join("servers");
        self.base_dir = base_dir;
        self
    }

    /// Look up a server descriptor by name
    pub fn server(&self, name: &str) -> Option<&ServerDescriptor> {
        self.servers.get(name)
    }

    /// Installation path for a given server
    pub fn server_install_path(&self, server_name: &str) -> PathBuf {
        self.servers_dir.join(server_name)
    }

    /// Create the base and servers directories if they don't exist
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.base_dir, &self.servers_dir] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Expand a leading `~` to the home directory
fn expand_path(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&text).into_owned())
}

/// A server counts as installed when its install directory exists
pub fn is_installed(install_dir: &Path) -> bool {
    install_dir.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ServerType;

    #[test]
    fn test_new_derives_servers_dir() {
        let config = AdapterConfig::new("/opt/adapter");
        assert_eq!(config.servers_dir, PathBuf::from("/opt/adapter/servers"));
        assert_eq!(
            config.server_install_path("git"),
            PathBuf::from("/opt/adapter/servers/git")
        );
        assert_eq!(config.stop_timeout, DEFAULT_STOP_TIMEOUT);
    }

    #[test]
    fn test_with_base_dir_moves_servers_dir() {
        let mut config = AdapterConfig::new("/opt/adapter");
        config.stop_timeout = Duration::from_secs(2);
        let config = config.with_base_dir("/srv/other");
        assert_eq!(config.servers_dir, PathBuf::from("/srv/other/servers"));
        assert_eq!(config.stop_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_tilde_is_expanded() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let config = AdapterConfig::from_toml("[adapter]\nbase_dir = \"~/mcp\"\n").unwrap();
        assert_eq!(config.base_dir, home.join("mcp"));
    }

    #[test]
    fn test_from_toml() {
        let config = AdapterConfig::from_toml(
            r#"
            [adapter]
            base_dir = "/srv/mcp"
            stop_timeout_secs = 3
            log_level = "debug"

            [servers.git]
            type = "python"
            entrypoint = "mcp-server-git"

            [servers.fetch]
            name = "fetch"
            type = "node"
            entrypoint = "mcp-fetch"
            package = "@acme/mcp-fetch"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_dir, PathBuf::from("/srv/mcp"));
        assert_eq!(config.servers_dir, PathBuf::from("/srv/mcp/servers"));
        assert_eq!(config.stop_timeout, Duration::from_secs(3));
        assert_eq!(config.log_level, "debug");

        let git = config.server("git").unwrap();
        assert_eq!(git.name, "git");
        assert_eq!(git.server_type, ServerType::Python);

        let fetch = config.server("fetch").unwrap();
        assert_eq!(fetch.package.as_deref(), Some("@acme/mcp-fetch"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AdapterConfig::from_toml("").unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[servers.bad]\ntype = 12\n").unwrap();
        assert!(matches!(
            AdapterConfig::load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_ensure_dirs_and_is_installed() {
        let dir = tempfile::tempdir().unwrap();
        let config = AdapterConfig::new(dir.path().join("base"));
        config.ensure_dirs().unwrap();
        assert!(config.servers_dir.is_dir());
        assert!(!is_installed(&config.server_install_path("git")));
        std::fs::create_dir(config.server_install_path("git")).unwrap();
        assert!(is_installed(&config.server_install_path("git")));
    }
}
