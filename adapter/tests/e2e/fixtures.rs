//! Shared test fixtures

use std::path::Path;
use std::sync::Arc;

use mcp_adapter::config::AdapterConfig;
use mcp_adapter::launcher::Launcher;
use mcp_adapter::manifest::{ServerDescriptor, ServerType};
use mcp_adapter::runtime::SystemDetector;
use tempfile::TempDir;

/// A temporary adapter home with shell-backed servers
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> AdapterConfig {
        AdapterConfig::new(self.path())
    }

    /// Binary servers need no runtime, so the system detector is enough
    pub fn launcher(&self) -> Launcher {
        Launcher::new(self.config(), Arc::new(SystemDetector::new()))
    }

    /// Install `name` as `/bin/sh -c <script>`
    pub fn install(&self, name: &str, script: &str) -> ServerDescriptor {
        let install = self.path().join("servers").join(name);
        std::fs::create_dir_all(&install).unwrap();
        std::os::unix::fs::symlink("/bin/sh", install.join("server")).unwrap();

        let mut server = ServerDescriptor::new(name, ServerType::Binary, "server");
        server.args = vec!["-c".into(), script.into()];
        server
    }
}

/// Loops until SIGTERM, then exits with `code`
pub fn graceful_script(code: i32) -> String {
    format!("trap 'exit {code}' TERM; while :; do sleep 0.05; done")
}

/// Ignores SIGTERM entirely
pub const STUBBORN_SCRIPT: &str = "trap '' TERM; while :; do sleep 0.05; done";
