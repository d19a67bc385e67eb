//! Launching and supervising MCP server processes

pub mod error;
pub mod process;
pub mod resolver;
pub mod supervisor;

pub use error::{ErrorKind, LaunchError, LaunchResult};
pub use process::{ManagedProcess, ProcessStatus, State};
pub use resolver::{resolve, LaunchSpec};
pub use supervisor::{LaunchOptions, Launcher};
