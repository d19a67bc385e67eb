//! CLI argument definitions

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mcp-adapter")]
#[command(about = "Launch installed MCP servers and relay their stdio traffic")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: nearest .mcp-adapter.toml, then the global config)
    #[arg(long, env = "MCP_ADAPTER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Adapter data directory; servers are looked up in <DIR>/servers
    #[arg(long, env = "MCP_ADAPTER_HOME", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Explicit log level; overrides -v and the config file
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Effective log level given the config file's default
    pub fn log_level(&self, configured: &str) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        match self.verbose {
            0 => configured.to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch a server and relay stdin/stdout to it
    Run(RunArgs),
    /// Show detected runtimes and installed servers
    Doctor,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Server name as configured
    pub server: String,

    /// Extra argument for the server (repeatable)
    #[arg(short = 'a', long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Environment override KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Don't relay JSON-RPC; let the server inherit stdout/stderr
    #[arg(long)]
    pub no_stdio: bool,

    /// Arguments after `--` are passed through to the server
    #[arg(last = true)]
    pub extra: Vec<String>,
}

impl RunArgs {
    /// `-a` arguments followed by everything after `--`
    pub fn server_args(&self) -> Vec<String> {
        self.args.iter().chain(&self.extra).cloned().collect()
    }
}
