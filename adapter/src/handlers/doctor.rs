//! `doctor` command handler
//!
//! Reports which runtimes are available and which configured servers are
//! installed.

use anyhow::{Context, Result};

use crate::config::{is_installed, AdapterConfig};
use crate::runtime::SystemDetector;

fn status(passed: bool) -> &'static str {
    if passed {
        "✓"
    } else {
        "✗"
    }
}

/// Handle the `doctor` command
pub async fn run_doctor(config: &AdapterConfig) -> Result<()> {
    config
        .ensure_dirs()
        .context("failed to prepare the adapter directories")?;

    println!("=== Runtimes ===\n");
    for (name, result) in SystemDetector::new().check_all().await {
        match result {
            Ok(runtime) => println!(
                "{} {:<8} {:<10} {}",
                status(true),
                name,
                runtime.version,
                runtime.path.display()
            ),
            Err(e) => println!("{} {:<8} {}", status(false), name, e),
        }
    }

    println!("\n=== Servers ({}) ===\n", config.servers_dir.display());
    if config.servers.is_empty() {
        println!("No servers configured.");
        return Ok(());
    }

    let mut names: Vec<_> = config.servers.keys().collect();
    names.sort();
    for name in names {
        let installed = is_installed(&config.server_install_path(name));
        let server = &config.servers[name];
        println!(
            "{} {:<20} {:<7} {}",
            status(installed),
            name,
            server.server_type.to_string(),
            if installed { "installed" } else { "not installed" }
        );
    }

    Ok(())
}
