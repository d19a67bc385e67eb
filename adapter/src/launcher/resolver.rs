//! Command resolution
//!
//! Turns a server descriptor plus its install directory into the concrete
//! program, arguments, environment and working directory to execute.

use std::collections::{BTreeMap, HashMap};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::manifest::{ServerDescriptor, ServerType};
use crate::runtime::Runtime;

use super::error::{LaunchError, LaunchResult};

/// A ready-to-execute command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Kept as `OsString` so non-UTF-8 ambient variables pass through
    pub env: BTreeMap<OsString, OsString>,
    pub working_dir: PathBuf,
}

/// Candidate entrypoint locations for a server, in priority order
pub fn candidates(server: &ServerDescriptor, install_dir: &Path) -> Vec<PathBuf> {
    let entry = &server.entrypoint;
    match server.server_type {
        ServerType::Node => {
            let node_modules = install_dir.join("node_modules");
            let mut dist = node_modules.clone();
            if let Some(package) = &server.package {
                dist.push(package);
            }
            vec![
                node_modules.join(".bin").join(entry),
                dist.join("dist").join(format!("{}.js", entry)),
            ]
        }
        ServerType::Python => {
            let venv = install_dir.join("venv");
            let mut paths = vec![venv.join("bin").join(entry)];
            if cfg!(windows) {
                paths.push(venv.join("Scripts").join(format!("{}.exe", entry)));
            }
            paths
        }
        ServerType::Binary => vec![install_dir.join(entry)],
    }
}

fn is_script(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("js" | "mjs" | "cjs")
    )
}

/// Resolve the entrypoint and assemble the full command.
///
/// Arguments are the descriptor defaults followed by `extra_args`.
/// The environment is the ambient process environment, overlaid with the
/// descriptor's env, overlaid with `extra_env`; later entries win.
/// Descriptor values are literal unless the descriptor sets `expand_env`.
pub fn resolve(
    server: &ServerDescriptor,
    install_dir: &Path,
    runtime: &Runtime,
    extra_args: &[String],
    extra_env: &HashMap<String, String>,
) -> LaunchResult<LaunchSpec> {
    let tried = candidates(server, install_dir);
    let entrypoint = tried
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or_else(|| LaunchError::EntrypointNotFound {
            server: server.name.clone(),
            tried: tried.clone(),
        })?;

    let mut args: Vec<String> = server.args.iter().chain(extra_args).cloned().collect();

    let program = if server.server_type == ServerType::Node && is_script(&entrypoint) {
        args.insert(0, entrypoint.to_string_lossy().into_owned());
        runtime.path.clone()
    } else {
        entrypoint
    };

    Ok(LaunchSpec {
        program,
        args,
        env: build_env(std::env::vars_os(), server, extra_env),
        working_dir: install_dir.to_path_buf(),
    })
}

/// Overlay descriptor and caller environment on top of `ambient`
fn build_env(
    ambient: impl IntoIterator<Item = (OsString, OsString)>,
    server: &ServerDescriptor,
    overrides: &HashMap<String, String>,
) -> BTreeMap<OsString, OsString> {
    let mut env: BTreeMap<OsString, OsString> = ambient.into_iter().collect();

    // `$VAR` references resolve against the ambient environment only
    let defaults: Vec<(OsString, OsString)> = server
        .env
        .iter()
        .map(|(key, value)| {
            let value = if server.expand_env {
                shellexpand::env_with_context_no_errors(value, |name| {
                    env.get(OsStr::new(name)).and_then(|v| v.to_str())
                })
                .into_owned()
            } else {
                value.clone()
            };
            (OsString::from(key), OsString::from(value))
        })
        .collect();
    env.extend(defaults);

    for (key, value) in overrides {
        env.insert(OsString::from(key), OsString::from(value));
    }
    env
}
