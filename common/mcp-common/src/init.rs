//! Tracing initialization
//!
//! Anything that relays the protocol over stdio must keep stdout clean, so
//! every subscriber built here writes to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, no ANSI colors
    #[default]
    Text,
    /// One JSON object per event, for log aggregation
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects JSON; anything else is text
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::Text,
        }
    }

    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` is honoured as usual; on top of it `<crate_name>=<level>` is
/// added as the default directive for the calling crate.
///
/// ```rust,ignore
/// mcp_common::init_tracing("mcp_adapter", "info")?;
/// ```
pub fn init_tracing(crate_name: &str, level: &str) -> anyhow::Result<()> {
    let directive = format!("{crate_name}={level}").parse()?;
    let filter = EnvFilter::from_default_env().add_directive(directive);
    let registry = tracing_subscriber::registry().with(filter);
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match LogFormat::from_env() {
        LogFormat::Json => registry.with(layer.json()).try_init()?,
        LogFormat::Text => registry.with(layer.with_ansi(false)).try_init()?,
    }
    Ok(())
}
