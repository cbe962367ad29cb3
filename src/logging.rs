//! Tracing subscriber setup for applications embedding the keyring

use crate::{Error, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global subscriber.
///
/// `verbose` forces `debug`; otherwise `RUST_LOG` applies, falling back to
/// `info`. Fails if a subscriber is already installed.
pub fn init_logging(verbose: bool, format: LogFormat) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    result.map_err(|e| Error::Logging(e.to_string()))
}
