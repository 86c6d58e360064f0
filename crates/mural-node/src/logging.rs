#![forbid(unsafe_code)]

//! Global `tracing` subscriber for the node process.

use tracing_subscriber::EnvFilter;

use crate::error::{NodeError, Result};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "MURAL_LOG";

/// Filter from `MURAL_LOG`, `info` when unset or unparsable.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the process-wide subscriber writing to stderr, as JSON lines when
/// `json` is set.
pub fn init(json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| NodeError::Logging {
        message: err.to_string(),
    })
}
