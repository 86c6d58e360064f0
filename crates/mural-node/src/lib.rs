#![forbid(unsafe_code)]

//! Process wiring for the `mural` binary.
//!
//! Parses the command line, installs logging, binds the node's sockets, and
//! runs a [`mural_runtime::Node`] until SIGINT or SIGTERM.

pub mod cli;
pub mod error;
pub mod logging;
#[cfg(unix)]
pub mod signals;

pub use cli::run_from_env;
pub use error::{NodeError, Result};
