#![forbid(unsafe_code)]

use mural_runtime::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("logging setup failed: {message}")]
    Logging { message: String },
}

impl NodeError {
    /// Process exit status: 2 for unusable configuration, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Io(_) | Self::Logging { .. } => 1,
        }
    }
}
