use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {}", .errors.join("; "))]
    InvalidConfig { errors: Vec<String> },

    #[error("{command}: {message}")]
    UserInput { command: String, message: String },

    #[error("cd: {}: {reason}", .path.display())]
    DirectoryResolution { path: PathBuf, reason: String },

    #[error("failed to start '{command}': {reason}")]
    ProcessSpawn { command: String, reason: String },

    #[error("command timed out after {}ms: {command}", .timeout.as_millis())]
    ProcessTimeout { command: String, timeout: Duration },

    #[error("command queue is closed")]
    QueueClosed,

    #[error("failed to start console worker: {0}")]
    WorkerSpawn(std::io::Error),
}

impl ConsoleError {
    #[must_use]
    pub fn user_input(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UserInput {
            command: command.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn directory(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DirectoryResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code used by the `ftui-console` binary.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) | Self::Toml(_) | Self::Json(_) | Self::InvalidConfig { .. } => 2,
            _ => 1,
        }
    }
}
