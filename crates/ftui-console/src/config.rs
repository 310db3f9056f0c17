//! Console configuration.
//!
//! [`ConsoleConfig`] can be built in code or loaded from TOML or JSON. Every
//! field has a default, so a file only needs the keys it changes:
//!
//! ```toml
//! # ftui-console.toml
//! prompt = "> "
//! max_output_lines = 5000
//! command_timeout_ms = 10000
//!
//! [environment]
//! RUST_BACKTRACE = "1"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};

pub const DEFAULT_MAX_OUTPUT_LINES: usize = 1000;
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 500;
pub const DEFAULT_PROMPT: &str = "$ ";
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[cfg(windows)]
pub const DEFAULT_SHELL: &str = "cmd";
#[cfg(not(windows))]
pub const DEFAULT_SHELL: &str = "sh";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Starting working directory. Defaults to the process's current directory.
    pub initial_directory: Option<PathBuf>,

    /// Scrollback capacity in records.
    pub max_output_lines: usize,

    /// History capacity in entries.
    pub max_history_size: usize,

    /// Prefix for command echoes and the rendered input line.
    pub prompt: String,

    /// Per-command timeout for external processes.
    pub command_timeout_ms: u64,

    /// How long the worker waits on an empty queue before re-checking its
    /// stop flag.
    pub poll_interval_ms: u64,

    /// Shell used to interpret external commands.
    pub shell: String,

    /// Variables added to every external process's environment.
    pub environment: BTreeMap<String, String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            initial_directory: None,
            max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            prompt: DEFAULT_PROMPT.to_string(),
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            shell: DEFAULT_SHELL.to_string(),
            environment: BTreeMap::new(),
        }
    }
}

impl ConsoleConfig {
    /// Config with the four initialization parameters set and defaults elsewhere.
    #[must_use]
    pub fn new(
        initial_directory: impl Into<PathBuf>,
        max_output_lines: usize,
        max_history_size: usize,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            initial_directory: Some(initial_directory.into()),
            max_output_lines,
            max_history_size,
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load from a file, choosing JSON for `.json` and TOML otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_toml_file(path)
        }
    }

    /// Check every parameter. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_output_lines == 0 {
            errors.push("max_output_lines must be at least 1".to_string());
        }
        if self.max_history_size == 0 {
            errors.push("max_history_size must be at least 1".to_string());
        }
        if self.command_timeout_ms == 0 {
            errors.push("command_timeout_ms must be greater than 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be greater than 0".to_string());
        }
        if self.shell.trim().is_empty() {
            errors.push("shell must not be empty".to_string());
        }
        if let Some(dir) = &self.initial_directory
            && !dir.is_dir()
        {
            errors.push(format!(
                "initial_directory {} is not a directory",
                dir.display()
            ));
        }
        errors
    }

    /// [`validate`](Self::validate) as a `Result`.
    pub fn validated(self) -> Result<Self> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConsoleError::InvalidConfig { errors })
        }
    }
}
