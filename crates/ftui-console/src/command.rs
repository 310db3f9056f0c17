use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A command captured at submit time, consumed exactly once by the worker.
///
/// The working directory and environment are snapshots: a `cd` that runs
/// after this command was enqueued does not change where it executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub id: u64,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    pub working_directory: PathBuf,
    pub environment: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl PendingCommand {
    #[must_use]
    pub fn new(
        id: u64,
        text: impl Into<String>,
        working_directory: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            submitted_at: Utc::now(),
            working_directory: working_directory.into(),
            environment: BTreeMap::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// First whitespace-delimited token, the command's program or built-in name.
    pub fn program(&self) -> Option<&str> {
        self.text.split_whitespace().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_is_first_token() {
        let command = PendingCommand::new(1, "  cd  /tmp ", "/", Duration::from_secs(1));
        assert_eq!(command.program(), Some("cd"));
        assert_eq!(PendingCommand::new(2, "   ", "/", Duration::ZERO).program(), None);
    }
}
