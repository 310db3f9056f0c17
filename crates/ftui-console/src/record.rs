//! Scrollback records.
//!
//! An [`OutputRecord`] is one displayed line. Records are created by the
//! built-in dispatcher, the process runner, or the worker (command echoes)
//! and are never mutated once appended to the [`OutputLog`](crate::OutputLog).

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which channel a record was produced on. Renderers style `Stderr` as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    CommandEcho,
    Stdout,
    Stderr,
    Info,
}

impl StreamKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandEcho => "command_echo",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Info => "info",
        }
    }
}

/// A single immutable scrollback line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    content: String,
    timestamp: DateTime<Utc>,
    stream: StreamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
}

impl OutputRecord {
    #[must_use]
    pub fn new(stream: StreamKind, content: impl Into<String>, command: Option<&str>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
            stream,
            command: command.map(str::to_string),
        }
    }

    #[must_use]
    pub fn echo(prompt: &str, command: &str) -> Self {
        Self::new(
            StreamKind::CommandEcho,
            format!("{prompt}{command}"),
            Some(command),
        )
    }

    #[must_use]
    pub fn stdout(content: impl Into<String>, command: &str) -> Self {
        Self::new(StreamKind::Stdout, content, Some(command))
    }

    #[must_use]
    pub fn stderr(content: impl Into<String>, command: Option<&str>) -> Self {
        Self::new(StreamKind::Stderr, content, command)
    }

    #[must_use]
    pub fn info(content: impl Into<String>, command: Option<&str>) -> Self {
        Self::new(StreamKind::Info, content, command)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// The command text that produced this record, if any.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.stream == StreamKind::Stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_prefixes_prompt_and_keeps_command() {
        let record = OutputRecord::echo("$ ", "ls -la");
        assert_eq!(record.content(), "$ ls -la");
        assert_eq!(record.stream(), StreamKind::CommandEcho);
        assert_eq!(record.command(), Some("ls -la"));
    }

    #[test]
    fn stderr_records_are_errors() {
        assert!(OutputRecord::stderr("boom", None).is_error());
        assert!(!OutputRecord::info("fine", None).is_error());
    }

    #[test]
    fn serializes_stream_kind_in_snake_case() {
        let record = OutputRecord::echo("> ", "pwd");
        let json = serde_json::to_value(&record).expect("serialize record");
        assert_eq!(json["stream"], "command_echo");
        assert_eq!(json["command"], "pwd");

        let info = serde_json::to_value(OutputRecord::info("x", None)).expect("serialize info");
        assert!(info.get("command").is_none());
    }
}
