use std::time::Duration;

use serde::Serialize;

use crate::worker::{CommandCompletion, CompletionStatus};

/// Read-only counters exposed by [`ConsoleController::stats`](crate::ConsoleController::stats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleStats {
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub spawn_failures: u64,
    /// Records appended over the console's lifetime, evicted ones included.
    pub total_output_lines: u64,
    /// Records currently held in the scrollback.
    pub retained_output_lines: usize,
    pub history_entries: usize,
    pub queued: usize,
    pub running_processes: usize,
    pub last_command_duration_ms: Option<u64>,
}

impl ConsoleStats {
    #[must_use]
    pub fn last_command_duration(&self) -> Option<Duration> {
        self.last_command_duration_ms.map(Duration::from_millis)
    }
}

/// Command counters owned by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CommandCounters {
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub spawn_failures: u64,
    pub last_command_duration: Option<Duration>,
}

impl CommandCounters {
    pub(crate) fn record(&mut self, completion: &CommandCompletion) {
        self.executed += 1;
        if completion.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        match completion.status {
            CompletionStatus::TimedOut => self.timed_out += 1,
            CompletionStatus::SpawnFailed => self.spawn_failures += 1,
            CompletionStatus::Builtin | CompletionStatus::Exited(_) => {}
        }
        self.last_command_duration = Some(completion.duration);
    }

    pub(crate) fn fill(&self, stats: &mut ConsoleStats) {
        stats.executed = self.executed;
        stats.succeeded = self.succeeded;
        stats.failed = self.failed;
        stats.timed_out = self.timed_out;
        stats.spawn_failures = self.spawn_failures;
        stats.last_command_duration_ms = self
            .last_command_duration
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn completion(status: CompletionStatus, success: bool) -> CommandCompletion {
        CommandCompletion {
            id: 1,
            command: "x".to_string(),
            working_directory: PathBuf::from("/"),
            status,
            success,
            duration: Duration::from_millis(12),
            records: Vec::new(),
        }
    }

    #[test]
    fn counts_successes_and_failure_kinds() {
        let mut counters = CommandCounters::default();
        counters.record(&completion(CompletionStatus::Builtin, true));
        counters.record(&completion(CompletionStatus::Exited(Some(1)), false));
        counters.record(&completion(CompletionStatus::TimedOut, false));
        counters.record(&completion(CompletionStatus::SpawnFailed, false));

        let mut stats = ConsoleStats::default();
        counters.fill(&mut stats);
        assert_eq!(stats.executed, 4);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.spawn_failures, 1);
        assert_eq!(stats.last_command_duration(), Some(Duration::from_millis(12)));
    }

    #[test]
    fn stats_serialize_as_flat_json() {
        let json = serde_json::to_value(ConsoleStats::default()).expect("serialize stats");
        assert_eq!(json["executed"], 0);
        assert!(json["last_command_duration_ms"].is_null());
    }
}
