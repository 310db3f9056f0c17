//! The single command worker.
//!
//! One background thread pops [`PendingCommand`]s in FIFO order and runs each
//! to completion before taking the next, so commands never overlap. All
//! state the worker shares with the controller lives in [`ConsoleShared`].
//!
//! # Per-command sequence
//!
//! 1. Echo `prompt + text` into the scrollback.
//! 2. Try the built-in dispatcher against the command's directory snapshot.
//! 3. Otherwise run the text through the [`ProcessRunner`].
//! 4. Append the resulting records, apply `cd`/`clear` side effects.
//! 5. Update counters and fire completion hooks.
//!
//! Hook panics are caught and logged; nothing escapes to stop the loop.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::builtins::BuiltinDispatcher;
use crate::command::PendingCommand;
use crate::error::ConsoleError;
use crate::history::HistoryLog;
use crate::output_log::OutputLog;
use crate::process::{ExecutionOutcome, ProcessRunner, ProcessTable};
use crate::queue::CommandQueue;
use crate::record::OutputRecord;
use crate::stats::CommandCounters;

/// How a finished command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Handled in-process by a built-in.
    Builtin,
    /// External process exited; `None` when ended by a signal.
    Exited(Option<i32>),
    TimedOut,
    SpawnFailed,
}

/// Everything a completion hook learns about a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompletion {
    pub id: u64,
    pub command: String,
    /// The snapshot the command ran in, not the console's directory afterwards.
    pub working_directory: PathBuf,
    pub status: CompletionStatus,
    pub success: bool,
    pub duration: Duration,
    /// Records the command produced, echo first.
    pub records: Vec<OutputRecord>,
}

/// Coarse lifecycle of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleState {
    /// Nothing queued and nothing running.
    Idle,
    /// Commands are queued but the worker has not picked one up.
    Submitting,
    /// The worker is executing a command.
    Executing,
}

pub(crate) type DirectoryHook = Arc<dyn Fn(&Path) + Send + Sync>;
pub(crate) type CompletionHook = Arc<dyn Fn(&CommandCompletion) + Send + Sync>;

#[derive(Debug, Default)]
struct ActivityInner {
    queued: usize,
    executing: bool,
}

/// Queued/executing counts with a condition variable for idle waits.
#[derive(Debug, Default)]
pub(crate) struct Activity {
    inner: Mutex<ActivityInner>,
    changed: Condvar,
}

impl Activity {
    fn lock(&self) -> MutexGuard<'_, ActivityInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count a command about to be pushed. Must precede the push so the
    /// worker's `begin` never runs first.
    pub(crate) fn enqueued(&self) {
        self.lock().queued += 1;
    }

    /// Undo `enqueued` for a push that failed or a command that was dropped.
    pub(crate) fn withdrawn(&self, count: usize) {
        let mut inner = self.lock();
        inner.queued = inner.queued.saturating_sub(count);
        drop(inner);
        self.changed.notify_all();
    }

    fn begin(&self) {
        let mut inner = self.lock();
        inner.queued = inner.queued.saturating_sub(1);
        inner.executing = true;
        drop(inner);
        self.changed.notify_all();
    }

    fn finish(&self) {
        self.lock().executing = false;
        self.changed.notify_all();
    }

    pub(crate) fn state(&self) -> ConsoleState {
        let inner = self.lock();
        if inner.executing {
            ConsoleState::Executing
        } else if inner.queued > 0 {
            ConsoleState::Submitting
        } else {
            ConsoleState::Idle
        }
    }

    /// Block until idle or until `timeout` elapses. Returns `true` when idle.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut inner = self.lock();
        while inner.executing || inner.queued > 0 {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return false;
            }
            let (guard, _) = self
                .changed
                .wait_timeout(inner, timeout - elapsed)
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
        }
        true
    }
}

/// State shared by the controller and the worker thread.
pub(crate) struct ConsoleShared {
    pub queue: CommandQueue,
    pub output: OutputLog,
    pub history: Mutex<HistoryLog>,
    pub directory: RwLock<PathBuf>,
    pub environment: RwLock<BTreeMap<String, String>>,
    pub counters: Mutex<CommandCounters>,
    pub activity: Activity,
    pub processes: Arc<ProcessTable>,
    pub running: AtomicBool,
    pub prompt: String,
    directory_hooks: Mutex<Vec<DirectoryHook>>,
    completion_hooks: Mutex<Vec<CompletionHook>>,
}

impl ConsoleShared {
    pub(crate) fn new(
        directory: PathBuf,
        environment: BTreeMap<String, String>,
        max_output_lines: usize,
        max_history_size: usize,
        prompt: String,
    ) -> Self {
        Self {
            queue: CommandQueue::new(),
            output: OutputLog::new(max_output_lines),
            history: Mutex::new(HistoryLog::new(max_history_size)),
            directory: RwLock::new(directory),
            environment: RwLock::new(environment),
            counters: Mutex::new(CommandCounters::default()),
            activity: Activity::default(),
            processes: Arc::new(ProcessTable::new()),
            running: AtomicBool::new(true),
            prompt,
            directory_hooks: Mutex::new(Vec::new()),
            completion_hooks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn history(&self) -> MutexGuard<'_, HistoryLog> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn counters(&self) -> MutexGuard<'_, CommandCounters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn directory(&self) -> PathBuf {
        self.directory
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_directory(&self, path: PathBuf) {
        *self.directory.write().unwrap_or_else(|e| e.into_inner()) = path;
    }

    pub(crate) fn environment(&self) -> BTreeMap<String, String> {
        self.environment
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn update_environment(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) {
        f(&mut self.environment.write().unwrap_or_else(|e| e.into_inner()));
    }

    pub(crate) fn add_directory_hook(&self, hook: DirectoryHook) {
        self.directory_hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(hook);
    }

    pub(crate) fn add_completion_hook(&self, hook: CompletionHook) {
        self.completion_hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(hook);
    }

    fn notify_directory(&self, path: &Path) {
        // Clone out so a hook may register further hooks.
        let hooks = self
            .directory_hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for hook in hooks {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(path))).is_err() {
                warn!(path = %path.display(), "directory hook panicked");
            }
        }
    }

    fn notify_completion(&self, completion: &CommandCompletion) {
        let hooks = self
            .completion_hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for hook in hooks {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(completion))).is_err() {
                warn!(id = completion.id, "completion hook panicked");
            }
        }
    }
}

pub(crate) struct Worker {
    shared: Arc<ConsoleShared>,
    dispatcher: BuiltinDispatcher,
    runner: ProcessRunner,
    poll_interval: Duration,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<ConsoleShared>,
        dispatcher: BuiltinDispatcher,
        shell: String,
        poll_interval: Duration,
    ) -> Self {
        // A command can never show more lines than the scrollback holds.
        let runner = ProcessRunner::with_table(shell, Arc::clone(&shared.processes))
            .with_line_limit(shared.output.max_lines());
        Self {
            shared,
            dispatcher,
            runner,
            poll_interval,
        }
    }

    pub(crate) fn run(self) {
        info!(shell = self.runner.shell(), "console worker started");
        while self.shared.running.load(Ordering::Acquire) {
            match self.shared.queue.pop(self.poll_interval) {
                Ok(Some(command)) => {
                    if !self.shared.running.load(Ordering::Acquire) {
                        self.shared.activity.withdrawn(1);
                        break;
                    }
                    self.execute(command);
                }
                Ok(None) => {}
                Err(ConsoleError::QueueClosed) => break,
                Err(error) => warn!(%error, "command queue failure"),
            }
        }

        let killed = self.shared.processes.terminate_all();
        if killed > 0 {
            warn!(killed, "terminated processes left at worker exit");
        }
        info!("console worker stopped");
    }

    fn execute(&self, command: PendingCommand) {
        self.shared.activity.begin();
        let started = Instant::now();
        debug!(
            id = command.id,
            program = command.program().unwrap_or_default(),
            command = %command.text,
            cwd = %command.working_directory.display(),
            "executing command"
        );

        let echo = OutputRecord::echo(&self.shared.prompt, &command.text);
        self.shared.output.append(echo.clone());

        let history = self.shared.history().all();
        let (status, success, records) = match self.dispatcher.try_handle(
            &command.text,
            &command.working_directory,
            &history,
        ) {
            Some(outcome) => {
                if outcome.clears_log {
                    self.shared.output.replace_with(outcome.records.iter().cloned());
                } else {
                    self.shared.output.extend(outcome.records.iter().cloned());
                }
                if let Some(new_directory) = outcome.new_directory {
                    info!(directory = %new_directory.display(), "working directory changed");
                    self.shared.set_directory(new_directory.clone());
                    self.shared.notify_directory(&new_directory);
                }
                (CompletionStatus::Builtin, !outcome.failed, outcome.records)
            }
            None => {
                let outcome = self.runner.run(&command);
                let records = outcome.records(&command.text);
                self.shared.output.extend(records.iter().cloned());
                let status = match &outcome {
                    ExecutionOutcome::Completed { exit_code, .. } => {
                        CompletionStatus::Exited(*exit_code)
                    }
                    ExecutionOutcome::TimedOut { .. } => CompletionStatus::TimedOut,
                    ExecutionOutcome::SpawnFailed { .. } => CompletionStatus::SpawnFailed,
                };
                (status, outcome.succeeded(), records)
            }
        };

        let mut all_records = Vec::with_capacity(records.len() + 1);
        all_records.push(echo);
        all_records.extend(records);

        let completion = CommandCompletion {
            id: command.id,
            command: command.text,
            working_directory: command.working_directory,
            status,
            success,
            duration: started.elapsed(),
            records: all_records,
        };
        debug!(
            id = completion.id,
            status = ?completion.status,
            success = completion.success,
            elapsed_ms = u64::try_from(completion.duration.as_millis()).unwrap_or(u64::MAX),
            "command finished"
        );

        self.shared.counters().record(&completion);
        self.shared.notify_completion(&completion);
        self.shared.activity.finish();
    }
}
