//! The console's public face.
//!
//! [`ConsoleController`] owns the line editor, the shared scrollback and
//! history, and the single worker thread. Every method takes `&self`, so a
//! controller can be wrapped in an `Arc` and driven from several threads: the
//! interactive thread feeds keystrokes while other collaborators inject
//! commands with [`execute_command`](ConsoleController::execute_command).
//!
//! # State machine
//!
//! ```text
//!   Idle ──Enter/execute_command──▶ Submitting ──worker pops──▶ Executing
//!    ▲                                                              │
//!    └──────────────────── output appended ◀────────────────────────┘
//! ```
//!
//! Keystrokes never block on `Executing`; they only touch the editor and
//! the history.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ftui_console::{ConsoleConfig, ConsoleController, KeyInput};
//!
//! let console = ConsoleController::initialize(ConsoleConfig::new("/tmp", 1000, 500, "$ "))?;
//! for key in KeyInput::typed("pwd") {
//!     console.handle_key(key);
//! }
//! console.handle_key(KeyInput::Enter);
//! console.wait_idle(Duration::from_secs(5));
//! for record in console.output_snapshot(None) {
//!     println!("{}", record.content());
//! }
//! # Ok::<(), ftui_console::ConsoleError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::builtins::BuiltinDispatcher;
use crate::command::PendingCommand;
use crate::config::ConsoleConfig;
use crate::edit::EditState;
use crate::error::{ConsoleError, Result};
use crate::history::Direction;
use crate::key::{KeyInput, KeyOutcome};
use crate::process::ProcessHandle;
use crate::record::OutputRecord;
use crate::stats::ConsoleStats;
use crate::worker::{CommandCompletion, ConsoleShared, ConsoleState, Worker};

/// How often shutdown re-checks the worker while reaping processes.
const SHUTDOWN_REAP_INTERVAL: Duration = Duration::from_millis(10);

pub struct ConsoleController {
    shared: Arc<ConsoleShared>,
    edit: Mutex<EditState>,
    next_id: AtomicU64,
    command_timeout: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ConsoleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleController")
            .field("directory", &self.shared.directory())
            .field("prompt", &self.shared.prompt)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConsoleController {
    /// Validate `config`, set up the console, and start the worker thread.
    pub fn initialize(config: ConsoleConfig) -> Result<Self> {
        Self::initialize_with(config, BuiltinDispatcher::new())
    }

    /// [`initialize`](Self::initialize) with an explicit built-in dispatcher,
    /// e.g. one with a fixed home directory.
    pub fn initialize_with(config: ConsoleConfig, dispatcher: BuiltinDispatcher) -> Result<Self> {
        let config = config.validated()?;
        let directory = match &config.initial_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        let shared = Arc::new(ConsoleShared::new(
            directory.clone(),
            config.environment.clone(),
            config.max_output_lines,
            config.max_history_size,
            config.prompt.clone(),
        ));

        let worker = Worker::new(
            Arc::clone(&shared),
            dispatcher,
            config.shell.clone(),
            config.poll_interval(),
        );
        let handle = thread::Builder::new()
            .name("ftui-console-worker".into())
            .spawn(move || worker.run())
            .map_err(ConsoleError::WorkerSpawn)?;

        info!(
            directory = %directory.display(),
            max_output_lines = config.max_output_lines,
            max_history_size = config.max_history_size,
            "console initialized"
        );

        Ok(Self {
            shared,
            edit: Mutex::new(EditState::new()),
            next_id: AtomicU64::new(1),
            command_timeout: config.command_timeout(),
            worker: Mutex::new(Some(handle)),
        })
    }

    fn edit(&self) -> MutexGuard<'_, EditState> {
        self.edit.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply one keystroke to the line editor.
    ///
    /// `Enter` with a non-blank line records it in history, clears the editor
    /// and enqueues the command; it returns without waiting for execution.
    pub fn handle_key(&self, key: KeyInput) -> KeyOutcome {
        let mut edit = self.edit();
        let changed = |applied: bool, outcome: KeyOutcome| {
            if applied { outcome } else { KeyOutcome::Ignored }
        };
        match key {
            KeyInput::Char(c) => changed(edit.insert(c), KeyOutcome::Edited),
            KeyInput::Backspace => changed(edit.backspace(), KeyOutcome::Edited),
            KeyInput::Delete => changed(edit.delete_forward(), KeyOutcome::Edited),
            KeyInput::Left => changed(edit.move_cursor(-1), KeyOutcome::CursorMoved),
            KeyInput::Right => changed(edit.move_cursor(1), KeyOutcome::CursorMoved),
            KeyInput::Home => changed(edit.move_to_start(), KeyOutcome::CursorMoved),
            KeyInput::End => changed(edit.move_to_end(), KeyOutcome::CursorMoved),
            KeyInput::Up => self.recall(&mut edit, Direction::Older),
            KeyInput::Down => self.recall(&mut edit, Direction::Newer),
            KeyInput::Enter => self.submit_line(&mut edit),
            KeyInput::Tab => KeyOutcome::Ignored,
        }
    }

    fn recall(&self, edit: &mut EditState, direction: Direction) -> KeyOutcome {
        // Down without an active recall would wipe the typed line.
        if direction == Direction::Newer && edit.history_cursor().is_none() {
            return KeyOutcome::Ignored;
        }
        let history = self.shared.history();
        if history.is_empty() {
            return KeyOutcome::Ignored;
        }
        let recall = history.navigate(edit.history_cursor(), direction);
        drop(history);
        edit.set_from_history(recall.text.as_deref(), recall.cursor);
        KeyOutcome::HistoryRecalled
    }

    fn submit_line(&self, edit: &mut EditState) -> KeyOutcome {
        let text = edit.current_text().trim().to_string();
        if text.is_empty() {
            return KeyOutcome::Ignored;
        }
        edit.reset();
        self.shared.history().append(&text);
        match self.enqueue(text, None) {
            Ok(id) => KeyOutcome::Submitted(id),
            Err(_) => KeyOutcome::Ignored,
        }
    }

    /// Enqueue `text` without touching the editor or the history.
    ///
    /// The command runs in `working_directory` when given (relative paths
    /// resolve against the console's directory), otherwise in the console's
    /// directory at the time of this call. Returns `false` for blank text or
    /// after shutdown.
    pub fn execute_command(&self, text: &str, working_directory: Option<&Path>) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.enqueue(text.to_string(), working_directory).is_ok()
    }

    fn enqueue(&self, text: String, working_directory: Option<&Path>) -> Result<u64> {
        let current = self.shared.directory();
        let directory = match working_directory {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => current.join(dir),
            None => current,
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let command = PendingCommand::new(id, text, directory, self.command_timeout)
            .with_environment(self.shared.environment());

        self.shared.activity.enqueued();
        match self.shared.queue.push(command) {
            Ok(()) => Ok(id),
            Err(error) => {
                self.shared.activity.withdrawn(1);
                warn!(id, %error, "command not enqueued");
                self.shared
                    .output
                    .append(OutputRecord::stderr(error.to_string(), None));
                Err(error)
            }
        }
    }

    /// Register a hook fired on the worker thread after each successful `cd`.
    pub fn on_directory_changed<F>(&self, hook: F)
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.shared.add_directory_hook(Arc::new(hook));
    }

    /// Register a hook fired on the worker thread after every command.
    pub fn on_command_completed<F>(&self, hook: F)
    where
        F: Fn(&CommandCompletion) + Send + Sync + 'static,
    {
        self.shared.add_completion_hook(Arc::new(hook));
    }

    /// The newest `limit` records (all when `None`), oldest first.
    #[must_use]
    pub fn output_snapshot(&self, limit: Option<usize>) -> Vec<OutputRecord> {
        self.shared.output.snapshot(limit)
    }

    /// Command history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.shared.history().all()
    }

    #[must_use]
    pub fn stats(&self) -> ConsoleStats {
        let mut stats = ConsoleStats {
            total_output_lines: self.shared.output.total_appended(),
            retained_output_lines: self.shared.output.len(),
            history_entries: self.shared.history().len(),
            queued: self.shared.queue.len(),
            running_processes: self.shared.processes.len(),
            ..ConsoleStats::default()
        };
        self.shared.counters().fill(&mut stats);
        stats
    }

    #[must_use]
    pub fn state(&self) -> ConsoleState {
        self.shared.activity.state()
    }

    /// Block until nothing is queued or executing. Returns `false` if
    /// `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.activity.wait_idle(timeout)
    }

    /// Snapshot of external processes currently running.
    #[must_use]
    pub fn running_processes(&self) -> Vec<ProcessHandle> {
        self.shared.processes.snapshot()
    }

    #[must_use]
    pub fn current_directory(&self) -> PathBuf {
        self.shared.directory()
    }

    pub fn prompt(&self) -> &str {
        &self.shared.prompt
    }

    #[must_use]
    pub fn edit_text(&self) -> String {
        self.edit().current_text().to_string()
    }

    /// Cursor position in grapheme clusters.
    #[must_use]
    pub fn cursor_offset(&self) -> usize {
        self.edit().cursor_offset()
    }

    /// Add or replace a variable in the overlay captured by later commands.
    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.shared.update_environment(|env| {
            env.insert(key, value);
        });
    }

    pub fn remove_env(&self, key: &str) {
        self.shared.update_environment(|env| {
            env.remove(key);
        });
    }

    /// Stop the worker, discarding queued commands and killing any running
    /// process. Idempotent.
    ///
    /// Called from a hook (i.e. on the worker thread itself), this only stops
    /// intake; the worker exits once the current command's hooks return, and
    /// a later call from another thread joins it.
    pub fn shutdown(&self) {
        let mut slot = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        let Some(handle) = slot.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Release);
        self.shared.queue.close();
        let discarded = self.shared.queue.drain().len();
        if discarded > 0 {
            self.shared.activity.withdrawn(discarded);
            info!(discarded, "discarded queued commands at shutdown");
        }

        if handle.thread().id() == thread::current().id() {
            info!("shutdown requested from the worker thread");
            *slot = Some(handle);
            return;
        }
        drop(slot);

        while !handle.is_finished() {
            let killed = self.shared.processes.terminate_all();
            if killed > 0 {
                info!(killed, "terminated running processes at shutdown");
            }
            thread::sleep(SHUTDOWN_REAP_INTERVAL);
        }
        if handle.join().is_err() {
            warn!("console worker panicked");
        }
    }
}

impl Drop for ConsoleController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
