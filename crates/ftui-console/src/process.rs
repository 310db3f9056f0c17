//! External command execution with timeouts and a process table.
//!
//! [`ProcessRunner`] runs a [`PendingCommand`] through the configured shell,
//! bound to the command's working-directory snapshot and environment overlay.
//! Stdout and stderr are drained by reader threads so a chatty child can
//! never block on a full pipe while the runner waits on it.
//!
//! Each running child is registered in a [`ProcessTable`] for the duration of
//! the run. The table is bookkeeping only: it backs introspection
//! ([`ProcessTable::snapshot`]) and shutdown ([`ProcessTable::terminate_all`]).
//!
//! Each reader keeps only the newest `line_limit` lines of its stream, and
//! at most [`MAX_LINE_BYTES`] of any single line, so a runaway child costs a
//! bounded amount of memory however much it writes before its timeout.
//!
//! On unix the child is placed in its own process group so a timeout kills
//! everything the shell started, not just the shell.

use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::command::PendingCommand;
use crate::config::DEFAULT_MAX_OUTPUT_LINES;
use crate::error::ConsoleError;
use crate::record::{OutputRecord, StreamKind};

/// Longest line kept from a child stream; the rest of the line is dropped.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// How an external command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The process exited on its own. A non-zero code is still `Completed`.
    Completed {
        /// `None` when the process was ended by a signal.
        exit_code: Option<i32>,
        stdout: Vec<String>,
        stderr: Vec<String>,
        duration: Duration,
    },
    /// The process outlived its timeout and was killed.
    TimedOut { timeout: Duration, duration: Duration },
    /// The process could not be started.
    SpawnFailed { reason: String },
}

impl ExecutionOutcome {
    /// `true` only for a zero exit code.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            Self::Completed {
                exit_code: Some(0),
                ..
            }
        )
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            Self::Completed { duration, .. } | Self::TimedOut { duration, .. } => *duration,
            Self::SpawnFailed { .. } => Duration::ZERO,
        }
    }

    /// Scrollback records for this outcome: stdout lines, then stderr lines,
    /// then a status line for non-zero exits. Failures yield one stderr record.
    #[must_use]
    pub fn records(&self, command: &str) -> Vec<OutputRecord> {
        match self {
            Self::Completed {
                exit_code,
                stdout,
                stderr,
                ..
            } => {
                let mut records: Vec<OutputRecord> = stdout
                    .iter()
                    .map(|line| OutputRecord::stdout(line.as_str(), command))
                    .chain(
                        stderr
                            .iter()
                            .map(|line| OutputRecord::stderr(line.as_str(), Some(command))),
                    )
                    .collect();
                match exit_code {
                    Some(0) => {}
                    Some(code) => records.push(OutputRecord::info(
                        format!("command exited with status {code}"),
                        Some(command),
                    )),
                    None => records.push(OutputRecord::info(
                        "command terminated by signal",
                        Some(command),
                    )),
                }
                records
            }
            Self::TimedOut { timeout, .. } => {
                let error = ConsoleError::ProcessTimeout {
                    command: command.to_string(),
                    timeout: *timeout,
                };
                vec![OutputRecord::stderr(error.to_string(), Some(command))]
            }
            Self::SpawnFailed { reason } => {
                let error = ConsoleError::ProcessSpawn {
                    command: command.to_string(),
                    reason: reason.clone(),
                };
                vec![OutputRecord::stderr(error.to_string(), Some(command))]
            }
        }
    }
}

/// Bookkeeping entry for a running child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessHandle {
    /// Id of the command that started the process.
    pub id: u64,
    pub pid: u32,
    pub command: String,
    pub started_at: DateTime<Utc>,
}

/// Table of in-flight processes keyed by command id.
#[derive(Debug, Default)]
pub struct ProcessTable {
    handles: Mutex<BTreeMap<u64, ProcessHandle>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, ProcessHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn register(self: &Arc<Self>, handle: ProcessHandle) -> Registration {
        let id = handle.id;
        self.lock().insert(id, handle);
        Registration {
            table: Arc::clone(self),
            id,
        }
    }

    /// Currently running processes, ordered by command id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProcessHandle> {
        self.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Kill every registered process (and its process group).
    ///
    /// Returns how many processes were signalled. Entries are removed by the
    /// runner once it observes the exit.
    pub fn terminate_all(&self) -> usize {
        let handles = self.snapshot();
        for handle in &handles {
            warn!(id = handle.id, pid = handle.pid, command = %handle.command, "terminating process");
            terminate_process_group(handle.pid);
        }
        handles.len()
    }
}

/// Removes a table entry when the run finishes, however it finishes.
struct Registration {
    table: Arc<ProcessTable>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.table.lock().remove(&self.id);
    }
}

/// Spawns external commands through a shell.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: String,
    table: Arc<ProcessTable>,
    line_limit: usize,
}

impl ProcessRunner {
    #[must_use]
    pub fn new(shell: impl Into<String>) -> Self {
        Self::with_table(shell, Arc::new(ProcessTable::new()))
    }

    #[must_use]
    pub fn with_table(shell: impl Into<String>, table: Arc<ProcessTable>) -> Self {
        Self {
            shell: shell.into(),
            table,
            line_limit: DEFAULT_MAX_OUTPUT_LINES,
        }
    }

    /// Keep at most `limit` trailing lines per stream (at least one).
    #[must_use]
    pub fn with_line_limit(mut self, limit: usize) -> Self {
        self.line_limit = limit.max(1);
        self
    }

    pub fn line_limit(&self) -> usize {
        self.line_limit
    }

    pub fn table(&self) -> &Arc<ProcessTable> {
        &self.table
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run `command` to completion, timeout, or spawn failure.
    pub fn run(&self, command: &PendingCommand) -> ExecutionOutcome {
        if !command.working_directory.is_dir() {
            return ExecutionOutcome::SpawnFailed {
                reason: format!(
                    "working directory {} does not exist",
                    command.working_directory.display()
                ),
            };
        }

        let started = Instant::now();
        let mut child = match self.build_command(command).spawn() {
            Ok(child) => child,
            Err(error) => {
                warn!(id = command.id, command = %command.text, %error, "spawn failed");
                return ExecutionOutcome::SpawnFailed {
                    reason: error.to_string(),
                };
            }
        };

        let pid = child.id();
        debug!(id = command.id, pid, command = %command.text, "process spawned");
        let _registration = self.table.register(ProcessHandle {
            id: command.id,
            pid,
            command: command.text.clone(),
            started_at: Utc::now(),
        });

        let (sender, receiver) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, StreamKind::Stdout, self.line_limit, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, StreamKind::Stderr, self.line_limit, sender);
        }

        let timed_out = || {
            warn!(
                id = command.id,
                pid,
                timeout_ms = u64::try_from(command.timeout.as_millis()).unwrap_or(u64::MAX),
                "command timed out"
            );
            ExecutionOutcome::TimedOut {
                timeout: command.timeout,
                duration: started.elapsed(),
            }
        };

        let status = match child.wait_timeout(command.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                terminate_child(&mut child);
                return timed_out();
            }
            Err(error) => {
                terminate_child(&mut child);
                return ExecutionOutcome::SpawnFailed {
                    reason: format!("failed to wait for process: {error}"),
                };
            }
        };

        // Descendants may still hold the pipes open after the shell exits;
        // they share the command's deadline.
        let deadline = started.checked_add(command.timeout);
        let mut stdout = None;
        let mut stderr = None;
        while stdout.is_none() || stderr.is_none() {
            let remaining = deadline.map_or(Duration::MAX, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            match receiver.recv_timeout(remaining) {
                Ok((StreamKind::Stdout, lines)) => stdout = Some(lines),
                Ok((_, lines)) => stderr = Some(lines),
                Err(RecvTimeoutError::Timeout) => {
                    terminate_process_group(pid);
                    return timed_out();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let outcome = ExecutionOutcome::Completed {
            exit_code: status.code(),
            stdout: stdout.unwrap_or_default(),
            stderr: stderr.unwrap_or_default(),
            duration: started.elapsed(),
        };
        debug!(id = command.id, pid, exit_code = ?status.code(), "process exited");
        outcome
    }

    fn build_command(&self, command: &PendingCommand) -> Command {
        let mut process = shell_command(&self.shell, &command.text);
        process
            .current_dir(&command.working_directory)
            .envs(&command.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            process.process_group(0);
        }

        process
    }
}

/// Build the shell invocation for `text`, picking the flag the shell expects.
fn shell_command(shell: &str, text: &str) -> Command {
    let program = std::path::Path::new(shell)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let flag = match program.as_str() {
        "cmd" => "/C",
        "powershell" | "pwsh" => "-Command",
        _ => "-c",
    };
    let mut command = Command::new(shell);
    command.arg(flag).arg(text);
    command
}

fn spawn_stream_reader<R>(
    stream: R,
    kind: StreamKind,
    line_limit: usize,
    sender: mpsc::Sender<(StreamKind, Vec<String>)>,
) where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let tail = read_tail(stream, line_limit);
        if tail.dropped > 0 {
            debug!(?kind, dropped = tail.dropped, "discarded output beyond scrollback capacity");
        }
        let _ = sender.send((kind, tail.lines.into()));
    });
}

/// The newest lines of a stream plus how many older lines were discarded.
#[derive(Debug, Default)]
struct StreamTail {
    lines: VecDeque<String>,
    dropped: u64,
}

impl StreamTail {
    fn push(&mut self, bytes: &[u8], line_limit: usize) {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        self.lines.push_back(String::from_utf8_lossy(bytes).into_owned());
        while self.lines.len() > line_limit {
            self.lines.pop_front();
            self.dropped += 1;
        }
    }
}

/// Read `stream` to EOF, keeping the last `line_limit` lines of at most
/// [`MAX_LINE_BYTES`] each. Lines end at `\n`; a trailing `\r` is dropped.
fn read_tail<R: Read>(stream: R, line_limit: usize) -> StreamTail {
    let mut reader = BufReader::new(stream);
    let mut tail = StreamTail::default();
    let mut line = Vec::new();
    loop {
        let chunk = match reader.fill_buf() {
            Ok([]) => break,
            Ok(chunk) => chunk,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        let consumed = chunk.len();
        let mut rest = chunk;
        while let Some(newline) = rest.iter().position(|&b| b == b'\n') {
            extend_capped(&mut line, &rest[..newline]);
            tail.push(&line, line_limit);
            line.clear();
            rest = &rest[newline + 1..];
        }
        extend_capped(&mut line, rest);
        reader.consume(consumed);
    }
    if !line.is_empty() {
        tail.push(&line, line_limit);
    }
    tail
}

fn extend_capped(line: &mut Vec<u8>, bytes: &[u8]) {
    let room = MAX_LINE_BYTES.saturating_sub(line.len());
    line.extend_from_slice(&bytes[..bytes.len().min(room)]);
}

fn terminate_child(child: &mut Child) {
    terminate_process_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn terminate_process_group(group_leader_pid: u32) {
    if group_leader_pid == 0 {
        return;
    }
    let _ = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{group_leader_pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(not(unix))]
fn terminate_process_group(pid: u32) {
    let _ = Command::new("taskkill")
        .arg("/PID")
        .arg(pid.to_string())
        .arg("/T")
        .arg("/F")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
