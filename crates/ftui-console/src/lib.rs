#![forbid(unsafe_code)]

//! FrankenTUI Console
//!
//! An embeddable command console: a line editor with history, a FIFO command
//! queue drained by a single worker thread, in-process built-ins (`cd`, `pwd`,
//! `ls`, `clear`, `help`, `history`), supervised external processes with
//! per-command timeouts, and a bounded scrollback of typed output records.
//!
//! # Key Components
//!
//! - [`ConsoleController`] - Entry point: keystrokes in, scrollback out
//! - [`ConsoleConfig`] - Initialization parameters, loadable from TOML/JSON
//! - [`EditState`] - Grapheme-aware in-progress line
//! - [`HistoryLog`] - Bounded, adjacent-deduplicated command history
//! - [`CommandQueue`] - FIFO hand-off to the worker
//! - [`BuiltinDispatcher`] - In-process built-in commands
//! - [`ProcessRunner`] - External commands with timeouts and a process table
//! - [`OutputLog`] - Bounded scrollback of [`OutputRecord`]s
//!
//! # Threading
//! The interactive thread only edits and enqueues; it never waits for a
//! command. Exactly one worker executes commands, so execution is strictly
//! serialized and only the worker ever changes the console's directory.

pub mod builtins;
pub mod cli;
pub mod command;
pub mod config;
pub mod controller;
pub mod edit;
pub mod error;
pub mod history;
pub mod key;
pub mod output_log;
pub mod process;
pub mod queue;
pub mod record;
pub mod stats;
pub mod worker;

pub use builtins::{BuiltinDispatcher, BuiltinOutcome, resolve_target};
pub use cli::run_from_env;
pub use command::PendingCommand;
pub use config::ConsoleConfig;
pub use controller::ConsoleController;
pub use edit::EditState;
pub use error::{ConsoleError, Result};
pub use history::{Direction, HistoryLog, Recall};
pub use key::{KeyInput, KeyOutcome};
pub use output_log::OutputLog;
pub use process::{ExecutionOutcome, ProcessHandle, ProcessRunner, ProcessTable};
pub use queue::CommandQueue;
pub use record::{OutputRecord, StreamKind};
pub use stats::ConsoleStats;
pub use worker::{CommandCompletion, CompletionStatus, ConsoleState};
