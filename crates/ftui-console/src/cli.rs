//! Command-line driver for the `ftui-console` binary.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::ConsoleConfig;
use crate::controller::ConsoleController;
use crate::error::{ConsoleError, Result};
use crate::key::{KeyInput, KeyOutcome};
use crate::record::{OutputRecord, StreamKind};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "FTUI_CONSOLE_LOG";

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "ftui-console",
    about = "Line-oriented command console with built-ins and supervised processes",
    version
)]
pub struct Cli {
    /// TOML config file (JSON when the extension is `.json`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Starting working directory.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    #[arg(long)]
    pub max_output_lines: Option<usize>,

    #[arg(long = "max-history")]
    pub max_history: Option<usize>,

    #[arg(long)]
    pub prompt: Option<String>,

    /// Per-command timeout (`250ms`, `2s`, or bare seconds).
    #[arg(long, value_parser = parse_duration_value)]
    pub timeout: Option<Duration>,

    #[arg(long)]
    pub shell: Option<String>,

    /// Extra environment for external commands, as KEY=VALUE.
    #[arg(long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Print records as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Run these commands in order, then exit. Repeatable.
    #[arg(short = 'c', long = "command")]
    pub commands: Vec<String>,

    /// Print final statistics as JSON on exit.
    #[arg(long)]
    pub stats: bool,
}

impl Cli {
    /// Layer command-line flags over the config file (or defaults).
    pub fn build_config(&self) -> Result<ConsoleConfig> {
        let mut config = match &self.config {
            Some(path) => ConsoleConfig::from_file(path)?,
            None => ConsoleConfig::default(),
        };
        if let Some(cwd) = &self.cwd {
            config.initial_directory = Some(cwd.clone());
        }
        if let Some(lines) = self.max_output_lines {
            config.max_output_lines = lines;
        }
        if let Some(size) = self.max_history {
            config.max_history_size = size;
        }
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        if let Some(timeout) = self.timeout {
            config = config.with_command_timeout(timeout);
        }
        if let Some(shell) = &self.shell {
            config.shell = shell.clone();
        }
        for (key, value) in &self.env {
            config.environment.insert(key.clone(), value.clone());
        }
        Ok(config)
    }
}

/// Parse `250ms`, `2s`, or bare seconds.
pub fn parse_duration_value(raw: &str) -> Result<Duration> {
    let invalid = |message: String| ConsoleError::InvalidConfig {
        errors: vec![message],
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("duration value cannot be empty".to_string()));
    }

    if let Some(ms) = trimmed.strip_suffix("ms") {
        let value = ms
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(format!("invalid millisecond duration: {raw}")))?;
        return Ok(Duration::from_millis(value));
    }

    if let Some(sec) = trimmed.strip_suffix('s') {
        let value = sec
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(format!("invalid second duration: {raw}")))?;
        return Ok(Duration::from_secs(value));
    }

    let value = trimmed
        .parse::<u64>()
        .map_err(|_| invalid(format!("invalid duration value: {raw}")))?;
    Ok(Duration::from_secs(value))
}

fn parse_env_pair(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConsoleError::InvalidConfig {
            errors: vec![format!("expected KEY=VALUE, got '{raw}'")],
        }),
    }
}

/// Install the stderr log subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Writes records as plain text (stderr-kind to stderr) or as JSON lines.
#[derive(Debug, Clone, Copy)]
struct RecordPrinter {
    json: bool,
}

impl RecordPrinter {
    fn print(self, record: &OutputRecord) {
        if self.json {
            let line = serde_json::to_string(record)
                .unwrap_or_else(|_| record.content().to_string());
            let _ = writeln!(io::stdout().lock(), "{line}");
            return;
        }
        match record.stream() {
            StreamKind::Stderr => {
                let _ = writeln!(io::stderr().lock(), "{}", record.content());
            }
            StreamKind::CommandEcho | StreamKind::Stdout | StreamKind::Info => {
                let _ = writeln!(io::stdout().lock(), "{}", record.content());
            }
        }
    }
}

pub fn run_from_env() -> Result<i32> {
    init_tracing();
    run(Cli::parse())
}

/// Run the console described by `cli`. Returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let config = cli.build_config()?;
    let console = ConsoleController::initialize(config)?;

    let printer = RecordPrinter { json: cli.json };
    console.on_command_completed(move |completion| {
        for record in &completion.records {
            printer.print(record);
        }
    });

    let code = if cli.commands.is_empty() {
        interactive(&console)?;
        0
    } else {
        batch(&console, &cli.commands)
    };

    if cli.stats {
        let stats = serde_json::to_string_pretty(&console.stats())?;
        let _ = writeln!(io::stdout().lock(), "{stats}");
    }
    console.shutdown();
    Ok(code)
}

fn batch(console: &ConsoleController, commands: &[String]) -> i32 {
    for command in commands {
        console.execute_command(command, None);
    }
    console.wait_idle(Duration::MAX);
    if console.stats().failed > 0 { 1 } else { 0 }
}

fn interactive(console: &ConsoleController) -> Result<()> {
    let stdin = io::stdin();
    let show_prompt = stdin.is_terminal();
    let mut lines = stdin.lock().lines();
    loop {
        if show_prompt {
            let mut stdout = io::stdout().lock();
            let _ = write!(stdout, "{}", console.prompt());
            let _ = stdout.flush();
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        for key in KeyInput::typed(&line) {
            console.handle_key(key);
        }
        if let KeyOutcome::Submitted(_) = console.handle_key(KeyInput::Enter) {
            console.wait_idle(Duration::MAX);
        }
    }
    Ok(())
}
