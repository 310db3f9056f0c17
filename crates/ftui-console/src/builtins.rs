//! Commands interpreted inside the console process.
//!
//! Built-ins exist because they read or mutate console-local state (the
//! tracked working directory, the scrollback, the history). They never spawn
//! an OS process. Any failure becomes a stderr-kind record; nothing is
//! propagated to the worker.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::ConsoleError;
use crate::record::OutputRecord;

/// Number of entries the `history` built-in prints.
const HISTORY_LISTING_LEN: usize = 10;

const HELP_TEXT: &str = "\
Available commands:
  cd [path]   change directory (.., ~, absolute or relative paths)
  pwd         print working directory
  ls [path]   list directory contents
  clear       clear the console output
  history     show recent commands
  help        show this help message
Anything else runs as an external command in the current directory.";

/// The result of a handled built-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinOutcome {
    pub records: Vec<OutputRecord>,
    /// Directory the console moves to, set only by a successful `cd`.
    pub new_directory: Option<PathBuf>,
    /// The scrollback must be emptied before `records` are appended.
    pub clears_log: bool,
    pub failed: bool,
}

impl BuiltinOutcome {
    fn info(content: impl Into<String>, command: &str) -> Self {
        Self {
            records: vec![OutputRecord::info(content, Some(command))],
            new_directory: None,
            clears_log: false,
            failed: false,
        }
    }

    fn error(error: &ConsoleError, command: &str) -> Self {
        Self {
            records: vec![OutputRecord::stderr(error.to_string(), Some(command))],
            new_directory: None,
            clears_log: false,
            failed: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltinDispatcher {
    home: Option<PathBuf>,
}

impl Default for BuiltinDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinDispatcher {
    /// Dispatcher resolving `~` against the user's home directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            home: home_directory(),
        }
    }

    /// Dispatcher with an explicit home directory.
    #[must_use]
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Handle `command` if its first token names a built-in.
    ///
    /// Returns `None` when the command must run as an external process.
    #[must_use]
    pub fn try_handle(
        &self,
        command: &str,
        current_directory: &Path,
        history: &[String],
    ) -> Option<BuiltinOutcome> {
        let trimmed = command.trim();
        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "cd" => Some(self.change_directory(command, rest, current_directory)),
            "pwd" => Some(BuiltinOutcome::info(
                current_directory.display().to_string(),
                command,
            )),
            // Option flags belong to the system `ls`.
            "ls" if rest.starts_with('-') => None,
            "ls" => Some(self.list_directory(command, rest, current_directory)),
            "clear" => Some(BuiltinOutcome {
                records: vec![OutputRecord::info("cleared", Some(command))],
                new_directory: None,
                clears_log: true,
                failed: false,
            }),
            "help" => Some(BuiltinOutcome::info(HELP_TEXT, command)),
            "history" => Some(BuiltinOutcome::info(render_history(history), command)),
            _ => None,
        }
    }

    fn change_directory(&self, command: &str, args: &str, current: &Path) -> BuiltinOutcome {
        let target = match single_argument(args) {
            Ok(target) => target,
            Err(message) => {
                return BuiltinOutcome::error(&ConsoleError::user_input("cd", message), command);
            }
        };
        let resolved = match self.resolve(current, target) {
            Ok(path) => path,
            Err(error) => return BuiltinOutcome::error(&error, command),
        };

        if let Err(error) = ensure_directory(&resolved) {
            return BuiltinOutcome::error(&error, command);
        }

        let mut outcome = BuiltinOutcome::info(
            format!("{} -> {}", current.display(), resolved.display()),
            command,
        );
        outcome.new_directory = Some(resolved);
        outcome
    }

    fn list_directory(&self, command: &str, args: &str, current: &Path) -> BuiltinOutcome {
        let target = match single_argument(args) {
            Ok(target) => target,
            Err(message) => {
                return BuiltinOutcome::error(&ConsoleError::user_input("ls", message), command);
            }
        };
        let path = match target {
            Some(_) => match self.resolve(current, target) {
                Ok(path) => path,
                Err(error) => return BuiltinOutcome::error(&error, command),
            },
            None => current.to_path_buf(),
        };

        match list_entries(&path) {
            Ok(entries) => BuiltinOutcome::info(entries.join(" "), command),
            Err(error) => BuiltinOutcome::error(
                &ConsoleError::user_input("ls", format!("{}: {error}", path.display())),
                command,
            ),
        }
    }

    /// Resolve a `cd`-style target against `current`.
    pub fn resolve(&self, current: &Path, target: Option<&str>) -> Result<PathBuf, ConsoleError> {
        let needs_home =
            matches!(target, None | Some("~")) || target.is_some_and(|t| t.starts_with("~/"));
        let home = match (&self.home, needs_home) {
            (Some(home), _) => home.as_path(),
            (None, false) => Path::new("/"),
            (None, true) => {
                return Err(ConsoleError::user_input("cd", "home directory is not set"));
            }
        };
        Ok(resolve_target(current, target, home))
    }
}

/// Compute the directory `cd target` moves to from `current`.
///
/// `..` is the parent of `current`, `~` or no target is `home`, `~/x` is
/// below `home`, absolute paths are taken as-is, and anything else is joined
/// onto `current`. The result is normalized lexically; the filesystem is not
/// consulted.
#[must_use]
pub fn resolve_target(current: &Path, target: Option<&str>, home: &Path) -> PathBuf {
    let joined = match target {
        None | Some("~") => home.to_path_buf(),
        Some(t) if t.starts_with("~/") => home.join(&t[2..]),
        Some(t) if Path::new(t).is_absolute() => PathBuf::from(t),
        Some(t) => current.join(t),
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // `..` at the root stays at the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

fn ensure_directory(path: &Path) -> Result<(), ConsoleError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ConsoleError::directory(path, "not a directory")),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(ConsoleError::directory(path, "no such directory"))
        }
        Err(error) => Err(ConsoleError::directory(path, error.to_string())),
    }
}

fn list_entries(path: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort();
    Ok(entries)
}

/// Split built-in arguments into at most one target, honouring a single
/// pair of surrounding quotes.
fn single_argument(args: &str) -> Result<Option<&str>, String> {
    if args.is_empty() {
        return Ok(None);
    }
    for quote in ['"', '\''] {
        if let Some(inner) = args.strip_prefix(quote).and_then(|a| a.strip_suffix(quote)) {
            return Ok(Some(inner));
        }
    }
    if args.split_whitespace().count() > 1 {
        return Err("too many arguments".to_string());
    }
    Ok(Some(args))
}

fn render_history(history: &[String]) -> String {
    if history.is_empty() {
        return "no command history".to_string();
    }
    let skip = history.len().saturating_sub(HISTORY_LISTING_LEN);
    history
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, entry)| format!("{}. {entry}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn home_directory() -> Option<PathBuf> {
    #[cfg(windows)]
    let var = std::env::var_os("USERPROFILE");
    #[cfg(not(windows))]
    let var = std::env::var_os("HOME");
    var.filter(|value| !value.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::record::StreamKind;

    fn dispatcher() -> BuiltinDispatcher {
        BuiltinDispatcher::with_home("/home/console")
    }

    #[test]
    fn resolves_parent_home_and_absolute() {
        let home = Path::new("/home/console");
        let current = Path::new("/a/b");
        assert_eq!(resolve_target(current, Some(".."), home), PathBuf::from("/a"));
        assert_eq!(resolve_target(current, Some("~"), home), home);
        assert_eq!(resolve_target(current, None, home), home);
        assert_eq!(
            resolve_target(current, Some("/x/y"), home),
            PathBuf::from("/x/y")
        );
        assert_eq!(
            resolve_target(current, Some("c/../d"), home),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(
            resolve_target(current, Some("~/src"), home),
            PathBuf::from("/home/console/src")
        );
        assert_eq!(resolve_target(Path::new("/"), Some(".."), home), PathBuf::from("/"));
    }

    #[test]
    fn unknown_commands_are_not_handled() {
        let d = dispatcher();
        assert!(d.try_handle("git status", Path::new("/"), &[]).is_none());
        assert!(d.try_handle("cdx", Path::new("/"), &[]).is_none());
        assert!(d.try_handle("ls -la", Path::new("/"), &[]).is_none());
    }

    #[test]
    fn pwd_reports_current_directory() {
        let outcome = dispatcher()
            .try_handle("pwd", Path::new("/srv/app"), &[])
            .expect("pwd is a built-in");
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].content(), "/srv/app");
        assert_eq!(outcome.records[0].stream(), StreamKind::Info);
        assert!(outcome.new_directory.is_none());
    }

    #[test]
    fn cd_into_existing_directory_reports_transition() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");

        let outcome = dispatcher()
            .try_handle("cd sub", dir.path(), &[])
            .expect("cd is a built-in");
        let expected = dir.path().join("sub");
        assert_eq!(outcome.new_directory.as_deref(), Some(expected.as_path()));
        assert!(!outcome.failed);
        assert!(outcome.records[0].content().contains("->"));
    }

    #[test]
    fn cd_to_missing_or_file_target_fails_without_moving() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("file.txt"), "x").expect("write");
        let d = dispatcher();

        for cmd in ["cd missing", "cd file.txt", "cd a b"] {
            let outcome = d.try_handle(cmd, dir.path(), &[]).expect("cd is a built-in");
            assert!(outcome.failed, "{cmd} should fail");
            assert!(outcome.new_directory.is_none());
            assert_eq!(outcome.records.len(), 1);
            assert!(outcome.records[0].is_error());
        }
    }

    #[test]
    fn cd_accepts_quoted_path_with_spaces() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("my dir")).expect("mkdir");
        let outcome = dispatcher()
            .try_handle("cd \"my dir\"", dir.path(), &[])
            .expect("cd is a built-in");
        assert_eq!(outcome.new_directory, Some(dir.path().join("my dir")));
    }

    #[test]
    fn cd_without_home_fails() {
        let d = BuiltinDispatcher { home: None };
        let outcome = d.try_handle("cd", Path::new("/"), &[]).expect("cd is a built-in");
        assert!(outcome.failed);
        assert!(outcome.records[0].content().contains("home"));
    }

    #[test]
    fn ls_lists_sorted_entries_with_directory_suffix() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), "").expect("write");
        fs::write(dir.path().join("a.txt"), "").expect("write");
        fs::create_dir(dir.path().join("c")).expect("mkdir");

        let outcome = dispatcher()
            .try_handle("ls", dir.path(), &[])
            .expect("ls is a built-in");
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].content(), "a.txt b.txt c/");

        let nested = dispatcher()
            .try_handle("LS c", dir.path(), &[])
            .expect("ls is a built-in");
        assert_eq!(nested.records[0].content(), "");
    }

    #[test]
    fn ls_on_missing_directory_is_stderr() {
        let dir = tempdir().expect("tempdir");
        let outcome = dispatcher()
            .try_handle("ls nowhere", dir.path(), &[])
            .expect("ls is a built-in");
        assert!(outcome.failed);
        assert!(outcome.records[0].is_error());
    }

    #[test]
    fn clear_requests_log_reset() {
        let outcome = dispatcher()
            .try_handle("clear", Path::new("/"), &[])
            .expect("clear is a built-in");
        assert!(outcome.clears_log);
        assert_eq!(outcome.records[0].content(), "cleared");
    }

    #[test]
    fn help_lists_every_builtin() {
        let outcome = dispatcher()
            .try_handle("help", Path::new("/"), &[])
            .expect("help is a built-in");
        let text = outcome.records[0].content();
        for name in ["cd", "pwd", "ls", "clear", "help", "history"] {
            assert!(text.contains(name), "help is missing {name}");
        }
        assert!(text.lines().count() > 1);
    }

    #[test]
    fn history_lists_last_ten_numbered() {
        let history: Vec<String> = (1..=12).map(|n| format!("cmd{n}")).collect();
        let outcome = dispatcher()
            .try_handle("history", Path::new("/"), &history)
            .expect("history is a built-in");
        let lines: Vec<&str> = outcome.records[0].content().lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "3. cmd3");
        assert_eq!(lines[9], "12. cmd12");

        let empty = dispatcher()
            .try_handle("history", Path::new("/"), &[])
            .expect("history is a built-in");
        assert_eq!(empty.records[0].content(), "no command history");
    }
}
