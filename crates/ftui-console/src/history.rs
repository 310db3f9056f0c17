//! Bounded command history with adjacent-duplicate suppression.
//!
//! Entries are stored oldest first. Navigation uses a cursor counted from the
//! most recent entry (`Some(0)` is the newest); `None` means the editor is not
//! mirroring any entry. The cursor itself lives in [`EditState`](crate::EditState)
//! so that any edit can drop it without touching the shared history.

use std::collections::VecDeque;

/// Direction of a history step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Older,
    Newer,
}

/// Result of one navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recall {
    /// New cursor position (`None` once past the newest end).
    pub cursor: Option<usize>,
    /// Entry under the new cursor, `None` when the cursor is absent.
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<String>,
    max_size: usize,
}

impl HistoryLog {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(256)),
            max_size,
        }
    }

    /// Record a submitted command. Returns `false` when `text` repeats the
    /// most recent entry and was suppressed.
    pub fn append(&mut self, text: &str) -> bool {
        if self.entries.back().is_some_and(|last| last == text) {
            return false;
        }
        self.entries.push_back(text.to_string());
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
        true
    }

    /// Step `cursor` one entry in `direction`.
    ///
    /// Moving older from an absent cursor selects the newest entry; moving
    /// older at the oldest entry stays there. Moving newer from the newest
    /// entry (or from an absent cursor) yields an absent cursor.
    #[must_use]
    pub fn navigate(&self, cursor: Option<usize>, direction: Direction) -> Recall {
        let len = self.entries.len();
        if len == 0 {
            return Recall {
                cursor: None,
                text: None,
            };
        }
        // Eviction may have shortened the history since the cursor was taken.
        let cursor = cursor.map(|c| c.min(len - 1));
        let next = match (direction, cursor) {
            (Direction::Older, None) => Some(0),
            (Direction::Older, Some(c)) => Some((c + 1).min(len - 1)),
            (Direction::Newer, None | Some(0)) => None,
            (Direction::Newer, Some(c)) => Some(c - 1),
        };
        Recall {
            cursor: next,
            text: next.and_then(|c| self.entry_from_newest(c).map(str::to_string)),
        }
    }

    /// Entry `index` steps back from the newest (0 = newest).
    #[must_use]
    pub fn entry_from_newest(&self, index: usize) -> Option<&str> {
        let len = self.entries.len();
        if index >= len {
            return None;
        }
        self.entries.get(len - 1 - index).map(String::as_str)
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(entries: &[&str]) -> HistoryLog {
        let mut log = HistoryLog::new(10);
        for entry in entries {
            log.append(entry);
        }
        log
    }

    #[test]
    fn immediate_repeat_is_suppressed() {
        let mut log = HistoryLog::new(10);
        assert!(log.append("ls"));
        assert!(!log.append("ls"));
        assert_eq!(log.all(), vec!["ls"]);
    }

    #[test]
    fn non_adjacent_duplicates_are_kept() {
        let log = history(&["ls", "pwd", "ls"]);
        assert_eq!(log.all(), vec!["ls", "pwd", "ls"]);
    }

    #[test]
    fn evicts_oldest_over_capacity() {
        let mut log = HistoryLog::new(2);
        log.append("a");
        log.append("b");
        log.append("c");
        assert_eq!(log.all(), vec!["b", "c"]);
    }

    #[test]
    fn older_walks_back_and_clamps_at_oldest() {
        let log = history(&["a", "b", "c"]);
        let step = log.navigate(None, Direction::Older);
        assert_eq!(step.cursor, Some(0));
        assert_eq!(step.text.as_deref(), Some("c"));

        let step = log.navigate(step.cursor, Direction::Older);
        assert_eq!(step.text.as_deref(), Some("b"));
        let step = log.navigate(step.cursor, Direction::Older);
        assert_eq!(step.text.as_deref(), Some("a"));
        let step = log.navigate(step.cursor, Direction::Older);
        assert_eq!(step.cursor, Some(2));
        assert_eq!(step.text.as_deref(), Some("a"));
    }

    #[test]
    fn newer_past_newest_is_absent() {
        let log = history(&["a", "b"]);
        let step = log.navigate(Some(1), Direction::Newer);
        assert_eq!(step.text.as_deref(), Some("b"));
        let step = log.navigate(step.cursor, Direction::Newer);
        assert_eq!(step.cursor, None);
        assert_eq!(step.text, None);
        assert_eq!(log.navigate(None, Direction::Newer).cursor, None);
    }

    #[test]
    fn empty_history_never_yields_entries() {
        let log = HistoryLog::new(4);
        assert_eq!(
            log.navigate(None, Direction::Older),
            Recall {
                cursor: None,
                text: None
            }
        );
    }

    #[test]
    fn stale_cursor_is_clamped() {
        let log = history(&["a"]);
        let step = log.navigate(Some(7), Direction::Older);
        assert_eq!(step.cursor, Some(0));
        assert_eq!(step.text.as_deref(), Some("a"));
    }
}
