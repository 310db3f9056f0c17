//! Keystrokes delivered by the host surface.

/// A key the console reacts to. Hosts translate their native key events
/// into this enum before calling [`ConsoleController::handle_key`](crate::ConsoleController::handle_key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyInput {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    /// Recall the next older history entry.
    Up,
    /// Recall the next newer history entry.
    Down,
    Enter,
    Tab,
}

/// What a keystroke did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Edited,
    CursorMoved,
    HistoryRecalled,
    /// The line was enqueued as a command. Carries the command id.
    Submitted(u64),
    Ignored,
}

impl KeyInput {
    /// Keystrokes that type `text` verbatim (no trailing Enter).
    pub fn typed(text: &str) -> impl Iterator<Item = KeyInput> + '_ {
        text.chars().map(KeyInput::Char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_maps_each_char() {
        let keys: Vec<_> = KeyInput::typed("ls").collect();
        assert_eq!(keys, vec![KeyInput::Char('l'), KeyInput::Char('s')]);
    }
}
