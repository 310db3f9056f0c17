//! In-progress command line.
//!
//! Tracks the typed text, a cursor counted in grapheme clusters, and the
//! history cursor the line currently mirrors. The cursor is always clamped to
//! `[0, grapheme_count]`; out-of-range moves clamp silently.

use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditState {
    /// Text value.
    text: String,
    /// Cursor position (grapheme index).
    cursor: usize,
    /// History entry mirrored by `text` (0 = newest), if any.
    history_cursor: Option<usize>,
}

impl EditState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_text(&self) -> &str {
        &self.text
    }

    pub fn cursor_offset(&self) -> usize {
        self.cursor
    }

    pub fn history_cursor(&self) -> Option<usize> {
        self.history_cursor
    }

    /// Insert `c` at the cursor. Control characters are ignored.
    ///
    /// Returns `true` if the text changed.
    pub fn insert(&mut self, c: char) -> bool {
        if c.is_control() {
            return false;
        }

        let old_count = self.grapheme_count();
        let byte_offset = self.grapheme_byte_offset(self.cursor);
        self.text.insert(byte_offset, c);

        // A combining mark merges into the previous grapheme; the cursor stays put.
        if self.grapheme_count() > old_count {
            self.cursor += 1;
        }
        self.history_cursor = None;
        true
    }

    /// Delete the grapheme before the cursor.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let byte_start = self.grapheme_byte_offset(self.cursor - 1);
        let byte_end = self.grapheme_byte_offset(self.cursor);
        self.text.drain(byte_start..byte_end);
        self.cursor -= 1;
        self.history_cursor = None;
        true
    }

    /// Delete the grapheme under the cursor.
    pub fn delete_forward(&mut self) -> bool {
        if self.cursor >= self.grapheme_count() {
            return false;
        }
        let byte_start = self.grapheme_byte_offset(self.cursor);
        let byte_end = self.grapheme_byte_offset(self.cursor + 1);
        self.text.drain(byte_start..byte_end);
        self.history_cursor = None;
        true
    }

    /// Move the cursor by `delta` graphemes, clamping at both ends.
    ///
    /// Returns `true` if the cursor moved.
    pub fn move_cursor(&mut self, delta: isize) -> bool {
        let count = self.grapheme_count();
        let target = if delta.is_negative() {
            self.cursor.saturating_sub(delta.unsigned_abs())
        } else {
            self.cursor.saturating_add(delta.unsigned_abs()).min(count)
        };
        let moved = target != self.cursor;
        self.cursor = target;
        moved
    }

    pub fn move_to_start(&mut self) -> bool {
        self.move_cursor(isize::MIN)
    }

    pub fn move_to_end(&mut self) -> bool {
        self.move_cursor(isize::MAX)
    }

    /// Mirror a history entry (or an empty line when `text` is `None`),
    /// placing the cursor at the end.
    pub fn set_from_history(&mut self, text: Option<&str>, cursor: Option<usize>) {
        self.text = text.unwrap_or_default().to_string();
        self.cursor = self.grapheme_count();
        self.history_cursor = cursor;
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.history_cursor = None;
    }

    fn grapheme_count(&self) -> usize {
        self.text.graphemes(true).count()
    }

    fn grapheme_byte_offset(&self, grapheme_idx: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(grapheme_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }
}
