//! Property-based invariant tests for the console's building blocks.
//!
//! 1. The scrollback never exceeds its capacity and keeps the newest records
//! 2. History never holds adjacent duplicates and stays within capacity
//! 3. The edit cursor stays within `[0, grapheme_count]` under any key sequence
//! 4. The command queue pops in push order
//! 5. `cd` resolution is lexical and idempotent on absolute targets

use std::path::Path;
use std::time::Duration;

use ftui_console::{
    CommandQueue, Direction, EditState, HistoryLog, OutputLog, OutputRecord, PendingCommand,
    resolve_target,
};
use proptest::prelude::*;
use unicode_segmentation::UnicodeSegmentation;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum EditOp {
    Insert(char),
    Backspace,
    Delete,
    Move(isize),
    Home,
    End,
}

fn edit_op_strategy() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        prop_oneof![
            Just('a'),
            Just('é'),
            Just('\u{301}'),
            Just('字'),
            Just('🦀'),
            Just('\n'),
            any::<char>(),
        ]
        .prop_map(EditOp::Insert),
        Just(EditOp::Backspace),
        Just(EditOp::Delete),
        (-8isize..8).prop_map(EditOp::Move),
        Just(EditOp::Home),
        Just(EditOp::End),
    ]
}

fn history_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("pwd".to_string()), Just("ls".to_string()), "[a-c]{1,3}"]
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Bounded scrollback
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn scrollback_keeps_newest_within_capacity(cap in 1usize..50, extra in 0usize..80) {
        let log = OutputLog::new(cap);
        let total = cap + extra;
        for n in 0..total {
            log.append(OutputRecord::info(n.to_string(), None));
        }

        let records = log.snapshot(None);
        prop_assert_eq!(records.len(), cap);
        let contents: Vec<String> = records.iter().map(|r| r.content().to_string()).collect();
        let expected: Vec<String> = (extra..total).map(|n| n.to_string()).collect();
        prop_assert_eq!(contents, expected);
        prop_assert_eq!(log.total_appended(), total as u64);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. History adjacency and capacity
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn history_has_no_adjacent_duplicates(
        cap in 1usize..20,
        texts in proptest::collection::vec(history_text_strategy(), 0..60),
    ) {
        let mut history = HistoryLog::new(cap);
        for text in &texts {
            history.append(text);
        }

        let entries = history.all();
        prop_assert!(entries.len() <= cap);
        for pair in entries.windows(2) {
            prop_assert_ne!(&pair[0], &pair[1]);
        }
        if let Some(last) = texts.last() {
            prop_assert_eq!(entries.last(), Some(last));
        }
    }

    #[test]
    fn navigation_never_leaves_the_history(
        texts in proptest::collection::vec(history_text_strategy(), 1..20),
        steps in proptest::collection::vec(any::<bool>(), 0..40),
    ) {
        let mut history = HistoryLog::new(50);
        for text in &texts {
            history.append(text);
        }

        let mut cursor = None;
        for older in steps {
            let direction = if older { Direction::Older } else { Direction::Newer };
            let recall = history.navigate(cursor, direction);
            match recall.cursor {
                Some(c) => {
                    prop_assert!(c < history.len());
                    prop_assert_eq!(recall.text.as_deref(), history.entry_from_newest(c));
                }
                None => prop_assert!(recall.text.is_none()),
            }
            cursor = recall.cursor;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Edit cursor clamping
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn edit_cursor_stays_in_bounds(ops in proptest::collection::vec(edit_op_strategy(), 0..80)) {
        let mut edit = EditState::new();
        for op in ops {
            match op {
                EditOp::Insert(c) => { edit.insert(c); }
                EditOp::Backspace => { edit.backspace(); }
                EditOp::Delete => { edit.delete_forward(); }
                EditOp::Move(delta) => { edit.move_cursor(delta); }
                EditOp::Home => { edit.move_to_start(); }
                EditOp::End => { edit.move_to_end(); }
            }
            let graphemes = edit.current_text().graphemes(true).count();
            prop_assert!(edit.cursor_offset() <= graphemes);
            prop_assert!(!edit.current_text().chars().any(char::is_control));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Queue FIFO
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn queue_pops_in_push_order(ids in proptest::collection::vec(any::<u64>(), 0..100)) {
        let queue = CommandQueue::new();
        for &id in &ids {
            queue
                .push(PendingCommand::new(id, "pwd", "/", Duration::from_secs(1)))
                .expect("push");
        }

        let mut popped = Vec::new();
        while let Some(command) = queue.pop(Duration::ZERO).expect("pop") {
            popped.push(command.id);
        }
        prop_assert_eq!(popped, ids);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 5. Directory resolution
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn absolute_targets_ignore_current_directory(
        current in "(/[a-z]{1,4}){0,4}",
        target in "(/[a-z]{1,4}){1,4}",
    ) {
        let current = if current.is_empty() { "/".to_string() } else { current };
        let home = Path::new("/home/user");
        let resolved = resolve_target(Path::new(&current), Some(&target), home);
        prop_assert_eq!(resolved, Path::new(&target).to_path_buf());
    }

    #[test]
    fn parent_drops_exactly_one_component(parts in proptest::collection::vec("[a-z]{1,4}", 1..6)) {
        let current = format!("/{}", parts.join("/"));
        let expected = format!("/{}", parts[..parts.len() - 1].join("/"));
        let resolved = resolve_target(Path::new(&current), Some(".."), Path::new("/home/user"));
        prop_assert_eq!(resolved, Path::new(&expected).to_path_buf());
    }
}
