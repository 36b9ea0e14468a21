//! Undo steps.
//!
//! ## Learning: Storing Both Sides of an Edit
//!
//! Every edit keeps the text it removed and the text it inserted, so undo
//! and redo are the same replacement run in opposite directions. An undo
//! step is a list of edits; follow-up edits made on the user's behalf
//! (renaming the partner of a tag being typed) join the current step with
//! [`UndoMode::Merge`], so one undo reverts both names.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Keystrokes closer together than this share an undo step.
const COALESCE_WINDOW: Duration = Duration::from_millis(300);

/// How an edit enters the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndoMode {
    /// Its own undo step, unless it continues the previous keystroke
    #[default]
    Record,
    /// Joins the previous undo step
    Merge,
}

/// One replacement, in char offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub at: usize,
    pub removed: String,
    pub inserted: String,
}

impl Edit {
    pub fn new(at: usize, removed: impl Into<String>, inserted: impl Into<String>) -> Self {
        Self {
            at,
            removed: removed.into(),
            inserted: inserted.into(),
        }
    }

    /// The same edit run backwards.
    pub fn reversed(&self) -> Edit {
        Edit::new(self.at, self.inserted.clone(), self.removed.clone())
    }

    /// Char offset where the removed text ends.
    pub fn removed_end(&self) -> usize {
        self.at + self.removed.chars().count()
    }

    /// Folds `next` into `self` when it continues plain typing or
    /// backspacing on the same row. Returns `next` back otherwise.
    fn absorb(&mut self, next: Edit) -> Result<(), Edit> {
        let single_row = |e: &Edit| !e.removed.contains('\n') && !e.inserted.contains('\n');
        if !single_row(self) || !single_row(&next) {
            return Err(next);
        }

        let typing = self.removed.is_empty() && next.removed.is_empty();
        let deleting = self.inserted.is_empty() && next.inserted.is_empty();

        if typing && self.at + self.inserted.chars().count() == next.at {
            self.inserted.push_str(&next.inserted);
            Ok(())
        } else if deleting && next.removed_end() == self.at {
            self.removed.insert_str(0, &next.removed);
            self.at = next.at;
            Ok(())
        } else if deleting && next.at == self.at {
            self.removed.push_str(&next.removed);
            Ok(())
        } else {
            Err(next)
        }
    }
}

#[derive(Debug, Clone)]
struct Step {
    edits: Vec<Edit>,
    /// Unset once undone or redone, so the step stops absorbing keystrokes
    touched: Option<Instant>,
}

/// Undo and redo stacks for one buffer.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Step>,
    redo: Vec<Step>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity,
        }
    }

    /// Records an applied edit. Any redo steps are lost.
    pub fn record(&mut self, edit: Edit, mode: UndoMode) {
        self.redo.clear();

        let edit = match self.undo.back_mut() {
            Some(step) if mode == UndoMode::Merge => {
                step.edits.push(edit);
                step.touched = Some(Instant::now());
                return;
            }
            Some(step) if step.touched.is_some_and(|t| t.elapsed() < COALESCE_WINDOW) => {
                let Some(last) = step.edits.last_mut() else {
                    step.edits.push(edit);
                    return;
                };
                match last.absorb(edit) {
                    Ok(()) => {
                        step.touched = Some(Instant::now());
                        return;
                    }
                    Err(edit) => edit,
                }
            }
            _ => edit,
        };

        self.undo.push_back(Step {
            edits: vec![edit],
            touched: Some(Instant::now()),
        });
        if self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }

    /// Takes the latest step; its edits must be reversed last to first.
    pub fn undo(&mut self) -> Option<Vec<Edit>> {
        let mut step = self.undo.pop_back()?;
        step.touched = None;
        let edits = step.edits.clone();
        self.redo.push(step);
        Some(edits)
    }

    /// Takes the latest undone step; its edits replay first to last.
    pub fn redo(&mut self) -> Option<Vec<Edit>> {
        let step = self.redo.pop()?;
        let edits = step.edits.clone();
        self.undo.push_back(step);
        Some(edits)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_swaps_sides() {
        let edit = Edit::new(3, "div", "span");
        assert_eq!(edit.reversed(), Edit::new(3, "span", "div"));
        assert_eq!(edit.removed_end(), 6);
    }

    #[test]
    fn test_typing_coalesces_into_one_step() {
        let mut history = History::new(10);
        history.record(Edit::new(0, "", "<"), UndoMode::Record);
        history.record(Edit::new(1, "", "a"), UndoMode::Record);
        history.record(Edit::new(5, "", "b"), UndoMode::Record);

        assert_eq!(history.undo_count(), 2);
        assert_eq!(history.undo(), Some(vec![Edit::new(5, "", "b")]));
        assert_eq!(history.undo(), Some(vec![Edit::new(0, "", "<a")]));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_backspaces_coalesce() {
        let mut history = History::new(10);
        history.record(Edit::new(4, "v", ""), UndoMode::Record);
        history.record(Edit::new(3, "i", ""), UndoMode::Record);
        assert_eq!(history.undo(), Some(vec![Edit::new(3, "iv", "")]));
    }

    #[test]
    fn test_merged_edit_joins_previous_step() {
        let mut history = History::new(10);
        history.record(Edit::new(4, "", "X"), UndoMode::Record);
        history.record(Edit::new(12, "div", "divX"), UndoMode::Merge);

        assert_eq!(history.undo_count(), 1);
        assert_eq!(history.undo().map(|edits| edits.len()), Some(2));
        assert!(history.can_redo());
        assert_eq!(history.redo().map(|edits| edits.len()), Some(2));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(2);
        for row in 0..3 {
            history.record(Edit::new(row * 10, "", "\n"), UndoMode::Record);
        }
        assert_eq!(history.undo_count(), 2);
        assert_eq!(history.undo(), Some(vec![Edit::new(20, "", "\n")]));
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::new(10);
        history.record(Edit::new(0, "", "a"), UndoMode::Record);
        history.undo();
        history.record(Edit::new(0, "", "b"), UndoMode::Record);
        assert!(!history.can_redo());
    }
}
