//! Positions and the cursors that sit on them.
//!
//! ## Learning: Derived Ordering
//!
//! Deriving `Ord` on a struct compares fields in declaration order, so
//! putting `row` before `column` gives exactly the reading order that the
//! forward and backward tag scans walk in.

use crate::{Range, TextChange};
use serde::{Deserialize, Serialize};

/// A row/column location. Both start at 0; columns count chars.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const ZERO: Position = Position { row: 0, column: 0 };

    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Same row, `n` chars further right.
    pub fn with_column_offset(self, n: usize) -> Position {
        Position::new(self.row, self.column + n)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-indexed, like editor status bars
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, column): (usize, usize)) -> Self {
        Self::new(row, column)
    }
}

/// A caret, plus the anchor of its selection when one is being dragged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub position: Position,
    pub anchor: Option<Position>,
}

impl Cursor {
    pub fn at(position: Position) -> Self {
        Self {
            position,
            anchor: None,
        }
    }

    pub fn move_to(&mut self, position: Position) {
        self.position = position;
        self.anchor = None;
    }

    /// Extends the selection to `position`, anchoring where the caret was.
    pub fn select_to(&mut self, position: Position) {
        self.anchor.get_or_insert(self.position);
        self.position = position;
    }

    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    /// The selected range, if the anchor and caret differ.
    pub fn selection(&self) -> Option<Range> {
        self.anchor
            .filter(|anchor| *anchor != self.position)
            .map(|anchor| Range::new(anchor, self.position))
    }

    /// What typing at this cursor replaces: the selection or nothing.
    pub fn edit_range(&self) -> Range {
        self.selection().unwrap_or_else(|| Range::empty(self.position))
    }

    /// Moves caret and anchor past an edit made elsewhere.
    pub fn follow(&mut self, change: &TextChange) {
        self.position = change.transform_position(self.position);
        self.anchor = self.anchor.map(|anchor| change.transform_position(anchor));
    }
}

/// The cursors of one document, in position order.
///
/// The primary cursor is the one added last. Tag highlighting only runs
/// while it is the only cursor.
#[derive(Debug, Clone)]
pub struct MultiCursor {
    cursors: Vec<Cursor>,
    primary: usize,
}

impl MultiCursor {
    /// A single cursor at the top of the document.
    pub fn new() -> Self {
        Self {
            cursors: vec![Cursor::default()],
            primary: 0,
        }
    }

    pub fn primary(&self) -> &Cursor {
        &self.cursors[self.primary]
    }

    pub fn primary_mut(&mut self) -> &mut Cursor {
        &mut self.cursors[self.primary]
    }

    pub fn all(&self) -> &[Cursor] {
        &self.cursors
    }

    pub fn all_mut(&mut self) -> &mut [Cursor] {
        &mut self.cursors
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.cursors.len() == 1
    }

    /// Adds a cursor and makes it primary. False when a bare cursor
    /// already sits at `position`.
    pub fn add(&mut self, position: Position) -> bool {
        let index = match self.cursors.binary_search_by(|c| c.position.cmp(&position)) {
            Ok(existing) if self.cursors[existing].anchor.is_none() => return false,
            Ok(index) | Err(index) => index,
        };
        self.cursors.insert(index, Cursor::at(position));
        self.primary = index;
        true
    }

    /// Drops every cursor but the primary one.
    pub fn collapse_to_primary(&mut self) {
        let primary = self.cursors[self.primary];
        self.cursors = vec![primary];
        self.primary = 0;
    }
}

impl Default for MultiCursor {
    fn default() -> Self {
        Self::new()
    }
}
