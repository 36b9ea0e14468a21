//! Buffer ranges.
//!
//! ## Learning: Two Notions of "Inside"
//!
//! A range spans the text from `start` up to, not including, `end`. Asking
//! whether a cursor is inside one is different: a cursor sitting right
//! after the `>` of a tag still counts as in the tag, so containment checks
//! are inclusive at both ends.

use crate::Position;
use serde::{Deserialize, Serialize};

/// A range of text in the buffer.
///
/// The start is always before or equal to the end (normalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    /// Start position (inclusive)
    pub start: Position,
    /// End position (exclusive)
    pub end: Position,
}

impl Range {
    /// Creates a new range.
    ///
    /// Automatically normalizes so start <= end.
    pub fn new(start: Position, end: Position) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Creates a zero-width range.
    pub fn empty(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Creates a range on a single row.
    pub fn on_row(row: usize, start_column: usize, end_column: usize) -> Self {
        Self::new(
            Position::new(row, start_column),
            Position::new(row, end_column),
        )
    }

    /// Returns true if this is a zero-width range.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns true if `point` lies within the range, both ends inclusive.
    pub fn contains_point(&self, point: Position) -> bool {
        self.start <= point && point <= self.end
    }

    /// Returns true if `other` lies entirely within this range.
    pub fn contains_range(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<(Position, Position)> for Range {
    fn from((start, end): (Position, Position)) -> Self {
        Self::new(start, end)
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} - {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_normalization() {
        let range = Range::new(Position::new(2, 0), Position::new(1, 5));
        assert_eq!(range.start, Position::new(1, 5));
        assert_eq!(range.end, Position::new(2, 0));
    }

    #[test]
    fn test_contains_point_is_inclusive() {
        let range = Range::on_row(0, 0, 5);
        assert!(range.contains_point(Position::new(0, 0)));
        assert!(range.contains_point(Position::new(0, 5)));
        assert!(!range.contains_point(Position::new(0, 6)));
        assert!(!range.contains_point(Position::new(1, 0)));
    }

    #[test]
    fn test_empty_range() {
        let range = Range::empty(Position::new(3, 3));
        assert!(range.is_empty());
        assert!(range.contains_point(Position::new(3, 3)));
    }
}
