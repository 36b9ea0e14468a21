//! # Marko Buffer
//!
//! Rope-backed text buffer with the primitives template tooling needs:
//! row/column positions, inclusive ranges, regex scans in both directions,
//! and live markers that follow edits.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Ownership & Borrowing
//! - `TextBuffer` owns the rope, the history and every marker
//! - Callers hold `MarkerId` handles, which are `Copy` and carry no borrow
//! - Scans take `&self` and a closure, so no match outlives the buffer borrow
//!
//! ### Memory Safety
//! - Positions are clipped before indexing into the rope
//! - Markers are released explicitly through `destroy_marker`

mod buffer;
mod cursor;
mod history;
mod marker;
mod range;

pub use buffer::{BufferConfig, ScanMatch, TextBuffer, TextChange};
pub use cursor::{Cursor, MultiCursor, Position};
pub use history::{Edit, History, UndoMode};
pub use marker::{Decoration, Marker, MarkerId, MarkerSet};
pub use range::Range;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Range {0} is invalid")]
    InvalidRange(Range),

    #[error("Buffer has no associated file path")]
    NoFilePath,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let buffer = TextBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len_lines(), 1);
        assert_eq!(buffer.end_position(), Position::ZERO);
    }

    #[test]
    fn test_insert_and_delete() {
        let mut buffer = TextBuffer::new();
        buffer.insert_at(Position::ZERO, "<div>").unwrap();
        buffer.insert_at(Position::new(0, 5), "</div>").unwrap();
        assert_eq!(buffer.text(), "<div></div>");

        buffer.delete_range(Range::on_row(0, 0, 5)).unwrap();
        assert_eq!(buffer.text(), "</div>");
    }

    #[test]
    fn test_undo_on_fresh_buffer_fails() {
        let mut buffer = TextBuffer::from("<div/>");
        assert!(matches!(buffer.undo(), Err(BufferError::NothingToUndo)));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.marko");

        let mut buffer = TextBuffer::from("<div/>");
        buffer.insert_at(Position::new(0, 4), " a").unwrap();
        assert!(buffer.is_modified());
        buffer.save_as(&path).unwrap();
        assert!(!buffer.is_modified());

        let loaded = TextBuffer::from_file(&path).unwrap();
        assert_eq!(loaded.text(), "<div a/>");
        assert_eq!(loaded.file_path(), Some(path.as_path()));
    }
}
