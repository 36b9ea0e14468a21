//! Core text buffer implementation using rope data structure.
//!
//! Besides text storage the buffer owns the two pieces of state the tag
//! matcher leans on: the live [`MarkerSet`] that follows edits, and the queue
//! of [`TextChange`]s an editor session drains after every edit transaction.
//!
//! ## Learning: Ownership in Action
//!
//! ```rust,ignore
//! let buffer = TextBuffer::new();  // buffer OWNS the rope and the markers
//! let id = buffer.mark_range(r);   // caller only holds a Copy handle
//! buffer.insert_at(pos, "x")?;     // &mut self: markers are rebound in place
//! buffer.marker_range(id);         // read back the adjusted bounds
//! ```

use regex::Regex;
use ropey::Rope;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::history::{Edit, History, UndoMode};
use crate::marker::{Decoration, Marker, MarkerId, MarkerSet};
use crate::{BufferError, BufferResult, Position, Range};

/// One applied edit, expressed in buffer coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    /// Range of the replaced text before the edit
    pub old_range: Range,
    /// Range of the inserted text after the edit
    pub new_range: Range,
    /// Text that was removed
    pub old_text: String,
    /// Text that was inserted
    pub new_text: String,
}

impl TextChange {
    /// Maps a position from before the change to after it.
    ///
    /// Positions before the change stay put, positions at or after its end
    /// move with the text, and positions inside the replaced text land at the
    /// end of the new text.
    pub fn transform_position(&self, pos: Position) -> Position {
        if pos < self.old_range.start {
            pos
        } else if pos >= self.old_range.end {
            if pos.row == self.old_range.end.row {
                Position::new(
                    self.new_range.end.row,
                    self.new_range.end.column + (pos.column - self.old_range.end.column),
                )
            } else {
                Position::new(
                    pos.row + self.new_range.end.row - self.old_range.end.row,
                    pos.column,
                )
            }
        } else {
            self.new_range.end
        }
    }
}

/// A single regex match produced while scanning a buffer range.
#[derive(Debug, Clone)]
pub struct ScanMatch {
    /// Buffer range covered by the match
    pub range: Range,
    text: String,
    stopped: bool,
}

impl ScanMatch {
    /// The matched text.
    pub fn match_text(&self) -> &str {
        &self.text
    }

    /// Ends the scan after the current callback returns.
    pub fn stop(&mut self) {
        self.stopped = true;
    }
}

/// A text buffer backed by a rope data structure.
///
/// # Thread Safety
///
/// `TextBuffer` is `Send` but not `Sync` - it belongs to one editing
/// session and is only touched from that session's event loop.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    /// The rope holding our text content
    rope: Rope,

    /// Edit history for undo/redo
    history: History,

    /// Live range markers
    markers: MarkerSet,

    /// Changes applied since the last `take_changes`
    changes: Vec<TextChange>,

    /// Whether the buffer has unsaved changes
    modified: bool,

    /// Associated file path (if any)
    file_path: Option<std::path::PathBuf>,
}

/// Configuration for buffer behavior
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum history entries to keep
    pub max_history: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { max_history: 1000 }
    }
}

impl TextBuffer {
    /// Creates a new empty buffer.
    ///
    /// # Example
    /// ```
    /// use marko_buffer::TextBuffer;
    ///
    /// let buffer = TextBuffer::new();
    /// assert!(buffer.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Creates a buffer with custom configuration.
    pub fn with_config(config: BufferConfig) -> Self {
        Self {
            rope: Rope::new(),
            history: History::new(config.max_history),
            markers: MarkerSet::new(),
            changes: Vec::new(),
            modified: false,
            file_path: None,
        }
    }

    /// Loads a buffer from a file.
    pub fn from_file(path: impl AsRef<Path>) -> BufferResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut buffer = Self::from(content.as_str());
        buffer.file_path = Some(path.to_path_buf());
        Ok(buffer)
    }

    /// Saves the buffer to its associated file.
    pub fn save(&mut self) -> BufferResult<()> {
        let path = self.file_path.clone().ok_or(BufferError::NoFilePath)?;
        self.save_as(&path)
    }

    /// Saves the buffer to a specific path.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> BufferResult<()> {
        let path = path.as_ref();

        // Write to a temporary file first, then rename (atomic write)
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, self.text().as_bytes())?;
        std::fs::rename(&temp_path, path)?;

        self.file_path = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    // ==================== Text Access ====================

    /// Returns the entire text content.
    #[inline]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        self.rope.slice(..).into()
    }

    /// Returns the text of a row without its line terminator.
    pub fn line_text(&self, row: usize) -> Option<String> {
        if row >= self.len_lines() {
            return None;
        }
        let mut line: String = self.rope.line(row).into();
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Some(line)
    }

    /// Returns the character at a position, `None` past the end of its row.
    pub fn char_at(&self, pos: Position) -> Option<char> {
        self.line_text(pos.row)?.chars().nth(pos.column)
    }

    /// Returns the text covered by `range` (clipped to the buffer).
    pub fn text_in_range(&self, range: Range) -> String {
        let start = self.position_to_char_idx(range.start);
        let end = self.position_to_char_idx(range.end);
        self.rope.slice(start..end.max(start)).into()
    }

    // ==================== Measurements ====================

    /// Returns true if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Returns the number of characters in the buffer.
    #[inline]
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Returns the number of lines in the buffer.
    ///
    /// An empty buffer has 1 line. A buffer ending with `\n` counts
    /// the empty line after it.
    #[inline]
    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Returns the length of a row in characters, excluding the terminator.
    pub fn line_len(&self, row: usize) -> usize {
        self.line_text(row).map_or(0, |line| line.chars().count())
    }

    /// Position just past the last character.
    pub fn end_position(&self) -> Position {
        let row = self.len_lines().saturating_sub(1);
        Position::new(row, self.line_len(row))
    }

    /// Clamps a position into the buffer.
    pub fn clip_position(&self, pos: Position) -> Position {
        if pos.row >= self.len_lines() {
            return self.end_position();
        }
        Position::new(pos.row, pos.column.min(self.line_len(pos.row)))
    }

    /// The position one character before `pos`, crossing row boundaries.
    ///
    /// Moving back from column 0 lands on the last character of the
    /// previous row (or column 0 if that row is empty). Returns `None` at
    /// the start of the buffer.
    pub fn previous_position(&self, pos: Position) -> Option<Position> {
        if pos.column > 0 {
            return Some(Position::new(pos.row, pos.column - 1));
        }
        if pos.row == 0 {
            return None;
        }
        let row = pos.row - 1;
        Some(Position::new(row, self.line_len(row).saturating_sub(1)))
    }

    // ==================== Mutations ====================

    /// Replaces the text in `range`.
    pub fn set_text_in_range(
        &mut self,
        range: Range,
        text: &str,
        mode: UndoMode,
    ) -> BufferResult<TextChange> {
        let start = self.position_to_char_idx(range.start);
        let end = self.position_to_char_idx(range.end);
        if end < start {
            return Err(BufferError::InvalidRange(range));
        }

        let change = self.apply(start, end, text);

        if !change.old_text.is_empty() || !text.is_empty() {
            self.history
                .record(Edit::new(start, change.old_text.clone(), text), mode);
        }

        Ok(change)
    }

    /// Inserts text at a position.
    pub fn insert_at(&mut self, pos: Position, text: &str) -> BufferResult<TextChange> {
        self.set_text_in_range(Range::empty(pos), text, UndoMode::Record)
    }

    /// Deletes the text in a range.
    pub fn delete_range(&mut self, range: Range) -> BufferResult<TextChange> {
        self.set_text_in_range(range, "", UndoMode::Record)
    }

    /// Changes applied since the last `take_changes`, oldest first.
    pub fn pending_changes(&self) -> &[TextChange] {
        &self.changes
    }

    /// Drains the changes applied since the previous call.
    pub fn take_changes(&mut self) -> Vec<TextChange> {
        std::mem::take(&mut self.changes)
    }

    /// Applies a raw replacement without touching history.
    fn apply(&mut self, start: usize, end: usize, text: &str) -> TextChange {
        let old_range = Range {
            start: self.char_idx_to_position(start),
            end: self.char_idx_to_position(end),
        };
        let old_text: String = self.rope.slice(start..end).into();

        self.rope.remove(start..end);
        self.rope.insert(start, text);

        let new_range = Range {
            start: old_range.start,
            end: self.char_idx_to_position(start + text.chars().count()),
        };
        let change = TextChange {
            old_range,
            new_range,
            old_text,
            new_text: text.to_string(),
        };

        tracing::trace!(old = %change.old_range, new = %change.new_range, "buffer changed");
        self.markers.apply_change(&change);
        self.changes.push(change.clone());
        self.modified = true;
        change
    }

    // ==================== Undo/Redo ====================

    /// Undoes the last undo step.
    pub fn undo(&mut self) -> BufferResult<()> {
        let edits = self.history.undo().ok_or(BufferError::NothingToUndo)?;
        for edit in edits.iter().rev() {
            self.apply_edit(&edit.reversed());
        }
        Ok(())
    }

    /// Redoes the last undone step.
    pub fn redo(&mut self) -> BufferResult<()> {
        let edits = self.history.redo().ok_or(BufferError::NothingToRedo)?;
        for edit in &edits {
            self.apply_edit(edit);
        }
        Ok(())
    }

    fn apply_edit(&mut self, edit: &Edit) {
        self.apply(edit.at, edit.removed_end(), &edit.inserted);
    }

    /// Returns true if there are edits to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there are edits to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ==================== Position Conversion ====================

    /// Converts a position to a character index, clipping it first.
    pub fn position_to_char_idx(&self, pos: Position) -> usize {
        let pos = self.clip_position(pos);
        self.rope.line_to_char(pos.row) + pos.column
    }

    /// Converts a character index to a position.
    pub fn char_idx_to_position(&self, char_idx: usize) -> Position {
        let char_idx = char_idx.min(self.len_chars());
        let row = self.rope.char_to_line(char_idx);
        let row_start = self.rope.line_to_char(row);
        Position::new(row, char_idx - row_start)
    }

    // ==================== Markers ====================

    /// Starts tracking a range that follows subsequent edits.
    pub fn mark_range(&mut self, range: Range) -> MarkerId {
        let range = Range::new(self.clip_position(range.start), self.clip_position(range.end));
        self.markers.mark(range)
    }

    /// Current bounds of a marker.
    pub fn marker_range(&self, id: MarkerId) -> Option<Range> {
        self.markers.range(id)
    }

    /// Looks up a marker.
    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(id)
    }

    /// Attaches a decoration to a marker.
    pub fn decorate_marker(&mut self, id: MarkerId, decoration: Decoration) -> bool {
        self.markers.decorate(id, decoration)
    }

    /// Releases a marker.
    pub fn destroy_marker(&mut self, id: MarkerId) -> bool {
        self.markers.destroy(id)
    }

    /// Number of live markers.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// All live markers.
    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    // ==================== Scanning ====================

    /// Runs `regex` over `range`, calling `f` for each match front to back.
    ///
    /// Matches never extend past the end of `range`. Calling
    /// [`ScanMatch::stop`] ends the scan.
    pub fn scan_in_range<F>(&self, regex: &Regex, range: Range, mut f: F)
    where
        F: FnMut(&mut ScanMatch),
    {
        let text = self.text_in_range(range);
        let mut locator = OffsetLocator::new(&text, self.clip_position(range.start));

        for found in regex.find_iter(&text) {
            if found.as_str().is_empty() {
                continue;
            }
            let start = locator.advance_to(found.start());
            let end = locator.peek(found.end());
            let mut scan_match = ScanMatch {
                range: Range { start, end },
                text: found.as_str().to_string(),
                stopped: false,
            };
            f(&mut scan_match);
            if scan_match.stopped {
                break;
            }
        }
    }

    /// Runs `regex` over `range`, calling `f` for each match back to front.
    pub fn backwards_scan_in_range<F>(&self, regex: &Regex, range: Range, mut f: F)
    where
        F: FnMut(&mut ScanMatch),
    {
        let mut matches = Vec::new();
        self.scan_in_range(regex, range, |m| matches.push(m.clone()));

        for mut scan_match in matches.into_iter().rev() {
            f(&mut scan_match);
            if scan_match.stopped {
                break;
            }
        }
    }

    // ==================== State Queries ====================

    /// Returns true if the buffer has unsaved changes.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns the associated file path, if any.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

/// Walks a scanned slice converting byte offsets into buffer positions.
///
/// Offsets must be requested in non-decreasing order.
struct OffsetLocator<'a> {
    text: &'a str,
    byte: usize,
    pos: Position,
}

impl<'a> OffsetLocator<'a> {
    fn new(text: &'a str, origin: Position) -> Self {
        Self {
            text,
            byte: 0,
            pos: origin,
        }
    }

    fn advance_to(&mut self, byte: usize) -> Position {
        self.pos = Self::walk(&self.text[self.byte..byte], self.pos);
        self.byte = byte;
        self.pos
    }

    fn peek(&self, byte: usize) -> Position {
        Self::walk(&self.text[self.byte..byte], self.pos)
    }

    fn walk(slice: &str, mut pos: Position) -> Position {
        for ch in slice.chars() {
            if ch == '\n' {
                pos.row += 1;
                pos.column = 0;
            } else if ch != '\r' {
                pos.column += 1;
            }
        }
        pos
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TextBuffer {
    fn from(s: &str) -> Self {
        let mut buffer = Self::new();
        buffer.rope = Rope::from_str(s);
        buffer
    }
}

impl From<String> for TextBuffer {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
