//! Documents: a buffer plus everything tag tooling reads from it.
//!
//! ## Learning: Composition over Inheritance
//!
//! Rust doesn't have inheritance. `Document` composes a `TextBuffer`, the
//! cursors, and the scope map produced by its grammar. Every edit goes
//! through the document so the scope map is never stale.
//!
//! ## Learning: Newtypes
//!
//! `DocumentId` is a newtype wrapper around `Uuid`:
//! - Type safety: can't accidentally pass some other id
//! - Encapsulation: the underlying type can change without breaking APIs

use std::path::Path;
use std::sync::Arc;

use marko_buffer::{
    Decoration, Marker, MarkerId, MultiCursor, Position, Range, ScanMatch, TextBuffer,
    TextChange, UndoMode,
};
use marko_syntax::{Grammar, GrammarRegistry, MarkoGrammar, ScopeChain, ScopeMap, ScopeProvider};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new unique document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single template being edited.
pub struct Document {
    /// Unique identifier
    id: DocumentId,

    /// The underlying text buffer
    buffer: TextBuffer,

    /// Cursor state
    cursors: MultiCursor,

    /// Display name
    name: String,

    /// Grammar providing scopes
    grammar: Arc<dyn Grammar>,

    /// Scopes for the current text
    scopes: ScopeMap,
}

impl Document {
    /// Creates a document with the given text and grammar.
    pub fn new(text: &str, grammar: Arc<dyn Grammar>) -> Self {
        let buffer = TextBuffer::from(text);
        let scopes = grammar.tokenize(text);
        Self {
            id: DocumentId::new(),
            buffer,
            cursors: MultiCursor::new(),
            name: "untitled".to_string(),
            grammar,
            scopes,
        }
    }

    /// Creates an in-memory Marko document.
    ///
    /// # Example
    /// ```
    /// use marko_core::Document;
    ///
    /// let doc = Document::marko("<div></div>");
    /// assert_eq!(doc.root_scope(), "text.marko");
    /// ```
    pub fn marko(text: &str) -> Self {
        Self::new(text, Arc::new(MarkoGrammar))
    }

    /// Opens a document from a file, picking the grammar by extension.
    pub fn from_file(path: impl AsRef<Path>, registry: &GrammarRegistry) -> CoreResult<Self> {
        let path = path.as_ref();
        let buffer = TextBuffer::from_file(path)?;
        let grammar = registry.for_path(path);
        let scopes = grammar.tokenize(&buffer.text());

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!("Opened {} with grammar {}", path.display(), grammar.name());

        Ok(Self {
            id: DocumentId::new(),
            buffer,
            cursors: MultiCursor::new(),
            name,
            grammar,
            scopes,
        })
    }

    // ==================== Getters ====================

    /// Returns the document ID.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Returns the file path.
    pub fn path(&self) -> Option<&Path> {
        self.buffer.file_path()
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the document has unsaved changes.
    pub fn is_modified(&self) -> bool {
        self.buffer.is_modified()
    }

    /// Returns the text buffer.
    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// Returns the cursor state.
    pub fn cursors(&self) -> &MultiCursor {
        &self.cursors
    }

    /// Returns the primary cursor position.
    pub fn cursor_position(&self) -> Position {
        self.cursors.primary().position
    }

    pub fn has_multiple_cursors(&self) -> bool {
        !self.cursors.is_single()
    }

    /// Returns all text.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        self.buffer.text()
    }

    /// Text of a row without its terminator; empty past the last row.
    pub fn line_text(&self, row: usize) -> String {
        self.buffer.line_text(row).unwrap_or_default()
    }

    /// Character at a position, `None` past the end of its row.
    pub fn char_at(&self, pos: Position) -> Option<char> {
        self.buffer.char_at(pos)
    }

    /// Text covered by a range.
    pub fn text_in_range(&self, range: Range) -> String {
        self.buffer.text_in_range(range)
    }

    /// The position one character back, crossing rows.
    pub fn previous_position(&self, pos: Position) -> Option<Position> {
        self.buffer.previous_position(pos)
    }

    pub fn end_position(&self) -> Position {
        self.buffer.end_position()
    }

    // ==================== Scopes ====================

    /// Scopes covering `pos`, innermost first.
    pub fn scopes_at(&self, pos: Position) -> ScopeChain {
        self.scopes.scopes_at(pos)
    }

    /// The grammar's root scope.
    pub fn root_scope(&self) -> &'static str {
        self.grammar.scope_name()
    }

    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    /// Switches grammar and re-tokenizes.
    pub fn set_grammar(&mut self, grammar: Arc<dyn Grammar>) {
        tracing::debug!("Grammar for {} is now {}", self.name, grammar.name());
        self.grammar = grammar;
        self.retokenize();
    }

    fn retokenize(&mut self) {
        self.scopes = self.grammar.tokenize(&self.buffer.text());
    }

    // ==================== Cursors ====================

    /// Moves the primary cursor, dropping any other cursors.
    pub fn set_cursor(&mut self, pos: Position) {
        let pos = self.buffer.clip_position(pos);
        self.cursors.collapse_to_primary();
        self.cursors.primary_mut().move_to(pos);
    }

    /// Adds a cursor. Returns false if one already sits there.
    pub fn add_cursor(&mut self, pos: Position) -> bool {
        let pos = self.buffer.clip_position(pos);
        self.cursors.add(pos)
    }

    /// Selects `range` with the primary cursor.
    pub fn select_range(&mut self, range: Range) {
        self.set_cursor(range.start);
        let end = self.buffer.clip_position(range.end);
        self.cursors.primary_mut().select_to(end);
    }

    fn transform_cursors(&mut self, change: &TextChange) {
        for cursor in self.cursors.all_mut() {
            cursor.follow(change);
        }
    }

    // ==================== Text Editing ====================

    /// Types `text` at every cursor, replacing selections.
    pub fn insert_text(&mut self, text: &str) -> CoreResult<()> {
        let mut targets: Vec<Range> = self.cursors.all().iter().map(|c| c.edit_range()).collect();
        // Last to first so earlier targets stay put
        targets.sort_by(|a, b| b.start.cmp(&a.start));

        for target in targets {
            let change = self.buffer.set_text_in_range(target, text, UndoMode::Record)?;
            self.transform_cursors(&change);
        }
        for cursor in self.cursors.all_mut() {
            cursor.clear_selection();
        }

        self.retokenize();
        Ok(())
    }

    /// Deletes the selection or the character before the primary cursor.
    pub fn backspace(&mut self) -> CoreResult<()> {
        let cursor = *self.cursors.primary();
        let target = match cursor.selection() {
            Some(selection) => selection,
            None => match self.previous_char_start(cursor.position) {
                Some(start) => Range::new(start, cursor.position),
                None => return Ok(()),
            },
        };

        let change = self.buffer.set_text_in_range(target, "", UndoMode::Record)?;
        self.transform_cursors(&change);
        self.cursors.primary_mut().clear_selection();
        self.retokenize();
        Ok(())
    }

    /// Start of the character before `pos`, treating a row break as one char.
    fn previous_char_start(&self, pos: Position) -> Option<Position> {
        if pos.column > 0 {
            Some(Position::new(pos.row, pos.column - 1))
        } else if pos.row > 0 {
            let row = pos.row - 1;
            Some(Position::new(row, self.buffer.line_len(row)))
        } else {
            None
        }
    }

    /// Replaces a range programmatically. Cursors follow the edit.
    pub fn set_text_in_range(
        &mut self,
        range: Range,
        text: &str,
        mode: UndoMode,
    ) -> CoreResult<TextChange> {
        let change = self.buffer.set_text_in_range(range, text, mode)?;
        self.transform_cursors(&change);
        self.retokenize();
        Ok(change)
    }

    /// Drains the changes applied since the previous call.
    pub fn take_changes(&mut self) -> Vec<TextChange> {
        self.buffer.take_changes()
    }

    // ==================== Undo/Redo ====================

    /// Undoes the last action.
    pub fn undo(&mut self) -> CoreResult<()> {
        let seen = self.buffer.pending_changes().len();
        self.buffer.undo()?;
        self.after_history_step(seen);
        Ok(())
    }

    /// Redoes the last undone action.
    pub fn redo(&mut self) -> CoreResult<()> {
        let seen = self.buffer.pending_changes().len();
        self.buffer.redo()?;
        self.after_history_step(seen);
        Ok(())
    }

    fn after_history_step(&mut self, seen: usize) {
        let changes: Vec<TextChange> = self.buffer.pending_changes()[seen..].to_vec();
        for change in &changes {
            self.transform_cursors(change);
        }
        if let Some(last) = changes.last() {
            self.set_cursor(last.new_range.end);
        }
        self.retokenize();
    }

    // ==================== Markers ====================

    /// Starts tracking a range.
    pub fn mark_range(&mut self, range: Range) -> MarkerId {
        self.buffer.mark_range(range)
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.buffer.marker(id)
    }

    /// Current bounds of a marker.
    pub fn marker_range(&self, id: MarkerId) -> Option<Range> {
        self.buffer.marker_range(id)
    }

    pub fn decorate_marker(&mut self, id: MarkerId, decoration: Decoration) -> bool {
        self.buffer.decorate_marker(id, decoration)
    }

    /// Releases a marker.
    pub fn destroy_marker(&mut self, id: MarkerId) -> bool {
        self.buffer.destroy_marker(id)
    }

    /// Number of live markers.
    pub fn marker_count(&self) -> usize {
        self.buffer.marker_count()
    }

    // ==================== Scanning ====================

    /// Forward regex scan over `range`.
    pub fn scan_in_range<F>(&self, regex: &Regex, range: Range, f: F)
    where
        F: FnMut(&mut ScanMatch),
    {
        self.buffer.scan_in_range(regex, range, f);
    }

    /// Backward regex scan over `range`.
    pub fn backwards_scan_in_range<F>(&self, regex: &Regex, range: Range, f: F)
    where
        F: FnMut(&mut ScanMatch),
    {
        self.buffer.backwards_scan_in_range(regex, range, f);
    }

    // ==================== File Operations ====================

    /// Saves the document to its file.
    pub fn save(&mut self) -> CoreResult<()> {
        self.buffer.save()?;
        Ok(())
    }

    /// Saves the document to a new path.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        self.buffer.save_as(path)?;
        self.name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(())
    }
}

impl ScopeProvider for Document {
    fn scopes_at(&self, pos: Position) -> ScopeChain {
        Document::scopes_at(self, pos)
    }
}
