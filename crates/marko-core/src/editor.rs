//! One editing session over one document.
//!
//! ## Learning: The Facade Pattern
//!
//! `Editor` acts as a facade: callers type, move the cursor and save, and
//! the editor routes each event to the tag matcher, drains the deferred
//! task queue and publishes what changed. The matcher never sees the event
//! bus and the bus never drives the matcher.
//!
//! Each public method is one transaction:
//!
//! ```text
//! event ──► document edit ──► matcher (repeat while it edits) ──► deferred tasks ──► bus
//! ```

use std::path::Path;

use marko_buffer::{Position, Range, UndoMode};
use marko_syntax::{Grammar, GrammarRegistry};
use std::sync::Arc;

use crate::config::Config;
use crate::document::Document;
use crate::event::{EditorEvent, EventBus, EventStream};
use crate::scheduler::{DeferredTask, Scheduler};
use crate::tags::TagMatcher;
use crate::{CoreError, CoreResult};

/// An editing session.
///
/// ## Thread Safety
///
/// `Editor` is owned by a single thread. Other threads only ever see the
/// events it publishes.
pub struct Editor {
    /// The document being edited
    document: Document,

    /// Highlighted tag pair
    matcher: TagMatcher,

    /// Work to run after the current transaction
    scheduler: Scheduler,

    /// Editor configuration
    config: Config,

    /// Event bus for notifications
    event_bus: EventBus,
}

impl Editor {
    /// Creates a session with the default configuration.
    pub fn new(document: Document) -> Self {
        Self::with_config(document, Config::default())
    }

    /// Creates a session with custom configuration.
    pub fn with_config(document: Document, config: Config) -> Self {
        let mut editor = Self {
            matcher: TagMatcher::new(config.tag_matching.clone()),
            document,
            scheduler: Scheduler::new(),
            config,
            event_bus: EventBus::new(),
        };
        editor.transaction(|editor| editor.matcher.refresh(&mut editor.document));
        editor
    }

    /// Opens a file in a new session.
    pub fn open(path: impl AsRef<Path>, registry: &GrammarRegistry, config: Config) -> CoreResult<Self> {
        let document = Document::from_file(path, registry)?;
        Ok(Self::with_config(document, config))
    }

    // ==================== Getters ====================

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn matcher(&self) -> &TagMatcher {
        &self.matcher
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ranges of the highlighted tag pair.
    pub fn highlighted_ranges(&self) -> Vec<Range> {
        self.matcher.highlighted_ranges(&self.document)
    }

    /// Subscribes to editor events.
    pub fn subscribe(&self) -> EventStream {
        self.event_bus.subscribe()
    }

    // ==================== Text Editing ====================

    /// Types text at every cursor.
    pub fn insert_text(&mut self, text: &str) -> CoreResult<()> {
        self.transaction(|editor| {
            editor.matcher.on_will_insert(&mut editor.document, text);
            editor.document.insert_text(text)?;
            editor.process_changes()
        })
    }

    /// Replaces a range without going through typing.
    pub fn set_text_in_range(&mut self, range: Range, text: &str) -> CoreResult<()> {
        self.transaction(|editor| {
            editor.document.set_text_in_range(range, text, UndoMode::Record)?;
            editor.process_changes()
        })
    }

    /// Deletes backward from the primary cursor.
    pub fn delete_backward(&mut self) -> CoreResult<()> {
        self.transaction(|editor| {
            editor.document.backspace()?;
            editor.process_changes()
        })
    }

    /// Undoes the last action.
    pub fn undo(&mut self) -> CoreResult<()> {
        self.transaction(|editor| {
            editor.document.undo()?;
            editor.process_changes()
        })
    }

    /// Redoes the last undone action.
    pub fn redo(&mut self) -> CoreResult<()> {
        self.transaction(|editor| {
            editor.document.redo()?;
            editor.process_changes()
        })
    }

    /// Feeds change batches to the matcher until it stops editing.
    fn process_changes(&mut self) -> CoreResult<()> {
        loop {
            let changes = self.document.take_changes();
            if changes.is_empty() {
                return Ok(());
            }
            self.event_bus.emit(EditorEvent::TextChanged(self.document.id()));
            self.matcher
                .on_text_changed(&mut self.document, &changes, &mut self.scheduler)?;
        }
    }

    // ==================== Cursor & Grammar ====================

    /// Moves the primary cursor, dropping other cursors.
    pub fn move_cursor(&mut self, pos: Position) {
        self.transaction(|editor| {
            editor.document.set_cursor(pos);
            editor.event_bus.emit(EditorEvent::CursorMoved(editor.document.id()));
            editor.matcher.on_cursor_moved(&mut editor.document);
        });
    }

    /// Selects `range`; typing next replaces it.
    pub fn select_range(&mut self, range: Range) {
        self.transaction(|editor| {
            editor.document.select_range(range);
            editor.event_bus.emit(EditorEvent::CursorMoved(editor.document.id()));
            editor.matcher.on_cursor_moved(&mut editor.document);
        });
    }

    /// Adds a cursor. Tag highlighting stops while there are several.
    pub fn add_cursor(&mut self, pos: Position) {
        self.transaction(|editor| {
            if editor.document.add_cursor(pos) {
                editor.matcher.on_cursor_moved(&mut editor.document);
            }
        });
    }

    /// Switches grammar; the pair is recomputed from the new scopes.
    pub fn set_grammar(&mut self, grammar: Arc<dyn Grammar>) {
        self.transaction(|editor| {
            editor.document.set_grammar(grammar);
            editor.event_bus.emit(EditorEvent::GrammarChanged(editor.document.id()));
            editor.matcher.on_grammar_changed(&mut editor.document);
        });
    }

    // ==================== File Operations ====================

    /// Saves the document.
    pub fn save(&mut self) -> CoreResult<()> {
        self.document.save()?;
        self.emit_saved()
    }

    /// Saves the document to a new path.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        self.document.save_as(path)?;
        self.emit_saved()
    }

    fn emit_saved(&self) -> CoreResult<()> {
        let path = self
            .document
            .path()
            .ok_or(CoreError::NoFilePath)?
            .to_path_buf();
        tracing::info!("Saved {}", path.display());
        self.event_bus.emit(EditorEvent::Saved(path));
        Ok(())
    }

    /// Ends the session, releasing every marker. Queued tasks are dropped.
    pub fn destroy(mut self) -> Document {
        self.matcher.destroy(&mut self.document);
        self.scheduler.clear();
        self.event_bus
            .emit(EditorEvent::Destroyed(self.document.id()));
        self.document
    }

    // ==================== Transactions ====================

    /// Runs one event, then deferred tasks, then publishes highlight changes.
    fn transaction<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        let before = self.highlighted_ranges();
        let result = f(self);
        self.run_deferred();

        let after = self.highlighted_ranges();
        if after != before {
            self.event_bus.emit(EditorEvent::HighlightChanged(after));
        }
        result
    }

    fn run_deferred(&mut self) {
        while let Some(task) = self.scheduler.pop() {
            match task {
                DeferredTask::TriggerAutocomplete { activated_manually } => {
                    let autocomplete = &self.config.autocomplete;
                    if autocomplete.enabled && autocomplete.trigger_after_rename {
                        self.event_bus
                            .emit(EditorEvent::AutocompleteRequested { activated_manually });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_initial_highlight() {
        let mut doc = Document::marko("<div></div>");
        doc.set_cursor(Position::new(0, 2));
        let editor = Editor::new(doc);
        assert_eq!(editor.highlighted_ranges().len(), 2);
    }

    #[test]
    fn test_rename_requests_autocomplete() {
        let mut editor = Editor::new(Document::marko("<div></div>"));
        let mut events = editor.subscribe();
        editor.move_cursor(Position::new(0, 4));
        events.drain();

        editor.insert_text("X").unwrap();
        assert_eq!(editor.document().text(), "<divX></divX>");

        let events = events.drain();
        assert!(events.contains(&EditorEvent::AutocompleteRequested {
            activated_manually: false
        }));
        assert!(events.iter().any(|e| matches!(e, EditorEvent::HighlightChanged(r) if r.len() == 2)));
    }

    #[test]
    fn test_rename_trigger_can_be_disabled() {
        let mut config = Config::default();
        config.autocomplete.trigger_after_rename = false;
        let mut editor = Editor::with_config(Document::marko("<div></div>"), config);
        let mut events = editor.subscribe();
        editor.move_cursor(Position::new(0, 4));
        editor.insert_text("X").unwrap();

        assert!(!events.drain()
            .iter()
            .any(|e| matches!(e, EditorEvent::AutocompleteRequested { .. })));
    }

    #[test]
    fn test_undo_restores_both_names() {
        let mut editor = Editor::new(Document::marko("<div></div>"));
        editor.move_cursor(Position::new(0, 4));
        editor.insert_text("X").unwrap();
        editor.undo().unwrap();
        assert_eq!(editor.document().text(), "<div></div>");
    }

    #[test]
    fn test_rename_through_empty_name_keeps_pair() {
        let mut editor = Editor::new(Document::marko("<a></a>"));
        editor.move_cursor(Position::new(0, 2));

        editor.delete_backward().unwrap();
        assert_eq!(editor.document().text(), "<></>");
        assert_eq!(editor.highlighted_ranges().len(), 2);

        editor.insert_text("b").unwrap();
        assert_eq!(editor.document().text(), "<b></b>");
        assert_eq!(editor.highlighted_ranges().len(), 2);
    }

    #[test]
    fn test_delete_backward_at_document_start_is_noop() {
        let mut editor = Editor::new(Document::marko("<a></a>"));
        let mut events = editor.subscribe();
        editor.move_cursor(Position::new(0, 0));
        events.drain();

        editor.delete_backward().unwrap();
        assert_eq!(editor.document().text(), "<a></a>");
        assert!(!events.drain()
            .iter()
            .any(|e| matches!(e, EditorEvent::TextChanged(_))));
    }

    #[test]
    fn test_typing_over_selected_name_renames_pair() {
        let mut editor = Editor::new(Document::marko("<div></div>"));
        editor.select_range(Range::on_row(0, 1, 4));
        assert_eq!(editor.highlighted_ranges().len(), 2);

        editor.insert_text("span").unwrap();
        assert_eq!(editor.document().text(), "<span></span>");
        assert_eq!(editor.document().cursor_position(), Position::new(0, 5));
    }

    #[test]
    fn test_cursor_into_text_unhighlights() {
        let mut editor = Editor::new(Document::marko("<p>hello</p>"));
        let mut events = editor.subscribe();
        editor.move_cursor(Position::new(0, 1));
        editor.move_cursor(Position::new(0, 5));

        assert!(editor.highlighted_ranges().is_empty());
        assert_eq!(editor.document().marker_count(), 0);
        let events = events.drain();
        assert_eq!(events.last(), Some(&EditorEvent::HighlightChanged(Vec::new())));
    }

    #[test]
    fn test_destroy_releases_and_notifies() {
        let mut editor = Editor::new(Document::marko("<a></a>"));
        let mut events = editor.subscribe();
        editor.move_cursor(Position::new(0, 1));
        let id = editor.document().id();

        let doc = editor.destroy();
        assert_eq!(doc.marker_count(), 0);
        assert_eq!(events.drain().last(), Some(&EditorEvent::Destroyed(id)));
    }

    #[test]
    fn test_save_emits_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.marko");
        let mut editor = Editor::new(Document::marko("<a/>"));
        let mut events = editor.subscribe();

        editor.save_as(&path).unwrap();
        assert_eq!(events.drain(), vec![EditorEvent::Saved(path.clone())]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<a/>");
    }

    #[test]
    fn test_save_without_path_fails() {
        let mut editor = Editor::new(Document::marko("<a/>"));
        assert!(editor.save().is_err());
    }
}
