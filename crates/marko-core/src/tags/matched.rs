//! An open/close pair with one side active.

use marko_buffer::{Position, UndoMode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::Tag;
use crate::scheduler::{DeferredTask, Scheduler};
use crate::{CoreResult, Document};

/// Names that may be copied to the partner tag.
static SIMPLE_TAG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[@A-Za-z0-9_:-]+$").unwrap());

/// Which tag of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Open,
    Close,
}

/// A highlighted pair. `close` is `None` for self-closing tags and for
/// open tags without a partner.
#[derive(Debug)]
pub struct MatchedTags {
    open: Tag,
    close: Option<Tag>,
    active: Side,
}

impl MatchedTags {
    pub fn new(open: Tag, close: Option<Tag>, active: Side) -> Self {
        let active = if close.is_none() { Side::Open } else { active };
        Self {
            open,
            close,
            active,
        }
    }

    pub fn open(&self) -> &Tag {
        &self.open
    }

    pub fn close(&self) -> Option<&Tag> {
        self.close.as_ref()
    }

    pub fn active_side(&self) -> Side {
        self.active
    }

    /// The tag the cursor is in.
    pub fn active(&self) -> &Tag {
        match (self.active, &self.close) {
            (Side::Close, Some(close)) => close,
            _ => &self.open,
        }
    }

    /// The other tag, if there is one.
    pub fn inactive(&self) -> Option<&Tag> {
        match self.active {
            Side::Open => self.close.as_ref(),
            Side::Close => Some(&self.open),
        }
    }

    /// Makes the other tag active. No-op without a partner.
    pub fn swap_active(&mut self) {
        if self.close.is_some() {
            self.active = match self.active {
                Side::Open => Side::Close,
                Side::Close => Side::Open,
            };
        }
    }

    pub fn contains(&self, doc: &Document, pos: Position) -> bool {
        self.open.contains(doc, pos) || self.close.as_ref().is_some_and(|tag| tag.contains(doc, pos))
    }

    pub fn is_valid(&self, doc: &Document) -> bool {
        self.open.is_valid(doc) && self.close.as_ref().is_none_or(|tag| tag.is_valid(doc))
    }

    pub fn highlight(&self, doc: &mut Document, class: &str) {
        self.open.highlight(doc, class);
        if let Some(close) = &self.close {
            close.highlight(doc, class);
        }
    }

    /// Releases the markers of both tags.
    pub fn release(self, doc: &mut Document) {
        self.open.release(doc);
        if let Some(close) = self.close {
            close.release(doc);
        }
    }

    /// Copies the active tag's name onto its partner.
    ///
    /// Skipped when there is no partner, with several cursors, when either
    /// tag is no longer valid, or when the active name is not a plain
    /// identifier (typing `div.foo` must not touch `</div>`). The edit is
    /// merged into the previous undo step and an autocomplete re-trigger is
    /// scheduled. Returns true if the partner was rewritten.
    pub fn synchronize_tag_name(&self, doc: &mut Document, scheduler: &mut Scheduler) -> CoreResult<bool> {
        let Some(close) = &self.close else {
            return Ok(false);
        };
        if doc.has_multiple_cursors() {
            return Ok(false);
        }

        let (from, to) = match self.active {
            Side::Open => (&self.open, close),
            Side::Close => (close, &self.open),
        };
        let (Some(from_name), Some(to_name)) = (from.name(doc), to.name(doc)) else {
            return Ok(false);
        };
        if from_name == to_name {
            return Ok(false);
        }
        if !(from_name.is_empty() || SIMPLE_TAG_NAME.is_match(&from_name)) {
            tracing::debug!(name = %from_name, "not synchronizing tag name");
            return Ok(false);
        }
        if !(from.is_valid(doc) && to.is_valid(doc)) {
            return Ok(false);
        }

        tracing::debug!(from = %to_name, to = %from_name, "synchronizing tag name");
        to.set_name(doc, &from_name, UndoMode::Merge)?;
        scheduler.schedule(DeferredTask::TriggerAutocomplete {
            activated_manually: false,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{TagKind, TagSpan};
    use marko_buffer::Range;

    fn pair(doc: &mut Document) -> MatchedTags {
        let open = Tag::acquire(
            doc,
            &TagSpan {
                kind: TagKind::Open,
                range: Range::on_row(0, 0, 5),
                name_range: Some(Range::on_row(0, 1, 4)),
                concise: false,
            },
        );
        let close = Tag::acquire(
            doc,
            &TagSpan {
                kind: TagKind::Close,
                range: Range::on_row(0, 5, 11),
                name_range: Some(Range::on_row(0, 7, 10)),
                concise: false,
            },
        );
        MatchedTags::new(open, Some(close), Side::Open)
    }

    #[test]
    fn test_swap_active() {
        let mut doc = Document::marko("<div></div>");
        let mut matched = pair(&mut doc);
        assert_eq!(matched.active().kind(), TagKind::Open);
        matched.swap_active();
        assert_eq!(matched.active().kind(), TagKind::Close);
        assert_eq!(matched.inactive().map(Tag::kind), Some(TagKind::Open));
        matched.release(&mut doc);
        assert_eq!(doc.marker_count(), 0);
    }

    #[test]
    fn test_synchronize_from_open() {
        let mut doc = Document::marko("<div></div>");
        let matched = pair(&mut doc);
        let mut scheduler = Scheduler::new();

        doc.set_cursor(Position::new(0, 4));
        doc.insert_text("X").unwrap();
        assert!(matched.synchronize_tag_name(&mut doc, &mut scheduler).unwrap());

        assert_eq!(doc.text(), "<divX></divX>");
        assert_eq!(scheduler.len(), 1);

        // One undo reverts both edits
        doc.undo().unwrap();
        assert_eq!(doc.text(), "<div></div>");
        matched.release(&mut doc);
    }

    #[test]
    fn test_no_synchronize_for_shorthand() {
        let mut doc = Document::marko("<div></div>");
        let matched = pair(&mut doc);
        let mut scheduler = Scheduler::new();

        doc.set_cursor(Position::new(0, 4));
        doc.insert_text(".foo").unwrap();
        assert!(!matched.synchronize_tag_name(&mut doc, &mut scheduler).unwrap());

        assert_eq!(doc.text(), "<div.foo></div>");
        assert!(scheduler.is_empty());
        matched.release(&mut doc);
    }

    #[test]
    fn test_no_synchronize_with_multiple_cursors() {
        let mut doc = Document::marko("<div></div>");
        let matched = pair(&mut doc);
        let mut scheduler = Scheduler::new();

        doc.set_text_in_range(Range::on_row(0, 1, 4), "p", UndoMode::Record)
            .unwrap();
        assert!(doc.add_cursor(Position::new(0, 8)));
        assert!(!matched.synchronize_tag_name(&mut doc, &mut scheduler).unwrap());
        matched.release(&mut doc);
    }
}
