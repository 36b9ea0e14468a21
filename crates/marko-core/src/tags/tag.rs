//! Tags that hold live markers.

use marko_buffer::{Decoration, MarkerId, Position, Range, TextChange, UndoMode};

use super::{TagKind, TagSpan};
use crate::{CoreResult, Document};

/// A highlighted tag.
///
/// Owns two markers in the document (whole tag and name) that follow
/// edits. A `Tag` must be given back with [`Tag::release`]; it has no
/// access to the document on drop.
#[derive(Debug, PartialEq, Eq)]
pub struct Tag {
    kind: TagKind,
    delimiters: Option<(&'static str, &'static str)>,
    marker: MarkerId,
    name_marker: Option<MarkerId>,
}

impl Tag {
    /// Starts tracking a located tag.
    pub fn acquire(doc: &mut Document, span: &TagSpan) -> Self {
        let marker = doc.mark_range(span.range);
        let name_marker = span.name_range.map(|range| doc.mark_range(range));
        Self {
            kind: span.kind,
            delimiters: span.delimiters(),
            marker,
            name_marker,
        }
    }

    /// Stops tracking; both markers are destroyed.
    pub fn release(self, doc: &mut Document) {
        doc.destroy_marker(self.marker);
        if let Some(id) = self.name_marker {
            doc.destroy_marker(id);
        }
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    /// Current bounds of the whole tag.
    pub fn range(&self, doc: &Document) -> Option<Range> {
        doc.marker_range(self.marker)
    }

    pub fn name_range(&self, doc: &Document) -> Option<Range> {
        self.name_marker.and_then(|id| doc.marker_range(id))
    }

    /// Current text of the name.
    pub fn name(&self, doc: &Document) -> Option<String> {
        self.name_range(doc).map(|range| doc.text_in_range(range))
    }

    /// Replaces the name text.
    pub fn set_name(&self, doc: &mut Document, name: &str, mode: UndoMode) -> CoreResult<Option<TextChange>> {
        match self.name_range(doc) {
            Some(range) => Ok(Some(doc.set_text_in_range(range, name, mode)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, doc: &Document, pos: Position) -> bool {
        self.range(doc).is_some_and(|range| range.contains_point(pos))
    }

    pub fn name_contains(&self, doc: &Document, pos: Position) -> bool {
        self.name_range(doc).is_some_and(|range| range.contains_point(pos))
    }

    /// True while the markers survive and the text still has the tag's
    /// delimiters at both ends.
    pub fn is_valid(&self, doc: &Document) -> bool {
        let Some(marker) = doc.marker(self.marker) else {
            return false;
        };
        if !marker.is_valid() {
            return false;
        }
        if let Some(name) = self.name_marker.and_then(|id| doc.marker(id)) {
            if !name.is_valid() {
                return false;
            }
        }

        let text = doc.text_in_range(marker.range());
        match self.delimiters {
            Some((open, close)) => {
                text.starts_with(open)
                    && text.ends_with(close)
                    && text.len() >= open.len() + close.len()
                    && (self.kind != TagKind::Open || !text.ends_with("/>"))
            }
            None => !text.is_empty(),
        }
    }

    /// Decorates the tag's range.
    pub fn highlight(&self, doc: &mut Document, class: &str) {
        doc.decorate_marker(self.marker, Decoration::highlight(class));
    }
}
