//! The tag matching state machine.
//!
//! ```text
//!                 cursor enters a tag
//!   Unhighlighted ───────────────────► Highlighted(MatchedTags)
//!        ▲                                   │   │
//!        │  cursor leaves both tags,         │   │ cursor moves into the
//!        │  `< > . #` typed, pair invalid,   │   │ partner: swap active
//!        └── grammar change, destroy ────────┘   └──────────────┘
//! ```
//!
//! Every path out of `Highlighted` releases the pair's markers.
//!
//! ## Learning: Enums as State Machines
//!
//! The highlighted pair only exists inside the `Highlighted` variant, so
//! "highlighted without a pair" is not representable. Moving out of the
//! state with `std::mem::replace` hands ownership of the pair (and its
//! markers) to whoever releases it.

use marko_buffer::{Position, Range, TextChange};
use marko_syntax::{MarkoScopeClassifier, ScopeClassifier};

use super::{LocateResult, MatchedTags, Side, Tag, TagKind, TagSpan, TokenScanner, tag_at};
use crate::config::TagMatchingConfig;
use crate::scheduler::Scheduler;
use crate::{CoreResult, Document};

/// Matcher state.
#[derive(Debug, Default)]
pub enum MatchState {
    #[default]
    Unhighlighted,
    Highlighted(MatchedTags),
}

/// Tracks the tag pair around the cursor of one document.
pub struct TagMatcher {
    state: MatchState,
    classifier: Box<dyn ScopeClassifier>,
    config: TagMatchingConfig,
}

impl TagMatcher {
    /// A matcher for the Marko grammar's scope names.
    pub fn new(config: TagMatchingConfig) -> Self {
        Self::with_classifier(config, Box::new(MarkoScopeClassifier))
    }

    pub fn with_classifier(config: TagMatchingConfig, classifier: Box<dyn ScopeClassifier>) -> Self {
        Self {
            state: MatchState::Unhighlighted,
            classifier,
            config,
        }
    }

    // ==================== Queries ====================

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn matched(&self) -> Option<&MatchedTags> {
        match &self.state {
            MatchState::Highlighted(matched) => Some(matched),
            MatchState::Unhighlighted => None,
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.matched().is_some()
    }

    /// Ranges currently highlighted, open tag first.
    pub fn highlighted_ranges(&self, doc: &Document) -> Vec<Range> {
        let Some(matched) = self.matched() else {
            return Vec::new();
        };
        std::iter::once(matched.open())
            .chain(matched.close())
            .filter_map(|tag| tag.range(doc))
            .collect()
    }

    pub fn classifier(&self) -> &dyn ScopeClassifier {
        self.classifier.as_ref()
    }

    /// The tag at `pos`, without touching the state.
    pub fn locate(&self, doc: &Document, pos: Position) -> LocateResult<Option<TagSpan>> {
        tag_at(&TokenScanner::new(doc, self.classifier.as_ref()), pos)
    }

    /// The structural partner of a located tag.
    ///
    /// Self-closing tags have none; a partner whose name differs is no
    /// partner.
    pub fn partner_of(&self, doc: &Document, span: &TagSpan) -> Option<TagSpan> {
        let scanner = TokenScanner::new(doc, self.classifier.as_ref());
        let partner = match span.kind {
            TagKind::SelfClosing => return None,
            TagKind::Open => find_matching_close(&scanner, span.range.end),
            TagKind::Close => find_matching_open(&scanner, span.range.start),
        }?;

        if partner.name(doc) == span.name(doc) {
            Some(partner)
        } else {
            tracing::debug!(
                name = ?span.name(doc),
                partner = ?partner.name(doc),
                "tag names differ"
            );
            None
        }
    }

    // ==================== Events ====================

    /// Text is about to be typed at the cursor.
    pub fn on_will_insert(&mut self, doc: &mut Document, text: &str) {
        let Some(matched) = self.matched() else {
            return;
        };
        let keep = !self.config.is_structural(text)
            && matched.is_valid(doc)
            && matched.active().contains(doc, doc.cursor_position());
        if !keep {
            self.unhighlight(doc);
        }
    }

    /// The document changed; `changes` is one batch, oldest first.
    pub fn on_text_changed(
        &mut self,
        doc: &mut Document,
        changes: &[TextChange],
        scheduler: &mut Scheduler,
    ) -> CoreResult<()> {
        if self.is_highlighted() && changes.iter().any(|change| self.config.is_structural(&change.new_text)) {
            self.unhighlight(doc);
        }

        if let MatchState::Highlighted(matched) = &self.state {
            let cursor = doc.cursor_position();
            if matched.is_valid(doc) && matched.active().contains(doc, cursor) {
                if self.config.rename_together && matched.active().name_contains(doc, cursor) {
                    matched.synchronize_tag_name(doc, scheduler)?;
                }
                return Ok(());
            }
        }

        self.refresh(doc);
        Ok(())
    }

    /// The cursor moved without an edit.
    pub fn on_cursor_moved(&mut self, doc: &mut Document) {
        if doc.has_multiple_cursors() {
            self.unhighlight(doc);
            return;
        }

        let cursor = doc.cursor_position();
        if let MatchState::Highlighted(matched) = &mut self.state {
            if matched.active().contains(doc, cursor) {
                return;
            }
            if matched.inactive().is_some_and(|tag| tag.contains(doc, cursor)) {
                matched.swap_active();
                return;
            }
        }

        self.refresh(doc);
    }

    /// The document was re-tokenized.
    pub fn on_grammar_changed(&mut self, doc: &mut Document) {
        self.refresh(doc);
    }

    /// Releases everything; the matcher stays usable.
    pub fn destroy(&mut self, doc: &mut Document) {
        self.unhighlight(doc);
    }

    // ==================== Transitions ====================

    /// Drops the current pair, if any.
    pub fn unhighlight(&mut self, doc: &mut Document) {
        if let MatchState::Highlighted(matched) = std::mem::take(&mut self.state) {
            tracing::debug!("unhighlight");
            matched.release(doc);
        }
    }

    /// Recomputes the pair at the cursor from scratch.
    pub fn refresh(&mut self, doc: &mut Document) {
        self.unhighlight(doc);
        if !self.config.enabled || doc.has_multiple_cursors() {
            return;
        }

        let pos = doc.cursor_position();
        let span = match self.locate(doc, pos) {
            Ok(Some(span)) => span,
            Ok(None) => return,
            Err(err) => {
                tracing::debug!(%err, "tag lookup aborted");
                return;
            }
        };

        let (open, close, active) = match span.kind {
            TagKind::SelfClosing => (span, None, Side::Open),
            TagKind::Open => (span, self.partner_of(doc, &span), Side::Open),
            TagKind::Close => match self.partner_of(doc, &span) {
                Some(open) => (open, Some(span), Side::Close),
                None => return,
            },
        };

        let open = Tag::acquire(doc, &open);
        let close = close.map(|span| Tag::acquire(doc, &span));
        let matched = MatchedTags::new(open, close, active);
        matched.highlight(doc, &self.config.highlight_class);
        tracing::debug!(?active, paired = matched.close().is_some(), "highlight");
        self.state = MatchState::Highlighted(matched);
    }
}

/// Forward depth-counting search for the close tag of an open tag ending
/// at `from`.
fn find_matching_close(scanner: &TokenScanner<'_>, from: Position) -> Option<TagSpan> {
    let mut depth = 1usize;
    let mut found = None;
    scanner.scan_tags(from, |m, span| match span.kind {
        TagKind::SelfClosing => {}
        TagKind::Open => depth += 1,
        TagKind::Close => {
            depth -= 1;
            if depth == 0 {
                found = Some(span);
                m.stop();
            }
        }
    });
    found
}

/// Backward depth-counting search for the open tag of a close tag starting
/// at `to`.
fn find_matching_open(scanner: &TokenScanner<'_>, to: Position) -> Option<TagSpan> {
    let mut depth = 1usize;
    let mut found = None;
    scanner.backwards_scan_tags(to, |m, span| match span.kind {
        TagKind::SelfClosing => {}
        TagKind::Close => depth += 1,
        TagKind::Open => {
            depth -= 1;
            if depth == 0 {
                found = Some(span);
                m.stop();
            }
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn matcher() -> TagMatcher {
        TagMatcher::new(TagMatchingConfig::default())
    }

    fn cursor_at(doc: &mut Document, matcher: &mut TagMatcher, column: usize) {
        doc.set_cursor(Position::new(0, column));
        matcher.on_cursor_moved(doc);
    }

    /// Types like the editor does: will-insert, edit, then change batches
    /// until the matcher stops editing.
    fn type_text(doc: &mut Document, matcher: &mut TagMatcher, scheduler: &mut Scheduler, text: &str) {
        matcher.on_will_insert(doc, text);
        doc.insert_text(text).unwrap();
        loop {
            let changes = doc.take_changes();
            if changes.is_empty() {
                break;
            }
            matcher.on_text_changed(doc, &changes, scheduler).unwrap();
        }
    }

    #[test]
    fn test_highlights_pair_from_open_tag() {
        let mut doc = Document::marko("<div><p>x</p></div>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 2);

        assert_eq!(
            matcher.highlighted_ranges(&doc),
            vec![Range::on_row(0, 0, 5), Range::on_row(0, 13, 19)]
        );
        assert_eq!(doc.marker_count(), 4);
    }

    #[test]
    fn test_highlights_pair_from_close_tag() {
        let mut doc = Document::marko("<div><p>x</p></div>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 10);

        assert_eq!(
            matcher.highlighted_ranges(&doc),
            vec![Range::on_row(0, 5, 8), Range::on_row(0, 9, 13)]
        );
        assert_eq!(matcher.matched().map(MatchedTags::active_side), Some(Side::Close));
    }

    #[test]
    fn test_depth_skips_self_closed_tags() {
        let doc = Document::marko("<a><a><a/></a></a>");
        let matcher = matcher();
        let outer = matcher.locate(&doc, Position::new(0, 1)).unwrap().unwrap();
        let partner = matcher.partner_of(&doc, &outer).unwrap();
        assert_eq!(partner.range, Range::on_row(0, 14, 18));

        let inner = matcher.locate(&doc, Position::new(0, 4)).unwrap().unwrap();
        let partner = matcher.partner_of(&doc, &inner).unwrap();
        assert_eq!(partner.range, Range::on_row(0, 10, 14));
    }

    #[test]
    fn test_self_closing_has_no_partner() {
        let mut doc = Document::marko("<div><img src=\"a\"/></div>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 7);

        let matched = matcher.matched().unwrap();
        assert!(matched.close().is_none());
        assert_eq!(matched.open().kind(), TagKind::SelfClosing);
        assert_eq!(doc.marker_count(), 2);
    }

    #[test]
    fn test_mismatched_close_is_not_highlighted() {
        let mut doc = Document::marko("<div></span>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 8);
        assert!(!matcher.is_highlighted());

        cursor_at(&mut doc, &mut matcher, 2);
        let matched = matcher.matched().unwrap();
        assert!(matched.close().is_none());
    }

    #[test]
    fn test_move_into_partner_swaps_active() {
        let mut doc = Document::marko("<div>x</div>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 2);
        let before = matcher.highlighted_ranges(&doc);

        cursor_at(&mut doc, &mut matcher, 9);
        assert_eq!(matcher.highlighted_ranges(&doc), before);
        assert_eq!(matcher.matched().map(MatchedTags::active_side), Some(Side::Close));
        assert_eq!(doc.marker_count(), 4);
    }

    #[test]
    fn test_leaving_and_reentering() {
        let mut doc = Document::marko("<div>text</div>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 2);
        let first = matcher.highlighted_ranges(&doc);

        cursor_at(&mut doc, &mut matcher, 7);
        assert!(!matcher.is_highlighted());
        assert_eq!(doc.marker_count(), 0);

        cursor_at(&mut doc, &mut matcher, 2);
        assert_eq!(matcher.highlighted_ranges(&doc), first);
    }

    #[test]
    fn test_multiple_cursors_unhighlight() {
        let mut doc = Document::marko("<div></div>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 2);
        doc.add_cursor(Position::new(0, 8));
        matcher.on_cursor_moved(&mut doc);

        assert!(!matcher.is_highlighted());
        assert_eq!(doc.marker_count(), 0);
    }

    #[test]
    fn test_rename_together() {
        let mut doc = Document::marko("<div></div>");
        let mut matcher = matcher();
        let mut scheduler = Scheduler::new();
        cursor_at(&mut doc, &mut matcher, 4);

        type_text(&mut doc, &mut matcher, &mut scheduler, "X");
        assert_eq!(doc.text(), "<divX></divX>");
        assert_eq!(scheduler.len(), 1);
        assert_eq!(
            matcher.highlighted_ranges(&doc),
            vec![Range::on_row(0, 0, 6), Range::on_row(0, 6, 13)]
        );
    }

    #[test]
    fn test_rename_from_close_tag() {
        let mut doc = Document::marko("<div></div>");
        let mut matcher = matcher();
        let mut scheduler = Scheduler::new();
        cursor_at(&mut doc, &mut matcher, 10);

        type_text(&mut doc, &mut matcher, &mut scheduler, "X");
        assert_eq!(doc.text(), "<divX></divX>");
    }

    #[test]
    fn test_shorthand_does_not_rename() {
        let mut doc = Document::marko("<div></div>");
        let mut matcher = matcher();
        let mut scheduler = Scheduler::new();
        cursor_at(&mut doc, &mut matcher, 4);

        type_text(&mut doc, &mut matcher, &mut scheduler, ".foo");
        assert_eq!(doc.text(), "<div.foo></div>");
        assert!(scheduler.is_empty());
        // Recomputed from scratch: the shorthand tag still pairs with </div>
        assert_eq!(matcher.highlighted_ranges(&doc).len(), 2);
    }

    #[test]
    fn test_rename_disabled() {
        let config = TagMatchingConfig {
            rename_together: false,
            ..TagMatchingConfig::default()
        };
        let mut doc = Document::marko("<div></div>");
        let mut matcher = TagMatcher::new(config);
        let mut scheduler = Scheduler::new();
        cursor_at(&mut doc, &mut matcher, 4);

        type_text(&mut doc, &mut matcher, &mut scheduler, "X");
        assert_eq!(doc.text(), "<divX></div>");
    }

    #[test]
    fn test_destroy_releases_markers() {
        let mut doc = Document::marko("<div></div>");
        let mut matcher = matcher();
        cursor_at(&mut doc, &mut matcher, 2);
        matcher.destroy(&mut doc);
        assert_eq!(doc.marker_count(), 0);
    }

    fn balanced() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![Just("<br/>".to_string()), Just("t".to_string())];
        leaf.prop_recursive(4, 24, 3, |inner| {
            (
                prop_oneof![Just("a"), Just("b")],
                prop::collection::vec(inner, 0..3),
            )
                .prop_map(|(name, children)| format!("<{name}>{}</{name}>", children.concat()))
        })
    }

    proptest! {
        #[test]
        fn test_partner_is_a_bijection(markup in balanced()) {
            let doc = Document::marko(&markup);
            let matcher = matcher();
            let len = markup.chars().count();
            for column in 0..len {
                let Ok(Some(span)) = matcher.locate(&doc, Position::new(0, column)) else {
                    continue;
                };
                if span.kind == TagKind::SelfClosing {
                    prop_assert!(matcher.partner_of(&doc, &span).is_none());
                    continue;
                }
                let partner = matcher.partner_of(&doc, &span);
                prop_assert!(partner.is_some(), "no partner for {span:?} in {markup}");
                if let Some(partner) = partner {
                    prop_assert_eq!(matcher.partner_of(&doc, &partner), Some(span));
                }
            }
        }

        #[test]
        fn test_markers_never_leak(markup in balanced(), moves in prop::collection::vec(0usize..64, 1..12)) {
            let mut doc = Document::marko(&markup);
            let mut matcher = matcher();
            let len = markup.chars().count();
            for column in moves {
                doc.set_cursor(Position::new(0, column % (len + 1)));
                matcher.on_cursor_moved(&mut doc);
                let expected = matcher.matched().map_or(0, |m| 2 + 2 * usize::from(m.close().is_some()));
                prop_assert_eq!(doc.marker_count(), expected);
            }
            matcher.destroy(&mut doc);
            prop_assert_eq!(doc.marker_count(), 0);
        }
    }
}
