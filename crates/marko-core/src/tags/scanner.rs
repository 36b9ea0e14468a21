//! Regex token scanning over a document, filtered through scopes.
//!
//! The pattern finds every candidate (`/>`, `>`, `</`, `<`, barewords) and
//! the scope classifier decides which candidates are structural. A `>` in
//! an attribute string or a bareword in text has no tag scope and is
//! skipped silently.

use marko_buffer::{Position, Range, ScanMatch};
use marko_syntax::{ScopeClassifier, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{TagKind, TagSpan};
use crate::Document;

static TOKENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/>|>|</|<|[a-zA-Z0-9\-:]+").unwrap());

/// Looser than a token: whitespace runs and identifier runs with shorthand
/// punctuation, used to find where a concise tag name begins.
static TAG_NAME_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+|[@a-zA-Z0-9_\-:.#]+").unwrap());

/// Scans classified tokens in one document.
pub struct TokenScanner<'a> {
    doc: &'a Document,
    classifier: &'a dyn ScopeClassifier,
}

impl<'a> TokenScanner<'a> {
    pub fn new(doc: &'a Document, classifier: &'a dyn ScopeClassifier) -> Self {
        Self { doc, classifier }
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// The structural token at `pos`, if any.
    pub fn token_at(&self, pos: Position) -> Option<Token> {
        self.classifier.token_for(&self.doc.scopes_at(pos))
    }

    /// Visits tokens from `from` to the end of the document.
    ///
    /// The callback may call [`ScanMatch::stop`] to end the scan.
    pub fn scan_forward<F>(&self, from: Position, mut f: F)
    where
        F: FnMut(&mut ScanMatch, Token),
    {
        let range = Range::new(from, self.doc.end_position());
        self.doc.scan_in_range(&TOKENS, range, |m| {
            if let Some(token) = self.token_at(m.range.start) {
                f(m, token);
            }
        });
    }

    /// Visits tokens from `to` back to the start of the document.
    pub fn scan_backward<F>(&self, to: Position, mut f: F)
    where
        F: FnMut(&mut ScanMatch, Token),
    {
        let range = Range::new(Position::ZERO, to);
        self.doc.backwards_scan_in_range(&TOKENS, range, |m| {
            if let Some(token) = self.token_at(m.range.start) {
                f(m, token);
            }
        });
    }

    /// Start of the identifier run ending at `pos`, or `pos` itself when
    /// only whitespace precedes it.
    pub fn tag_name_start(&self, pos: Position) -> Position {
        let mut start = pos;
        let range = Range::new(Position::ZERO, pos);
        self.doc.backwards_scan_in_range(&TAG_NAME_START, range, |m| {
            if !m.match_text().trim().is_empty() {
                start = m.range.start;
            }
            m.stop();
        });
        start
    }

    /// Visits complete bracketed tags after `from`, in document order.
    ///
    /// Partial tags are dropped: a start delimiter resets whatever was
    /// collected so far.
    pub fn scan_tags<F>(&self, from: Position, mut f: F)
    where
        F: FnMut(&mut ScanMatch, TagSpan),
    {
        let mut builder = SpanBuilder::default();
        self.scan_forward(from, |m, token| match token.kind {
            TokenKind::OpenTagStart | TokenKind::CloseTagStart => {
                builder = SpanBuilder {
                    start: Some(m.range.start),
                    open: token.kind == TokenKind::OpenTagStart,
                    ..SpanBuilder::default()
                };
            }
            TokenKind::OpenTagName | TokenKind::CloseTagName => {
                if builder.name.is_none() {
                    builder.name = Some(m.range);
                }
                builder.open |= token.kind == TokenKind::OpenTagName;
            }
            kind if kind.is_end() => {
                if let Some(span) = builder.finish(m.range.end, kind) {
                    f(m, span);
                }
                builder = SpanBuilder::default();
            }
            _ => {}
        });
    }

    /// Visits complete bracketed tags before `to`, nearest first.
    pub fn backwards_scan_tags<F>(&self, to: Position, mut f: F)
    where
        F: FnMut(&mut ScanMatch, TagSpan),
    {
        let mut builder = SpanBuilder::default();
        let mut end: Option<(Position, TokenKind)> = None;
        self.scan_backward(to, |m, token| match token.kind {
            kind if kind.is_end() => {
                builder = SpanBuilder::default();
                end = Some((m.range.end, kind));
            }
            TokenKind::OpenTagName | TokenKind::CloseTagName => {
                // Walking backwards, the last name seen is the first in the tag
                builder.name = Some(m.range);
                builder.open |= token.kind == TokenKind::OpenTagName;
            }
            TokenKind::OpenTagStart | TokenKind::CloseTagStart => {
                builder.start = Some(m.range.start);
                builder.open |= token.kind == TokenKind::OpenTagStart;
                if let Some((end_pos, end_kind)) = end.take() {
                    if let Some(span) = builder.finish(end_pos, end_kind) {
                        f(m, span);
                    }
                }
                builder = SpanBuilder::default();
            }
            _ => {}
        });
    }
}

/// Pieces of a bracketed tag collected while scanning.
#[derive(Debug, Default)]
struct SpanBuilder {
    start: Option<Position>,
    name: Option<Range>,
    open: bool,
}

impl SpanBuilder {
    fn finish(&self, end: Position, end_kind: TokenKind) -> Option<TagSpan> {
        let start = self.start?;
        let kind = match end_kind {
            TokenKind::OpenTagEndSelfClose => TagKind::SelfClosing,
            TokenKind::OpenTagEnd => TagKind::Open,
            _ if self.open => TagKind::Open,
            _ => TagKind::Close,
        };
        Some(TagSpan {
            kind,
            range: Range::new(start, end),
            name_range: self.name,
            concise: false,
        })
    }
}
