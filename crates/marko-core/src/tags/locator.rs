//! Finding the tag that surrounds a position.
//!
//! The token under the cursor decides the strategy:
//!
//! | token at position       | strategy                                        |
//! |-------------------------|-------------------------------------------------|
//! | `>` / `/>`              | end known; walk back to the start delimiter      |
//! | `<` / `</`              | start known; the next token must be the name     |
//! | tag name                | walk back to the start (or the concise line)     |
//! | attribute name          | walk back to the start and the first name        |
//! | nothing                 | walk back; an end delimiter first means "outside"|
//!
//! Whatever is still missing afterwards (usually the end) is found by
//! scanning forward from the name, stopping at the next start delimiter.

use marko_buffer::{Position, Range};
use marko_syntax::{Token, TokenKind};
use serde::Serialize;

use super::{LocateError, LocateResult, TokenScanner};
use crate::Document;

/// Which side of an element a tag is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// `<name ...>`
    Open,
    /// `</name>`
    Close,
    /// `<name/>` or a concise line: no partner
    SelfClosing,
}

/// A located tag. Plain data; no markers are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagSpan {
    pub kind: TagKind,
    /// Start delimiter through end delimiter
    pub range: Range,
    /// `None` while the name cannot be resolved
    pub name_range: Option<Range>,
    pub concise: bool,
}

impl TagSpan {
    /// Text of the name.
    pub fn name(&self, doc: &Document) -> Option<String> {
        self.name_range.map(|range| doc.text_in_range(range))
    }

    /// The delimiters this tag's text must begin and end with.
    ///
    /// Concise tags have none.
    pub fn delimiters(&self) -> Option<(&'static str, &'static str)> {
        if self.concise {
            return None;
        }
        Some(match self.kind {
            TagKind::Open => ("<", ">"),
            TagKind::Close => ("</", ">"),
            TagKind::SelfClosing => ("<", "/>"),
        })
    }
}

/// Locates the tag containing `pos`.
///
/// Returns `Ok(None)` when `pos` is in text, or when the tag under it is
/// too incomplete to resolve (no name yet, no end delimiter yet).
pub fn tag_at(scanner: &TokenScanner<'_>, pos: Position) -> LocateResult<Option<TagSpan>> {
    let probe = probe_position(scanner.document(), pos);
    let mut locator = Locator::new(scanner);

    let resolved = match scanner.token_at(probe) {
        None => locator.from_gap(probe)?,
        Some(token) if token.kind.is_end() => locator.from_end(probe, token)?,
        Some(token) if token.kind.is_start() => locator.from_start(probe, token),
        Some(token) if token.kind.is_name() => locator.from_name(probe, token)?,
        Some(_) => locator.from_attribute(probe)?,
    };
    if !resolved {
        return Ok(None);
    }

    let span = locator.finish();
    tracing::trace!(%pos, ?span, "tag_at");
    Ok(span)
}

/// A column at or past the end of a row is classified by the row's last
/// character.
fn probe_position(doc: &Document, pos: Position) -> Position {
    let len = doc.buffer().line_len(pos.row);
    if len > 0 && pos.column >= len {
        Position::new(pos.row, len - 1)
    } else {
        pos
    }
}

struct Locator<'s, 'a> {
    scanner: &'s TokenScanner<'a>,
    start: Option<Position>,
    name: Option<Range>,
    end: Option<Position>,
    open: bool,
    self_closing: bool,
    concise: bool,
}

impl<'s, 'a> Locator<'s, 'a> {
    fn new(scanner: &'s TokenScanner<'a>) -> Self {
        Self {
            scanner,
            start: None,
            name: None,
            end: None,
            open: false,
            self_closing: false,
            concise: false,
        }
    }

    fn doc(&self) -> &'a Document {
        self.scanner.document()
    }

    // ==================== Strategies ====================

    /// `<foo|>`, `<foo/|>`, `</foo|>`
    fn from_end(&mut self, probe: Position, token: Token) -> LocateResult<bool> {
        self.self_closing = token.kind == TokenKind::OpenTagEndSelfClose;
        self.open = token.kind != TokenKind::CloseTagEnd;
        let width = if self.doc().char_at(probe) == Some('/') { 2 } else { 1 };
        self.end = Some(probe.with_column_offset(width));

        let mut start = None;
        let mut name = None;
        self.scanner.scan_backward(probe, |m, token| match token.kind {
            TokenKind::OpenTagName | TokenKind::CloseTagName => name = Some(m.range),
            kind if kind.is_start() => {
                start = Some(m.range.start);
                m.stop();
            }
            _ => {}
        });

        self.start = Some(start.ok_or(LocateError::MissingStart(probe))?);
        self.name = name;
        Ok(true)
    }

    /// `|<foo>`, `|</foo>`, `<|/foo>`
    fn from_start(&mut self, probe: Position, token: Token) -> bool {
        let doc = self.doc();
        let start = if doc.char_at(probe) == Some('/') {
            doc.previous_position(probe).unwrap_or(probe)
        } else {
            probe
        };
        self.start = Some(start);
        self.open = token.kind == TokenKind::OpenTagStart;

        let width = if self.open { 1 } else { 2 };
        let mut name = None;
        self.scanner
            .scan_forward(start.with_column_offset(width), |m, token| {
                if token.kind.is_name() {
                    name = Some(m.range);
                }
                m.stop();
            });
        self.name = name;
        true
    }

    /// `<fo|o>`, `</fo|o>`, `fo|o` (concise)
    fn from_name(&mut self, probe: Position, token: Token) -> LocateResult<bool> {
        if token.concise {
            self.resolve_concise(probe);
            return Ok(true);
        }

        let mut start = None;
        self.scanner.scan_backward(probe, |m, token| {
            if token.kind.is_start() {
                start = Some(m.range.start);
                m.stop();
            }
        });
        let start = start.ok_or(LocateError::MissingStart(probe))?;
        self.start = Some(start);

        // Re-read the whole name; the cursor may be in the middle of it
        let mut name = None;
        let mut open = false;
        self.scanner.scan_forward(start, |m, token| {
            if token.kind.is_name() {
                name = Some(m.range);
                open = token.kind == TokenKind::OpenTagName;
                m.stop();
            }
        });
        self.name = Some(name.ok_or(LocateError::MissingName(probe))?);
        self.open = open;
        Ok(true)
    }

    /// `<foo |bar="">`
    fn from_attribute(&mut self, probe: Position) -> LocateResult<bool> {
        match self.walk_back_to_start(probe) {
            Walk::Start => Ok(true),
            Walk::Concise(name_start) => {
                self.resolve_concise(name_start);
                Ok(true)
            }
            Walk::Outside | Walk::Exhausted => Err(LocateError::MissingStart(probe)),
        }
    }

    /// `<foo| bar="">`, `<foo bar=|"">`
    fn from_gap(&mut self, probe: Position) -> LocateResult<bool> {
        Ok(match self.walk_back_to_start(probe) {
            Walk::Start => true,
            Walk::Concise(name_start) => {
                self.resolve_concise(name_start);
                true
            }
            Walk::Outside | Walk::Exhausted => false,
        })
    }

    // ==================== Helpers ====================

    /// Walks back over attributes and names until a start delimiter.
    fn walk_back_to_start(&mut self, probe: Position) -> Walk {
        let mut walk = Walk::Exhausted;
        let mut start = None;
        let mut name = None;
        let mut open = false;

        self.scanner.scan_backward(probe, |m, token| match token.kind {
            kind if kind.is_end() => {
                walk = Walk::Outside;
                m.stop();
            }
            TokenKind::OpenTagName if token.concise => {
                walk = if m.range.start.row == probe.row {
                    Walk::Concise(m.range.start)
                } else {
                    Walk::Outside
                };
                m.stop();
            }
            kind if kind.is_name() => {
                name = Some(m.range);
                open |= kind == TokenKind::OpenTagName;
            }
            kind if kind.is_start() => {
                start = Some(m.range.start);
                open |= kind == TokenKind::OpenTagStart;
                walk = Walk::Start;
                m.stop();
            }
            _ => {}
        });

        if walk == Walk::Start {
            self.start = start;
            self.name = name;
            self.open = open;
        }
        walk
    }

    /// A concise tag runs from its name to the end of the line.
    fn resolve_concise(&mut self, from: Position) {
        let start = self.scanner.tag_name_start(from);
        let mut name = None;
        self.scanner.scan_forward(start, |m, token| {
            if token.kind.is_name() {
                name = Some(m.range);
            }
            m.stop();
        });

        let row = from.row;
        let line_end = Position::new(row, self.doc().buffer().line_len(row));
        self.start = Some(start);
        self.name = name.or(Some(Range::new(from, from)));
        self.end = Some(line_end);
        self.open = true;
        self.self_closing = true;
        self.concise = true;
    }

    /// Forward from the name to the end delimiter, giving up at the next
    /// start delimiter.
    fn resolve_end(&mut self, from: Position) {
        let mut end = None;
        let mut open = self.open;
        let mut self_closing = self.self_closing;
        self.scanner.scan_forward(from, |m, token| match token.kind {
            TokenKind::OpenTagEnd | TokenKind::OpenTagEndSelfClose => {
                self_closing = token.kind == TokenKind::OpenTagEndSelfClose;
                open = true;
                end = Some(m.range.end);
                m.stop();
            }
            TokenKind::CloseTagEnd => {
                end = Some(m.range.end);
                m.stop();
            }
            kind if kind.is_start() => m.stop(),
            _ => {}
        });
        self.end = end;
        self.open = open;
        self.self_closing = self_closing;
    }

    fn finish(mut self) -> Option<TagSpan> {
        let name = self.name?;
        if self.end.is_none() {
            self.resolve_end(name.end);
        }
        let (start, end) = (self.start?, self.end?);

        let kind = if self.self_closing {
            TagKind::SelfClosing
        } else if self.open {
            TagKind::Open
        } else {
            TagKind::Close
        };
        Some(TagSpan {
            kind,
            range: Range::new(start, end),
            name_range: Some(name),
            concise: self.concise,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    /// Reached a start delimiter
    Start,
    /// Reached a concise tag name on the same row
    Concise(Position),
    /// Reached an end delimiter first
    Outside,
    /// Reached the start of the document
    Exhausted,
}
