//! What was clicked: a tag name, an attribute name, a string literal or a
//! `state` / `data` reference in template code.
//!
//! The clicked word is found with a regex over the line (quoted strings
//! count as one word), then the scopes at its first character decide what
//! kind of thing it is.

use marko_buffer::{Position, Range};
use marko_core::Document;
use marko_syntax::{ScopeClassifier, ScopeKind, scopes};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// A quoted string, or a name optionally followed by `(`.
static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|\\')*'|"(?:[^"]|\\")*"|[a-zA-Z0-9.\-:]+(?:\s*\()?"#).unwrap()
});

static ARGUMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\($").unwrap());

static TAG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z0-9.\-:#]+$").unwrap());

static ATTR_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z0-9.\-:]+$").unwrap());

static STATE_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^state(\b|$)").unwrap());

static DATA_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^data(\b|$)").unwrap());

fn is_tag_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

fn is_attr_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '.' | ':' | '-')
}

/// Broad kind of the clicked position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Template code outside any tag or string
    Marko,
    Tag,
    String,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClickTarget {
    Tag {
        tag_name: String,
        /// Written as `name(...)`
        has_argument: bool,
    },
    Attribute {
        tag_name: String,
        attribute_name: String,
        has_argument: bool,
    },
    /// A string literal, unquoted, with the attribute it is the value of
    Literal {
        value: String,
        attribute_name: Option<String>,
        attribute_has_argument: bool,
    },
    /// `state` referenced from template code
    StateVar,
    /// `data` referenced from template code
    DataVar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickInspection {
    /// The clicked word
    pub range: Range,
    pub target: ClickTarget,
}

pub struct HyperclickInspector<'a> {
    doc: &'a Document,
    classifier: &'a dyn ScopeClassifier,
}

impl<'a> HyperclickInspector<'a> {
    pub fn new(doc: &'a Document, classifier: &'a dyn ScopeClassifier) -> Self {
        Self { doc, classifier }
    }

    /// The clickable word covering `pos` and its range.
    pub fn word_at(&self, pos: Position) -> Option<(String, Range)> {
        let line = self.doc.line_text(pos.row);
        WORD.find_iter(&line).find_map(|m| {
            let start = line[..m.start()].chars().count();
            let end = start + m.as_str().chars().count();
            (start <= pos.column && pos.column < end)
                .then(|| (m.as_str().to_string(), Range::on_row(pos.row, start, end)))
        })
    }

    /// Inspects the word under `pos`.
    pub fn inspect(&self, pos: Position) -> Option<ClickInspection> {
        let (text, range) = self.word_at(pos)?;
        self.inspect_word(&text, range)
    }

    /// Inspects `text`, the word found at `range`.
    pub fn inspect_word(&self, text: &str, range: Range) -> Option<ClickInspection> {
        let pos = range.start;
        let has_argument = ARGUMENT.is_match(text);
        let text = ARGUMENT.replace(text, "");

        let target = match self.region_at(pos)? {
            Region::Tag => ClickTarget::Tag {
                tag_name: text.into_owned(),
                has_argument,
            },
            Region::Attribute => ClickTarget::Attribute {
                tag_name: self.tag_name_from(pos)?,
                attribute_name: text.into_owned(),
                has_argument,
            },
            Region::String => {
                let (attribute_name, attribute_has_argument) = match self.attr_info_from(pos) {
                    Some((name, has_argument)) => (Some(name), has_argument),
                    None => (None, false),
                };
                ClickTarget::Literal {
                    value: unquote(&text).to_string(),
                    attribute_name,
                    attribute_has_argument,
                }
            }
            Region::Marko if STATE_VAR.is_match(&text) => ClickTarget::StateVar,
            Region::Marko if DATA_VAR.is_match(&text) => ClickTarget::DataVar,
            Region::Marko => return None,
        };

        tracing::debug!("Clicked {:?} at {:?}", target, range);
        Some(ClickInspection { range, target })
    }

    fn region_at(&self, pos: Position) -> Option<Region> {
        let chain = self.doc.scopes_at(pos);
        if chain.is_only(scopes::MARKO_ROOT) {
            return Some(Region::Marko);
        }
        chain.iter().find_map(|scope| match self.classifier.region(scope)? {
            // A tag's interior is only a target on its name
            ScopeKind::Tag { .. } => self.classifier.is_tag_name(scope).then_some(Region::Tag),
            ScopeKind::String => Some(Region::String),
            ScopeKind::AttrName => Some(Region::Attribute),
            ScopeKind::AttrSeparator => None,
        })
    }

    fn line_through(&self, pos: Position) -> String {
        self.doc
            .line_text(pos.row)
            .chars()
            .take(pos.column + 1)
            .collect()
    }

    /// Name of the tag owning the attribute at `pos`.
    fn tag_name_from(&self, pos: Position) -> Option<String> {
        let mut cur = Some(pos);
        while let Some(p) = cur {
            if self.doc.char_at(p).is_some_and(is_tag_name_char)
                && self.region_at(p) == Some(Region::Tag)
            {
                let line = self.line_through(p);
                if let Some(m) = TAG_NAME.find(&line) {
                    return Some(m.as_str().to_string());
                }
            }
            cur = self.doc.previous_position(p);
        }
        None
    }

    /// Attribute whose value is the string at `pos`, and whether it was
    /// written with an argument (`name(...)`). The search stops at the
    /// owning tag's name.
    fn attr_info_from(&self, pos: Position) -> Option<(String, bool)> {
        let mut cur = Some(pos);
        while let Some(p) = cur {
            if self.doc.char_at(p).is_some_and(is_attr_name_char) {
                match self.region_at(p) {
                    Some(Region::Attribute) => {
                        let name = ATTR_NAME.find(&self.line_through(p))?.as_str().to_string();
                        let rest: String =
                            self.doc.line_text(p.row).chars().skip(p.column + 1).collect();
                        return Some((name, rest.trim_start().starts_with('(')));
                    }
                    Some(Region::Tag) => return None,
                    _ => {}
                }
            }
            cur = self.doc.previous_position(p);
        }
        None
    }
}

fn unquote(text: &str) -> &str {
    match text.chars().next() {
        Some(quote @ ('"' | '\'')) if text.len() >= 2 => {
            let inner = &text[1..];
            inner.strip_suffix(quote).unwrap_or(inner)
        }
        _ => text,
    }
}
