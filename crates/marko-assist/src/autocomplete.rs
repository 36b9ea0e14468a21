//! What is being completed at the cursor.
//!
//! The inspector walks backwards from the cursor, character by character,
//! until it meets a tag name (possibly passing an attribute name first).
//! Unlike the tag locator it copes with half-typed input: `<di`, `<div `,
//! `<div foo="`, `</`.
//!
//! Regex checks on the text before the cursor then confirm that the name
//! found really ends at the cursor. When they are inconclusive the scopes
//! at the cursor decide between an ending tag, an attribute name and a
//! fresh tag.

use marko_buffer::Position;
use marko_core::Document;
use marko_syntax::{ScopeChain, ScopeClassifier, ScopeKind, TokenKind, scopes};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// `div.foo#bar` -> `div`
static TAG_SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-zA-Z0-9_-]+)[#.][a-zA-Z0-9_#.:-]+").unwrap());

static PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@A-Za-z0-9_\-.#]+$").unwrap());

static TAG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@a-zA-Z0-9.\-:#]+$").unwrap());

static ENDING_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</([@a-zA-Z0-9.\-:#]+)?$").unwrap());

static ENDING_TAG_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*>").unwrap());

static ATTR_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z0-9.\-:]+$").unwrap());

/// An attribute name, optionally followed by `="partial value`.
static ATTR_COMPLETION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([a-zA-Z0-9.\-:]+)(=["'][A-Za-z0-9_\-.#]*)?$"#).unwrap());

static TAG_COMPLETION: Lazy<Regex> = Lazy::new(|| Regex::new(r"([@a-zA-Z0-9.\-:#]+)$").unwrap());

fn is_tag_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '_' | '#' | '.' | ':' | '-')
}

fn is_attr_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '.' | ':' | '-')
}

/// Kind of completion requested at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionType {
    /// A tag name after `<` (or at the start of a concise line)
    TagStart,
    /// The name of a closing tag after `</`
    TagEnd,
    AttrName,
    /// Inside a quoted attribute value
    AttrValue,
}

/// Cursor context for one completion request.
///
/// `completion` is `None` in plain text or wherever nothing can be offered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InspectionResult {
    pub completion: Option<CompletionType>,
    pub tag_name: Option<String>,
    pub attribute_name: Option<String>,
    /// Partial word before the cursor
    pub prefix: String,
    pub concise: bool,
    /// The typed tag name used `.class`/`#id` shorthand
    pub has_shorthand: bool,
    /// `Some(true)` when the closing half should be inserted too,
    /// `Some(false)` when it is already there, `None` when undecided
    pub should_complete_ending_tag: Option<bool>,
    /// `Some(false)` when the attribute already has a value
    pub should_complete_attribute_value: Option<bool>,
}

impl InspectionResult {
    /// `"concise"` or `"html"`.
    pub fn syntax(&self) -> &'static str {
        if self.concise { "concise" } else { "html" }
    }

    /// Whether answering needs the project's taglib.
    pub fn needs_taglib(&self) -> bool {
        match self.completion {
            Some(CompletionType::TagStart) => !self.has_shorthand,
            Some(CompletionType::AttrName | CompletionType::AttrValue) => true,
            Some(CompletionType::TagEnd) | None => false,
        }
    }
}

/// Names found walking back from the cursor.
struct Enclosing {
    tag_name: String,
    attribute_name: Option<String>,
    concise: bool,
}

/// Classifies the cursor context of a document.
pub struct AutocompleteInspector<'a> {
    doc: &'a Document,
    classifier: &'a dyn ScopeClassifier,
}

impl<'a> AutocompleteInspector<'a> {
    pub fn new(doc: &'a Document, classifier: &'a dyn ScopeClassifier) -> Self {
        Self { doc, classifier }
    }

    pub fn inspect(&self, pos: Position) -> InspectionResult {
        let mut result = InspectionResult::default();
        if let Some(enclosing) = self.enclosing_names(pos) {
            result.tag_name = Some(enclosing.tag_name);
            result.attribute_name = enclosing.attribute_name;
            result.concise = enclosing.concise;
        }

        let line = self.line_before(pos);
        let after = self.line_from(pos);
        let ending_bracket_present = ENDING_TAG_BRACKET.is_match(&after);

        if let Some(attr_name) = &result.attribute_name {
            if let Some(caps) = ATTR_COMPLETION.captures(&line)
                && &caps[1] == attr_name.as_str()
            {
                if caps.get(2).is_some() {
                    result.completion = Some(CompletionType::AttrValue);
                } else {
                    result.completion = Some(CompletionType::AttrName);
                    result.should_complete_attribute_value =
                        Some(!after.trim_start().starts_with('='));
                }
            }
        } else if let Some(caps) = TAG_COMPLETION.captures(&line)
            && Some(&caps[1]) == result.tag_name.as_deref()
        {
            if ENDING_TAG.is_match(&line) {
                result.completion = Some(CompletionType::TagEnd);
                result.should_complete_ending_tag = Some(!ending_bracket_present);
                result.has_shorthand = false;
            } else {
                result.completion = Some(CompletionType::TagStart);
                if !result.concise && self.is_tag_at(pos) {
                    result.should_complete_ending_tag = Some(true);
                }
            }
        }

        if let Some(tag_name) = &result.tag_name
            && let Some(caps) = TAG_SHORTHAND.captures(tag_name)
        {
            let base = caps[1].to_string();
            result.tag_name = Some(base);
            result.has_shorthand = true;
        }

        if result.completion.is_none() {
            self.inspect_from_scopes(pos, &line, ending_bracket_present, &mut result);
        }

        result.prefix = PREFIX
            .find(&line)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        tracing::trace!("Inspected {:?}: {:?}", pos, result);
        result
    }

    /// Fallback when the text before the cursor does not end in the name
    /// found: only applies in plain text, in the whitespace of a tag or
    /// right at an open tag's `>`.
    fn inspect_from_scopes(
        &self,
        pos: Position,
        line: &str,
        ending_bracket_present: bool,
        result: &mut InspectionResult,
    ) {
        let chain = self.doc.scopes_at(pos);
        if !chain.is_only(scopes::MARKO_ROOT)
            && !self.is_tag_interior(&chain)
            && !self.is_open_tag_end(&chain)
        {
            return;
        }

        if ENDING_TAG.is_match(line.trim()) {
            if !line.ends_with(' ') {
                result.completion = Some(CompletionType::TagEnd);
                result.should_complete_ending_tag = Some(!ending_bracket_present);
            }
        } else if self.is_after_attribute(pos) {
            // A new attribute; any name passed on the way back is finished
            result.completion = Some(CompletionType::AttrName);
            result.attribute_name = None;
        }

        if result.completion.is_none()
            && !result.concise
            && let Some(tag_name) = &result.tag_name
            && let Some(caps) = ENDING_TAG.captures(line)
        {
            let ending = caps.get(1).map_or("", |m| m.as_str());
            if tag_name.starts_with(ending) {
                result.completion = Some(CompletionType::TagEnd);
                result.should_complete_ending_tag = Some(!ending_bracket_present);
                result.has_shorthand = false;
            }
        }

        if result.completion.is_none() && line.ends_with('<') {
            result.completion = Some(CompletionType::TagStart);
            result.should_complete_ending_tag = Some(true);
        }
    }

    // ==================== Backward walks ====================

    /// Nearest tag name before `pos`, and the attribute name passed on the
    /// way there, if any.
    fn enclosing_names(&self, pos: Position) -> Option<Enclosing> {
        let mut attribute_name = None;
        let mut cursor = self.doc.previous_position(pos);

        while let Some(at) = cursor {
            let candidate = self
                .doc
                .char_at(at)
                .is_some_and(|c| is_attr_name_char(c) || is_tag_name_char(c));

            if candidate {
                for scope in self.doc.scopes_at(at).iter() {
                    match self.classifier.region(scope) {
                        Some(ScopeKind::Tag { concise }) if self.classifier.is_tag_name(scope) => {
                            let line = self.line_through(at);
                            let tag_name = TAG_NAME.find(&line)?.as_str().to_string();
                            return Some(Enclosing {
                                tag_name,
                                attribute_name,
                                concise,
                            });
                        }
                        Some(ScopeKind::AttrName) if attribute_name.is_none() => {
                            let line = self.line_through(at);
                            attribute_name = Some(ATTR_NAME.find(&line)?.as_str().to_string());
                            break;
                        }
                        _ => {}
                    }
                }
            }

            cursor = self.doc.previous_position(at);
        }
        None
    }

    /// True when whitespace separates the cursor from a preceding
    /// attribute, tag name or expression on the same row.
    fn is_after_attribute(&self, pos: Position) -> bool {
        let mut has_whitespace = false;
        let mut cursor = self.doc.previous_position(pos);

        while let Some(at) = cursor {
            match self.doc.char_at(at) {
                Some('/' | '<') => break,
                Some(c) if c.is_whitespace() => has_whitespace = true,
                _ => {
                    let chain = self.doc.scopes_at(at);
                    if chain.len() > 1 {
                        return has_whitespace && self.is_attribute_or_tag_name(&chain);
                    }
                }
            }

            if at.column == 0 {
                break;
            }
            cursor = self.doc.previous_position(at);
        }
        false
    }

    // ==================== Scope helpers ====================

    fn is_tag_at(&self, pos: Position) -> bool {
        matches!(
            self.classifier.region_for(&self.doc.scopes_at(pos)),
            Some(ScopeKind::Tag { .. })
        )
    }

    /// Inside a tag but on none of its tokens, e.g. between attributes.
    fn is_tag_interior(&self, chain: &ScopeChain) -> bool {
        chain.innermost().is_some_and(|scope| {
            matches!(self.classifier.region(scope), Some(ScopeKind::Tag { .. }))
                && !self.classifier.is_tag_name(scope)
        })
    }

    fn is_open_tag_end(&self, chain: &ScopeChain) -> bool {
        chain.iter().any(|scope| {
            self.classifier.token(scope).is_some_and(|token| {
                matches!(
                    token.kind,
                    TokenKind::OpenTagEnd | TokenKind::OpenTagEndSelfClose
                )
            })
        })
    }

    /// An attribute name or quoted value, a tag name or an expression.
    fn is_attribute_or_tag_name(&self, chain: &ScopeChain) -> bool {
        chain.iter().any(|scope| {
            scope.ends_with(".js")
                || self.classifier.is_tag_name(scope)
                || matches!(
                    self.classifier.region(scope),
                    Some(ScopeKind::AttrName | ScopeKind::String)
                )
        })
    }

    // ==================== Line slices ====================

    fn line_before(&self, pos: Position) -> String {
        self.doc.line_text(pos.row).chars().take(pos.column).collect()
    }

    /// Row text up to and including the character at `pos`.
    fn line_through(&self, pos: Position) -> String {
        self.doc.line_text(pos.row).chars().take(pos.column + 1).collect()
    }

    fn line_from(&self, pos: Position) -> String {
        self.doc.line_text(pos.row).chars().skip(pos.column).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marko_syntax::MarkoScopeClassifier;
    use proptest::prelude::*;

    fn inspect(text: &str, pos: Position) -> InspectionResult {
        let doc = Document::marko(text);
        AutocompleteInspector::new(&doc, &MarkoScopeClassifier).inspect(pos)
    }

    #[test]
    fn test_partial_tag_name() {
        let result = inspect("<di", Position::new(0, 3));
        assert_eq!(result.completion, Some(CompletionType::TagStart));
        assert_eq!(result.prefix, "di");
        assert_eq!(result.tag_name.as_deref(), Some("di"));
        assert_eq!(result.should_complete_ending_tag, Some(true));
        assert!(!result.concise);
    }

    #[test]
    fn test_after_tag_name_and_space() {
        let result = inspect("<div ", Position::new(0, 5));
        assert_eq!(result.completion, Some(CompletionType::AttrName));
        assert_eq!(result.prefix, "");
        assert_eq!(result.tag_name.as_deref(), Some("div"));
        assert_eq!(result.attribute_name, None);
    }

    #[test]
    fn test_space_before_existing_bracket() {
        let result = inspect("<div >", Position::new(0, 5));
        assert_eq!(result.completion, Some(CompletionType::AttrName));
    }

    #[test]
    fn test_next_attribute_after_quoted_value() {
        let result = inspect(r#"<div class="a" "#, Position::new(0, 15));
        assert_eq!(result.completion, Some(CompletionType::AttrName));
        assert_eq!(result.tag_name.as_deref(), Some("div"));
        assert_eq!(result.attribute_name, None);
        assert_eq!(result.prefix, "");

        let result = inspect(r#"<div title="é" "#, Position::new(0, 15));
        assert_eq!(result.completion, Some(CompletionType::AttrName));
        assert_eq!(result.tag_name.as_deref(), Some("div"));
    }

    #[test]
    fn test_next_attribute_before_bracket() {
        let result = inspect(r#"<div class="a" >"#, Position::new(0, 15));
        assert_eq!(result.completion, Some(CompletionType::AttrName));
        assert_eq!(result.tag_name.as_deref(), Some("div"));
        assert_eq!(result.attribute_name, None);
    }

    #[test]
    fn test_text_after_tag_is_not_attribute() {
        let result = inspect(r#"<div class="a">x "#, Position::new(0, 17));
        assert_eq!(result.completion, None);
    }

    #[test]
    fn test_partial_attribute_name() {
        let result = inspect("<div cl", Position::new(0, 7));
        assert_eq!(result.completion, Some(CompletionType::AttrName));
        assert_eq!(result.attribute_name.as_deref(), Some("cl"));
        assert_eq!(result.tag_name.as_deref(), Some("div"));
        assert_eq!(result.prefix, "cl");
        assert_eq!(result.should_complete_attribute_value, Some(true));
    }

    #[test]
    fn test_attribute_with_value_present() {
        let result = inspect(r#"<div cl="x">"#, Position::new(0, 7));
        assert_eq!(result.completion, Some(CompletionType::AttrName));
        assert_eq!(result.should_complete_attribute_value, Some(false));
    }

    #[test]
    fn test_attribute_value() {
        let result = inspect(r#"<div foo=""#, Position::new(0, 10));
        assert_eq!(result.completion, Some(CompletionType::AttrValue));
        assert_eq!(result.attribute_name.as_deref(), Some("foo"));
        assert_eq!(result.tag_name.as_deref(), Some("div"));
        assert_eq!(result.prefix, "");

        let result = inspect(r#"<button type="su"#, Position::new(0, 16));
        assert_eq!(result.completion, Some(CompletionType::AttrValue));
        assert_eq!(result.attribute_name.as_deref(), Some("type"));
        assert_eq!(result.prefix, "su");
    }

    #[test]
    fn test_ending_tag() {
        let text = "<div>\n</";
        let result = inspect(text, Position::new(1, 2));
        assert_eq!(result.completion, Some(CompletionType::TagEnd));
        assert_eq!(result.tag_name.as_deref(), Some("div"));
        assert_eq!(result.should_complete_ending_tag, Some(true));
        assert_eq!(result.prefix, "");
    }

    #[test]
    fn test_ending_tag_with_partial_name() {
        let result = inspect("<section>\n</sec>", Position::new(1, 5));
        assert_eq!(result.completion, Some(CompletionType::TagEnd));
        assert_eq!(result.tag_name.as_deref(), Some("sec"));
        assert_eq!(result.should_complete_ending_tag, Some(false));
        assert_eq!(result.prefix, "sec");
    }

    #[test]
    fn test_shorthand_tag() {
        let result = inspect("<div.foo", Position::new(0, 8));
        assert_eq!(result.completion, Some(CompletionType::TagStart));
        assert_eq!(result.tag_name.as_deref(), Some("div"));
        assert!(result.has_shorthand);
        assert_eq!(result.prefix, "div.foo");
    }

    #[test]
    fn test_concise_tag() {
        let result = inspect("ul", Position::new(0, 2));
        assert_eq!(result.completion, Some(CompletionType::TagStart));
        assert!(result.concise);
        assert_eq!(result.syntax(), "concise");
        assert_eq!(result.should_complete_ending_tag, None);
    }

    #[test]
    fn test_bare_open_bracket() {
        let result = inspect("<p>hi</p>\n<", Position::new(1, 1));
        assert_eq!(result.completion, Some(CompletionType::TagStart));
        assert_eq!(result.should_complete_ending_tag, Some(true));
    }

    #[test]
    fn test_plain_text_has_no_completion() {
        let result = inspect("<div>hello wor", Position::new(0, 14));
        assert_eq!(result.completion, None);
        assert!(!result.needs_taglib());
    }

    #[test]
    fn test_needs_taglib() {
        let mut result = InspectionResult {
            completion: Some(CompletionType::TagStart),
            ..InspectionResult::default()
        };
        assert!(result.needs_taglib());
        result.has_shorthand = true;
        assert!(!result.needs_taglib());
    }

    proptest! {
        #[test]
        fn test_inspect_is_idempotent(row in 0usize..4, column in 0usize..30) {
            let doc = Document::marko(
                "<div class=\"a\">\n  <my-tag foo=\"b\"/>\n</div>\nul.list\n",
            );
            let inspector = AutocompleteInspector::new(&doc, &MarkoScopeClassifier);
            let pos = Position::new(row, column.min(doc.line_text(row).chars().count()));
            prop_assert_eq!(inspector.inspect(pos), inspector.inspect(pos));
        }
    }
}
