//! Grammars: text in, scope map out.
//!
//! [`MarkoGrammar`] is a small hand-written lexer that assigns the same scope
//! names the Marko TextMate grammar uses to the constructs tag tooling cares
//! about: tag delimiters, tag names (HTML and concise), attribute names,
//! `=` separators and quoted strings. Everything from a tag's `<` to its `>`
//! (or a concise tag's line) is also wrapped in a `meta.tag.*` scope.
//! Everything else is left with the root scope only. It is line based, carrying state across rows for constructs
//! that may span lines (open tags, strings, comments, script bodies).

use std::path::Path;
use std::sync::Arc;

use crate::{ScopeMap, SyntaxError, SyntaxResult};

/// Scope names emitted by [`MarkoGrammar`].
pub mod scopes {
    pub const MARKO_ROOT: &str = "text.marko";
    pub const PLAIN_ROOT: &str = "text.plain";

    pub const TAG_BEGIN_OPEN: &str = "punctuation.definition.marko-tag.begin.open.html";
    pub const TAG_BEGIN_CLOSE: &str = "punctuation.definition.marko-tag.begin.close.html";
    pub const TAG_END_OPEN: &str = "punctuation.definition.marko-tag.end.open.html";
    pub const TAG_END_CLOSE: &str = "punctuation.definition.marko-tag.end.close.html";
    pub const TAG_END_SELF_CLOSE: &str = "punctuation.definition.marko-tag.end.self-close.html";

    pub const TAG_NAME: &str = "entity.name.tag.html";
    pub const TAG_NAME_CLOSE: &str = "entity.name.tag.close.html";
    pub const TAG_NAME_CONCISE: &str = "entity.name.tag.concise";

    pub const META_TAG_OPEN: &str = "meta.tag.open.html";
    pub const META_TAG_CLOSE: &str = "meta.tag.close.html";
    pub const META_TAG_CONCISE: &str = "meta.tag.concise";

    pub const ATTR_NAME: &str = "entity.other.attribute-name.html";
    pub const KEY_VALUE: &str = "punctuation.separator.key-value.html";

    pub const STRING_DOUBLE: &str = "string.quoted.double.html";
    pub const STRING_SINGLE: &str = "string.quoted.single.html";
    pub const STRING_BEGIN: &str = "punctuation.definition.string.begin.html";
    pub const STRING_END: &str = "punctuation.definition.string.end.html";

    pub const SOURCE_JS: &str = "source.js";
    pub const SOURCE_CSS: &str = "source.css";
    pub const COMMENT_BLOCK: &str = "comment.block.html";
    pub const COMMENT_LINE: &str = "comment.line.double-slash.js";
}

use scopes::*;

/// A grammar assigns scopes to every position of a document.
pub trait Grammar: Send + Sync + std::fmt::Debug {
    /// Root scope name, e.g. `text.marko`.
    fn scope_name(&self) -> &'static str;

    /// Human readable name.
    fn name(&self) -> &'static str;

    /// File extensions handled by this grammar.
    fn file_types(&self) -> &'static [&'static str];

    /// Scopes for `text`.
    fn tokenize(&self, text: &str) -> ScopeMap;
}

/// Fallback grammar: every position carries only `text.plain`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextGrammar;

impl Grammar for PlainTextGrammar {
    fn scope_name(&self) -> &'static str {
        PLAIN_ROOT
    }

    fn name(&self) -> &'static str {
        "Plain Text"
    }

    fn file_types(&self) -> &'static [&'static str] {
        &["txt"]
    }

    fn tokenize(&self, text: &str) -> ScopeMap {
        let mut map = ScopeMap::new(PLAIN_ROOT);
        for line in lines(text) {
            map.push_row(line.chars().count());
        }
        map
    }
}

/// Scope tokenizer for Marko templates (HTML and concise syntax).
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkoGrammar;

impl Grammar for MarkoGrammar {
    fn scope_name(&self) -> &'static str {
        MARKO_ROOT
    }

    fn name(&self) -> &'static str {
        "Marko"
    }

    fn file_types(&self) -> &'static [&'static str] {
        &["marko"]
    }

    fn tokenize(&self, text: &str) -> ScopeMap {
        let mut map = ScopeMap::new(MARKO_ROOT);
        let mut lexer = Lexer::default();
        for line in lines(text) {
            let chars: Vec<char> = line.chars().collect();
            map.push_row(chars.len());
            lexer.lex_line(&chars, &mut map);
        }
        map
    }
}

/// Rows as the buffer sees them, without terminators.
fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

// ==================== Lexer ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Script,
    Style,
}

/// What follows the `>` of an open tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    Nested,
    Void,
    Raw(RawKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TagState {
    side: Side,
    concise: bool,
    body: Body,
}

impl TagState {
    /// Outer scope of everything inside the tag.
    fn meta(self) -> &'static str {
        match (self.side, self.concise) {
            (_, true) => META_TAG_CONCISE,
            (Side::Open, false) => META_TAG_OPEN,
            (Side::Close, false) => META_TAG_CLOSE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Content,
    Tag(TagState),
    Str {
        quote: char,
        tag: TagState,
    },
    Comment,
    Raw(RawKind),
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Default)]
struct Lexer {
    mode: Mode,
    /// Open HTML tags not yet closed; concise lines only start at depth 0
    depth: usize,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '@' || c == '_'
}

fn is_tag_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '_' | ':' | '-' | '.' | '#')
}

fn is_attr_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '_' | ':' | '-' | '.')
}

fn run_end(chars: &[char], from: usize, pred: impl Fn(char) -> bool) -> usize {
    chars[from..]
        .iter()
        .position(|c| !pred(*c))
        .map_or(chars.len(), |offset| from + offset)
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    let mut index = at;
    for expected in pattern.chars() {
        if chars.get(index) != Some(&expected) {
            return false;
        }
        index += 1;
    }
    true
}

fn find(chars: &[char], from: usize, pattern: &str) -> Option<usize> {
    (from..chars.len()).find(|&index| starts_with(chars, index, pattern))
}

/// Index of the closing quote, honouring backslash escapes.
fn closing_quote(chars: &[char], from: usize, quote: char) -> Option<usize> {
    let mut index = from;
    while index < chars.len() {
        match chars[index] {
            '\\' => index += 2,
            c if c == quote => return Some(index),
            _ => index += 1,
        }
    }
    None
}

fn string_scope(quote: char) -> &'static str {
    if quote == '\'' {
        STRING_SINGLE
    } else {
        STRING_DOUBLE
    }
}

impl Lexer {
    fn lex_line(&mut self, chars: &[char], map: &mut ScopeMap) {
        let mut index = 0;
        if self.mode == Mode::Content && self.depth == 0 {
            index = self.lex_line_start(chars, map);
        }

        while index < chars.len() {
            index = match self.mode {
                Mode::Content => self.lex_content(chars, index, map),
                Mode::Tag(tag) => self.lex_tag(chars, index, tag, map),
                Mode::Str { quote, tag } => self.lex_string(chars, index, quote, tag, map),
                Mode::Comment => self.lex_comment(chars, index, map),
                Mode::Raw(kind) => self.lex_raw(chars, index, kind, map),
            };
        }

        // Concise tags end with their line
        match self.mode {
            Mode::Tag(tag) | Mode::Str { tag, .. } if tag.concise => self.mode = Mode::Content,
            _ => {}
        }
    }

    /// Detects concise syntax at the start of a top-level line.
    fn lex_line_start(&mut self, chars: &[char], map: &mut ScopeMap) -> usize {
        let indent = run_end(chars, 0, char::is_whitespace);
        let rest = &chars[indent..];

        match rest {
            [] => chars.len(),
            ['/', '/', ..] => {
                map.push_span(indent, chars.len(), &[COMMENT_LINE]);
                chars.len()
            }
            ['-', '-', ..] => indent + 2,
            ['|', ..] => indent + 1,
            [first, second, ..] if matches!(*first, '.' | '#') && is_name_start(*second) => {
                self.lex_concise_name(chars, indent, map)
            }
            [first, ..] if is_name_start(*first) => self.lex_concise_name(chars, indent, map),
            _ => indent,
        }
    }

    fn lex_concise_name(&mut self, chars: &[char], start: usize, map: &mut ScopeMap) -> usize {
        let end = run_end(chars, start, is_tag_name_char);
        map.push_span(start, end, &[TAG_NAME_CONCISE, META_TAG_CONCISE]);
        self.mode = Mode::Tag(TagState {
            side: Side::Open,
            concise: true,
            body: Body::Void,
        });
        end
    }

    fn lex_content(&mut self, chars: &[char], index: usize, map: &mut ScopeMap) -> usize {
        if starts_with(chars, index, "<!--") {
            map.push_span(index, index + 4, &[COMMENT_BLOCK]);
            self.mode = Mode::Comment;
            return index + 4;
        }

        // A bare `<` or `</` stays text until a name follows
        let name_follows =
            |offset: usize| chars.get(index + offset).copied().is_some_and(is_name_start);

        if starts_with(chars, index, "</") && name_follows(2) {
            map.push_span(index, index + 2, &[TAG_BEGIN_CLOSE, META_TAG_CLOSE]);
            let end = run_end(chars, index + 2, is_tag_name_char);
            map.push_span(index + 2, end, &[TAG_NAME_CLOSE, META_TAG_CLOSE]);
            self.mode = Mode::Tag(TagState {
                side: Side::Close,
                concise: false,
                body: Body::Nested,
            });
            return end;
        }

        if chars[index] == '<' {
            if name_follows(1) {
                map.push_span(index, index + 1, &[TAG_BEGIN_OPEN, META_TAG_OPEN]);
                let end = run_end(chars, index + 1, is_tag_name_char);
                map.push_span(index + 1, end, &[TAG_NAME, META_TAG_OPEN]);

                let name: String = chars[index + 1..end].iter().collect();
                let base = name.split(['.', '#']).next().unwrap_or_default();
                let body = match base {
                    "script" => Body::Raw(RawKind::Script),
                    "style" => Body::Raw(RawKind::Style),
                    _ if VOID_TAGS.contains(&base) => Body::Void,
                    _ => Body::Nested,
                };
                self.mode = Mode::Tag(TagState {
                    side: Side::Open,
                    concise: false,
                    body,
                });
                return end;
            }
            return index + 1;
        }

        if starts_with(chars, index, "${") {
            return self.lex_balanced(chars, index + 1, '{', '}', map, None);
        }

        // Plain text up to the next construct
        (index + 1..chars.len())
            .find(|&i| chars[i] == '<' || chars[i] == '$')
            .unwrap_or(chars.len())
    }

    fn lex_tag(&mut self, chars: &[char], index: usize, tag: TagState, map: &mut ScopeMap) -> usize {
        let c = chars[index];
        let meta = tag.meta();

        if c.is_whitespace() {
            let end = run_end(chars, index, char::is_whitespace);
            map.push_span(index, end, &[meta]);
            return end;
        }

        if tag.concise && starts_with(chars, index, "--") {
            return chars.len();
        }

        if tag.side == Side::Open && !tag.concise && starts_with(chars, index, "/>") {
            map.push_span(index, index + 2, &[TAG_END_SELF_CLOSE, meta]);
            self.mode = Mode::Content;
            return index + 2;
        }

        if c == '>' && !tag.concise {
            match tag.side {
                Side::Open => {
                    map.push_span(index, index + 1, &[TAG_END_OPEN, meta]);
                    self.mode = match tag.body {
                        Body::Nested => {
                            self.depth += 1;
                            Mode::Content
                        }
                        Body::Void => Mode::Content,
                        Body::Raw(kind) => {
                            self.depth += 1;
                            Mode::Raw(kind)
                        }
                    };
                }
                Side::Close => {
                    map.push_span(index, index + 1, &[TAG_END_CLOSE, meta]);
                    self.depth = self.depth.saturating_sub(1);
                    self.mode = Mode::Content;
                }
            }
            return index + 1;
        }

        if c == '<' {
            // Unterminated tag: let content lexing take over
            self.mode = Mode::Content;
            return index;
        }

        if c == '=' {
            map.push_span(index, index + 1, &[KEY_VALUE, meta]);
            let value = run_end(chars, index + 1, |c| c == ' ' || c == '\t');
            map.push_span(index + 1, value, &[meta]);
            return match chars.get(value) {
                Some('"' | '\'') => self.open_string(chars, value, tag, map),
                Some(_) => self.lex_unquoted_value(chars, value, meta, map),
                None => value,
            };
        }

        if c == '"' || c == '\'' {
            return self.open_string(chars, index, tag, map);
        }

        if c == '(' {
            return self.lex_balanced(chars, index, '(', ')', map, Some(meta));
        }

        if starts_with(chars, index, "${") {
            map.push_span(index, index + 1, &[SOURCE_JS, meta]);
            return self.lex_balanced(chars, index + 1, '{', '}', map, Some(meta));
        }

        if is_attr_name_char(c) {
            let end = run_end(chars, index, is_attr_name_char);
            map.push_span(index, end, &[ATTR_NAME, meta]);
            return end;
        }

        map.push_span(index, index + 1, &[meta]);
        index + 1
    }

    fn open_string(&mut self, chars: &[char], index: usize, tag: TagState, map: &mut ScopeMap) -> usize {
        let quote = chars[index];
        map.push_span(index, index + 1, &[STRING_BEGIN, string_scope(quote), tag.meta()]);
        self.mode = Mode::Str { quote, tag };
        index + 1
    }

    fn lex_string(
        &mut self,
        chars: &[char],
        index: usize,
        quote: char,
        tag: TagState,
        map: &mut ScopeMap,
    ) -> usize {
        let scope = string_scope(quote);
        let meta = tag.meta();
        match closing_quote(chars, index, quote) {
            Some(close) => {
                map.push_span(index, close, &[scope, meta]);
                map.push_span(close, close + 1, &[STRING_END, scope, meta]);
                self.mode = Mode::Tag(tag);
                close + 1
            }
            None => {
                map.push_span(index, chars.len(), &[scope, meta]);
                chars.len()
            }
        }
    }

    /// Attribute value without quotes: a JavaScript expression.
    fn lex_unquoted_value(
        &mut self,
        chars: &[char],
        index: usize,
        meta: &'static str,
        map: &mut ScopeMap,
    ) -> usize {
        let mut depth = 0usize;
        let mut end = index;
        while end < chars.len() {
            let c = chars[end];
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ if depth == 0 && (c.is_whitespace() || c == '>') => break,
                '/' if depth == 0 && chars.get(end + 1) == Some(&'>') => break,
                _ => {}
            }
            end += 1;
        }
        map.push_span(index, end, &[SOURCE_JS, meta]);
        end
    }

    /// A bracketed JavaScript chunk on one line, strings scoped inside.
    /// Only scoped when `meta` names the enclosing tag.
    fn lex_balanced(
        &mut self,
        chars: &[char],
        index: usize,
        open: char,
        close: char,
        map: &mut ScopeMap,
        meta: Option<&'static str>,
    ) -> usize {
        let mut depth = 0usize;
        let mut cursor = index;
        while cursor < chars.len() {
            let c = chars[cursor];
            if c == '"' || c == '\'' {
                let scope = string_scope(c);
                let end = closing_quote(chars, cursor + 1, c).unwrap_or(chars.len());
                if let Some(meta) = meta {
                    map.push_span(cursor, cursor + 1, &[STRING_BEGIN, scope, SOURCE_JS, meta]);
                    map.push_span(cursor + 1, end, &[scope, SOURCE_JS, meta]);
                    if end < chars.len() {
                        map.push_span(end, end + 1, &[STRING_END, scope, SOURCE_JS, meta]);
                    }
                }
                cursor = (end + 1).min(chars.len());
                continue;
            }

            if let Some(meta) = meta {
                map.push_span(cursor, cursor + 1, &[SOURCE_JS, meta]);
            }
            cursor += 1;
            if c == open {
                depth += 1;
            } else if c == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
        }
        cursor
    }

    fn lex_comment(&mut self, chars: &[char], index: usize, map: &mut ScopeMap) -> usize {
        match find(chars, index, "-->") {
            Some(end) => {
                map.push_span(index, end + 3, &[COMMENT_BLOCK]);
                self.mode = Mode::Content;
                end + 3
            }
            None => {
                map.push_span(index, chars.len(), &[COMMENT_BLOCK]);
                chars.len()
            }
        }
    }

    fn lex_raw(&mut self, chars: &[char], index: usize, kind: RawKind, map: &mut ScopeMap) -> usize {
        let (terminator, scope) = match kind {
            RawKind::Script => ("</script", SOURCE_JS),
            RawKind::Style => ("</style", SOURCE_CSS),
        };
        match find(chars, index, terminator) {
            Some(end) => {
                map.push_span(index, end, &[scope]);
                self.mode = Mode::Content;
                end
            }
            None => {
                map.push_span(index, chars.len(), &[scope]);
                chars.len()
            }
        }
    }
}

// ==================== Registry ====================

/// Known grammars, looked up by scope name or file extension.
#[derive(Debug, Clone)]
pub struct GrammarRegistry {
    grammars: Vec<Arc<dyn Grammar>>,
}

impl GrammarRegistry {
    /// A registry with the Marko and plain text grammars.
    pub fn new() -> Self {
        Self {
            grammars: vec![Arc::new(MarkoGrammar), Arc::new(PlainTextGrammar)],
        }
    }

    /// Finds a grammar by root scope name.
    pub fn by_scope(&self, scope_name: &str) -> SyntaxResult<Arc<dyn Grammar>> {
        self.grammars
            .iter()
            .find(|grammar| grammar.scope_name() == scope_name)
            .cloned()
            .ok_or_else(|| SyntaxError::UnknownGrammar(scope_name.to_string()))
    }

    /// Picks a grammar from a file extension, falling back to plain text.
    pub fn for_path(&self, path: &Path) -> Arc<dyn Grammar> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match self
            .grammars
            .iter()
            .find(|grammar| grammar.file_types().contains(&extension))
        {
            Some(grammar) => {
                tracing::debug!("Using {} grammar for {}", grammar.name(), path.display());
                Arc::clone(grammar)
            }
            None => {
                tracing::debug!("No grammar for {}, using plain text", path.display());
                Arc::new(PlainTextGrammar)
            }
        }
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}
