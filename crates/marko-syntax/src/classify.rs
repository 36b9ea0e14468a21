//! Scope classification.
//!
//! Turns raw scope names into the two kinds of signal the tag tools need:
//!
//! - **Tokens** drive structural tag scanning (`<`, `</`, `>`, `/>`, tag
//!   names, attribute names).
//! - **Regions** drive cursor-context inspection (inside a tag name, a
//!   string, an attribute name or on a `=` separator).
//!
//! ## Learning: Traits as Seams
//!
//! `ScopeClassifier` is a trait so the scanning logic never depends on one
//! particular highlighter's naming scheme. Tests can plug in a classifier
//! with made-up names; [`MarkoScopeClassifier`] implements the Marko grammar's
//! names.

use serde::Serialize;

use crate::ScopeChain;

/// Structural token kinds recognized while scanning tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// `<`
    OpenTagStart,
    /// `</`
    CloseTagStart,
    /// `>` ending an open tag
    OpenTagEnd,
    /// `/>`
    OpenTagEndSelfClose,
    /// `>` ending a close tag
    CloseTagEnd,
    OpenTagName,
    CloseTagName,
    AttrName,
}

impl TokenKind {
    /// `<` or `</`.
    pub fn is_start(self) -> bool {
        matches!(self, TokenKind::OpenTagStart | TokenKind::CloseTagStart)
    }

    /// `>`, `/>` or a close tag's `>`.
    pub fn is_end(self) -> bool {
        matches!(
            self,
            TokenKind::OpenTagEnd | TokenKind::OpenTagEndSelfClose | TokenKind::CloseTagEnd
        )
    }

    pub fn is_name(self) -> bool {
        matches!(self, TokenKind::OpenTagName | TokenKind::CloseTagName)
    }
}

/// A classified token: its kind plus whether it belongs to concise syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub concise: bool,
}

impl Token {
    pub const fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            concise: false,
        }
    }

    pub const fn concise(kind: TokenKind) -> Self {
        Self {
            kind,
            concise: true,
        }
    }
}

/// Lexical regions recognized during cursor-context inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Tag { concise: bool },
    String,
    AttrSeparator,
    AttrName,
}

/// Maps scope names to tokens and regions.
pub trait ScopeClassifier: Send + Sync {
    /// Structural token for one scope name.
    fn token(&self, scope: &str) -> Option<Token>;

    /// Lexical region for one scope name.
    fn region(&self, scope: &str) -> Option<ScopeKind>;

    /// Whether `scope` marks a tag's own name rather than anything else
    /// inside the tag.
    fn is_tag_name(&self, scope: &str) -> bool {
        self.token(scope).is_some_and(|token| token.kind.is_name())
    }

    /// First recognized token in a chain, innermost first.
    fn token_for(&self, chain: &ScopeChain) -> Option<Token> {
        chain.iter().find_map(|scope| self.token(scope))
    }

    /// First recognized region in a chain, innermost first.
    fn region_for(&self, chain: &ScopeChain) -> Option<ScopeKind> {
        chain.iter().find_map(|scope| self.region(scope))
    }
}

/// Classifier for the scope names used by Marko grammars.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkoScopeClassifier;

const TAG_PUNCTUATION: &str = "punctuation.definition.marko-tag.";

impl MarkoScopeClassifier {
    /// Matches `punctuation.definition.marko-tag.<suffix>` with an optional `.html`.
    fn is_tag_punctuation(scope: &str, suffix: &str) -> bool {
        scope
            .strip_prefix(TAG_PUNCTUATION)
            .map(|rest| rest.strip_suffix(".html").unwrap_or(rest))
            .is_some_and(|rest| rest == suffix)
    }
}

impl ScopeClassifier for MarkoScopeClassifier {
    fn token(&self, scope: &str) -> Option<Token> {
        if Self::is_tag_punctuation(scope, "end.self-close") {
            Some(Token::new(TokenKind::OpenTagEndSelfClose))
        } else if Self::is_tag_punctuation(scope, "begin.open") {
            Some(Token::new(TokenKind::OpenTagStart))
        } else if Self::is_tag_punctuation(scope, "end.open") {
            Some(Token::new(TokenKind::OpenTagEnd))
        } else if Self::is_tag_punctuation(scope, "begin.close") {
            Some(Token::new(TokenKind::CloseTagStart))
        } else if Self::is_tag_punctuation(scope, "end.close") {
            Some(Token::new(TokenKind::CloseTagEnd))
        } else if scope.starts_with("entity.name.tag")
            || scope.starts_with("support.function.marko-tag")
        {
            if scope.ends_with(".close.html") {
                Some(Token::new(TokenKind::CloseTagName))
            } else if scope.ends_with(".concise") {
                Some(Token::concise(TokenKind::OpenTagName))
            } else {
                Some(Token::new(TokenKind::OpenTagName))
            }
        } else if scope.starts_with("entity.other.attribute-name")
            || scope.starts_with("support.function.marko-attribute")
        {
            Some(Token::new(TokenKind::AttrName))
        } else {
            None
        }
    }

    fn region(&self, scope: &str) -> Option<ScopeKind> {
        if scope.starts_with("entity.name.tag")
            || scope.starts_with("support.function.marko-tag")
            || scope.starts_with("meta.tag")
        {
            Some(ScopeKind::Tag {
                concise: scope.ends_with(".concise"),
            })
        } else if scope.starts_with("string.quoted")
            || scope.starts_with("punctuation.definition.string")
        {
            Some(ScopeKind::String)
        } else if scope.starts_with("punctuation.separator.key-value") {
            Some(ScopeKind::AttrSeparator)
        } else if scope.starts_with("entity.other.attribute-name")
            || scope.starts_with("support.function.marko-attribute")
        {
            Some(ScopeKind::AttrName)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_tokens() {
        let c = MarkoScopeClassifier;
        assert_eq!(
            c.token("punctuation.definition.marko-tag.begin.open.html"),
            Some(Token::new(TokenKind::OpenTagStart))
        );
        assert_eq!(
            c.token("punctuation.definition.marko-tag.begin.close"),
            Some(Token::new(TokenKind::CloseTagStart))
        );
        assert_eq!(
            c.token("punctuation.definition.marko-tag.end.self-close.html"),
            Some(Token::new(TokenKind::OpenTagEndSelfClose))
        );
        assert_eq!(
            c.token("punctuation.definition.marko-tag.end.close.html"),
            Some(Token::new(TokenKind::CloseTagEnd))
        );
        assert_eq!(c.token("punctuation.definition.marko-tag.end.open.js"), None);
    }

    #[test]
    fn test_tag_name_tokens() {
        let c = MarkoScopeClassifier;
        assert_eq!(
            c.token("entity.name.tag.close.html"),
            Some(Token::new(TokenKind::CloseTagName))
        );
        assert_eq!(
            c.token("entity.name.tag.concise"),
            Some(Token::concise(TokenKind::OpenTagName))
        );
        assert_eq!(
            c.token("support.function.marko-tag.html"),
            Some(Token::new(TokenKind::OpenTagName))
        );
        assert_eq!(
            c.token("support.function.marko-attribute.html"),
            Some(Token::new(TokenKind::AttrName))
        );
    }

    #[test]
    fn test_regions() {
        let c = MarkoScopeClassifier;
        assert_eq!(c.region("meta.tag.other"), Some(ScopeKind::Tag { concise: false }));
        assert_eq!(
            c.region("entity.name.tag.concise"),
            Some(ScopeKind::Tag { concise: true })
        );
        assert_eq!(
            c.region("punctuation.definition.string.begin.html"),
            Some(ScopeKind::String)
        );
        assert_eq!(
            c.region("punctuation.separator.key-value.html"),
            Some(ScopeKind::AttrSeparator)
        );
        assert_eq!(c.region("text.marko"), None);
    }

    #[test]
    fn test_tag_interior_is_not_a_name() {
        let c = MarkoScopeClassifier;
        assert!(c.is_tag_name("entity.name.tag.close.html"));
        assert!(c.is_tag_name("entity.name.tag.concise"));
        assert!(!c.is_tag_name("meta.tag.open.html"));
        assert!(!c.is_tag_name("entity.other.attribute-name.html"));
    }

    #[test]
    fn test_chain_takes_first_recognized() {
        let c = MarkoScopeClassifier;
        let chain = ScopeChain::from_names([
            "punctuation.definition.string.begin.html",
            "string.quoted.double.html",
            "entity.other.attribute-name.html",
            "text.marko",
        ]);
        assert_eq!(c.region_for(&chain), Some(ScopeKind::String));
        assert_eq!(c.token_for(&chain), Some(Token::new(TokenKind::AttrName)));
    }

    struct Labels;

    impl ScopeClassifier for Labels {
        fn token(&self, scope: &str) -> Option<Token> {
            (scope == "open").then_some(Token::new(TokenKind::OpenTagStart))
        }

        fn region(&self, _scope: &str) -> Option<ScopeKind> {
            None
        }
    }

    #[test]
    fn test_custom_classifier_plugs_in() {
        let chain = ScopeChain::from_names(["open", "root"]);
        assert_eq!(
            Labels.token_for(&chain).map(|t| t.kind),
            Some(TokenKind::OpenTagStart)
        );
    }
}
