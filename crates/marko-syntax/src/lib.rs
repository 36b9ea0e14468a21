//! # Marko Syntax
//!
//! Scope names for Marko templates and the classification rules built on top
//! of them.
//!
//! ## Why scopes?
//!
//! Tag tooling never builds a syntax tree. It asks "which scopes cover this
//! position" and classifies the answer:
//! - **Cheap**: a scope lookup is a binary search over one row's spans
//! - **Tolerant**: half-typed markup still gets scopes
//! - **Pluggable**: any highlighter's names work behind [`ScopeClassifier`]
//!
//! ## Learning: Trait Objects
//!
//! `Arc<dyn Grammar>` lets a document switch grammars at runtime without
//! being generic over the grammar type. The `dyn` keyword marks dynamic
//! dispatch through a vtable.

mod classify;
mod grammar;
mod scope;

pub use classify::{MarkoScopeClassifier, ScopeClassifier, ScopeKind, Token, TokenKind};
pub use grammar::{Grammar, GrammarRegistry, MarkoGrammar, PlainTextGrammar, scopes};
pub use scope::{ScopeChain, ScopeMap, ScopeProvider, ScopeSpan};

/// Result type for syntax operations
pub type SyntaxResult<T> = Result<T, SyntaxError>;

/// Errors that can occur when resolving grammars.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("Unknown grammar: {0}")]
    UnknownGrammar(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use marko_buffer::Position;
    use proptest::prelude::*;

    proptest! {
        // Every position of any input has a chain ending in the root scope.
        #[test]
        fn test_root_scope_always_last(text in "[<>/a-z =\"\\n.#-]{0,64}", row in 0usize..6, column in 0usize..20) {
            let map = MarkoGrammar.tokenize(&text);
            let chain = map.scopes_at(Position::new(row, column));
            prop_assert_eq!(chain.names().last().map(String::as_str), Some(scopes::MARKO_ROOT));
        }
    }

    #[test]
    fn test_tokenized_tag_classifies() {
        let map = MarkoGrammar.tokenize("<a></a>");
        let classifier = MarkoScopeClassifier;
        let kinds: Vec<_> = (0..7)
            .map(|column| {
                classifier
                    .token_for(&map.scopes_at(Position::new(0, column)))
                    .map(|token| token.kind)
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                Some(TokenKind::OpenTagStart),
                Some(TokenKind::OpenTagName),
                Some(TokenKind::OpenTagEnd),
                Some(TokenKind::CloseTagStart),
                Some(TokenKind::CloseTagStart),
                Some(TokenKind::CloseTagName),
                Some(TokenKind::CloseTagEnd),
            ]
        );
    }
}
