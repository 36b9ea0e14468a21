//! Tag tooling built on scope-classified tokens.
//!
//! ```text
//! TokenScanner ──► tag_at (locator) ──► TagMatcher
//!   regex + scopes     one TagSpan        Tag markers, MatchedTags,
//!                                         partner search, rename sync
//! ```
//!
//! Nothing here parses a whole document. Every question ("which tag is
//! under the cursor", "where is its partner") is answered by scanning
//! tokens outward from a position and stopping as soon as the answer is
//! known.
//!
//! ## Learning: Values vs. Resources
//!
//! [`TagSpan`] is a plain value: locating or scanning tags never touches the
//! document's marker arena. Only when the matcher decides to highlight does
//! it turn spans into [`Tag`]s, which own markers and must be released.

mod locator;
mod matched;
mod matcher;
mod scanner;
mod tag;

pub use locator::{TagKind, TagSpan, tag_at};
pub use matched::{MatchedTags, Side};
pub use matcher::{MatchState, TagMatcher};
pub use scanner::TokenScanner;
pub use tag::Tag;

use marko_buffer::Position;

/// Result type for tag location
pub type LocateResult<T> = Result<T, LocateError>;

/// Token orderings that should not occur in tokenized markup.
///
/// These abort the current lookup only; the next event starts over.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocateError {
    #[error("no start delimiter before {0}")]
    MissingStart(Position),

    #[error("no tag name for the delimiter at {0}")]
    MissingName(Position),
}
