//! # Marko Assist
//!
//! On-demand editing aids for Marko templates: completion and
//! jump-to-definition.
//!
//! ## Architecture Overview
//!
//! ```text
//!   Document + cursor
//!        │
//!        ├──► AutocompleteInspector ──► InspectionResult ──► SuggestionsBuilder ──► Vec<Suggestion>
//!        │                                                        ▲
//!        │                                          TaglibLookup ─┤ FuzzyScorer
//!        │
//!        └──► HyperclickInspector ──► ClickInspection ──► navigation::resolve ──► NavigationTarget
//! ```
//!
//! [`Assistant`] wires both paths to a configuration and a [`TaglibCache`].
//!
//! ## Learning: Borrowed Inspectors
//!
//! The inspectors borrow the document and classifier for one request and
//! own nothing. Asking the same question twice against the same document
//! gives the same answer, and nothing needs cleaning up afterwards.
//!
//! [`TaglibCache`]: marko_taglib::TaglibCache

mod assistant;
pub mod autocomplete;
pub mod fuzzy;
pub mod hyperclick;
pub mod navigation;
pub mod suggestions;

pub use assistant::Assistant;
pub use autocomplete::{AutocompleteInspector, CompletionType, InspectionResult};
pub use fuzzy::{FuzzyScorer, JaroWinklerScorer};
pub use hyperclick::{ClickInspection, ClickTarget, HyperclickInspector};
pub use navigation::{Landing, NavigationKind, NavigationTarget};
pub use suggestions::{Suggestion, SuggestionKind, SuggestionsBuilder};

use std::path::PathBuf;

/// Result type for assist requests
pub type AssistResult<T> = Result<T, AssistError>;

/// Errors that can occur while answering a request
#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("Taglib error: {0}")]
    Taglib(#[from] marko_taglib::TaglibError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
