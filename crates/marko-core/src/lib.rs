//! # Marko Core
//!
//! Editing sessions for Marko templates and the tag matching that runs in
//! them.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Editor                            │
//! │  ┌────────────┐ ┌────────────┐ ┌───────────┐ ┌──────────┐ │
//! │  │  Document  │ │ TagMatcher │ │ Scheduler │ │ EventBus │ │
//! │  │ buffer +   │ │ MatchedTags│ │ deferred  │ │ outward  │ │
//! │  │ scopes     │ │ Tag markers│ │ tasks     │ │ events   │ │
//! │  └────────────┘ └────────────┘ └───────────┘ └──────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Learning: Module Organization
//!
//! Rust modules map to files:
//! - `mod foo;` looks for `foo.rs` or `foo/mod.rs`
//! - `pub use` re-exports items for cleaner public APIs

pub mod config;
pub mod document;
pub mod editor;
pub mod event;
pub mod scheduler;
pub mod tags;

pub use config::Config;
pub use document::{Document, DocumentId};
pub use editor::Editor;
pub use event::{EditorEvent, EventBus, EventStream};
pub use scheduler::{DeferredTask, Scheduler};
pub use tags::{
    LocateError, MatchState, MatchedTags, Side, Tag, TagKind, TagMatcher, TagSpan, TokenScanner,
    tag_at,
};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer error: {0}")]
    Buffer(#[from] marko_buffer::BufferError),

    #[error("Syntax error: {0}")]
    Syntax(#[from] marko_syntax::SyntaxError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Tag lookup failed: {0}")]
    Locate(#[from] LocateError),

    #[error("Document has no file path")]
    NoFilePath,
}
