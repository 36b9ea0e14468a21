//! # Marko Taglib
//!
//! Tag and attribute metadata for a Marko project: which custom tags exist,
//! which attributes they take, and where each one is defined.
//!
//! ## Architecture Overview
//!
//! ```text
//!   template dir ──► project::find_root ──► TaglibCache ──► Arc<Taglib>
//!                                               │
//!                         ┌─────────────────────┼──────────────────────┐
//!                         ▼                     ▼                      ▼
//!                  built-in HTML        node_modules/*/marko.json   <root>/marko.json
//! ```
//!
//! ## Learning: Trait Objects at the Boundary
//!
//! Consumers only need three questions answered (sorted tags, attributes of
//! a tag, one attribute), so they depend on the [`TaglibLookup`] trait.
//! [`Taglib`] is the JSON-backed implementation; tests can supply their own.

mod cache;
mod json;
mod model;
pub mod project;

pub use cache::{LoadOptions, TaglibCache};
pub use json::{Taglib, builtin_html};
pub use model::{AttrDef, AutocompleteEntry, EnumValue, GLOBAL_TAG, TagDef, TagFiles, TaglibLookup};

use std::path::PathBuf;

/// Result type for taglib operations
pub type TaglibResult<T> = Result<T, TaglibError>;

/// Errors that can occur while loading taglibs
#[derive(Debug, thiserror::Error)]
pub enum TaglibError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid taglib {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Taglib {0} must be a JSON object")]
    NotAnObject(PathBuf),
}
