//! Scope chains and per-position scope maps.
//!
//! A scope chain is the ordered list of scope names covering one buffer
//! position, innermost first, with the grammar's root scope always last.

use marko_buffer::Position;
use serde::Serialize;

/// Scope names covering a single position, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeChain(Vec<String>);

impl ScopeChain {
    /// A chain holding only the root scope.
    pub fn root(root: &str) -> Self {
        Self(vec![root.to_string()])
    }

    /// Builds a chain from innermost-first names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// All names, innermost first.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Iterates names innermost first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The innermost scope name.
    pub fn innermost(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Returns true when the only scope is `root`.
    pub fn is_only(&self, root: &str) -> bool {
        self.0.len() == 1 && self.0[0] == root
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A run of characters on one row sharing the same nested scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSpan {
    /// First column covered
    pub start: usize,
    /// Column after the last one covered
    pub end: usize,
    /// Nested scopes, innermost first, root excluded
    pub scopes: Vec<&'static str>,
}

/// Scope spans for a whole document, as produced by a grammar.
#[derive(Debug, Clone)]
pub struct ScopeMap {
    root: &'static str,
    rows: Vec<Vec<ScopeSpan>>,
    line_lengths: Vec<usize>,
}

impl ScopeMap {
    /// An empty map for `root`.
    pub fn new(root: &'static str) -> Self {
        Self {
            root,
            rows: Vec::new(),
            line_lengths: Vec::new(),
        }
    }

    /// The root scope name.
    pub fn root(&self) -> &'static str {
        self.root
    }

    /// Starts a new row of `len` characters.
    pub fn push_row(&mut self, len: usize) {
        self.rows.push(Vec::new());
        self.line_lengths.push(len);
    }

    /// Tags `[start, end)` on the last row with `scopes`.
    ///
    /// Adjacent spans with identical scopes are merged.
    pub fn push_span(&mut self, start: usize, end: usize, scopes: &[&'static str]) {
        if start >= end || scopes.is_empty() {
            return;
        }
        let Some(row) = self.rows.last_mut() else {
            return;
        };
        if let Some(last) = row.last_mut() {
            if last.end == start && last.scopes == scopes {
                last.end = end;
                return;
            }
        }
        row.push(ScopeSpan {
            start,
            end,
            scopes: scopes.to_vec(),
        });
    }

    /// Spans of one row.
    pub fn row(&self, row: usize) -> &[ScopeSpan] {
        self.rows.get(row).map_or(&[], Vec::as_slice)
    }

    pub fn len_rows(&self) -> usize {
        self.rows.len()
    }

    /// Scopes of the character at `pos`.
    ///
    /// A column at or past the end of its row reports the scopes of the
    /// row's last character. Empty rows and rows outside the map only carry
    /// the root scope.
    pub fn scopes_at(&self, pos: Position) -> ScopeChain {
        let len = self.line_lengths.get(pos.row).copied().unwrap_or(0);
        if len == 0 {
            return ScopeChain::root(self.root);
        }
        let column = pos.column.min(len - 1);

        let spans = self.row(pos.row);
        let found = spans
            .binary_search_by(|span| {
                if span.end <= column {
                    std::cmp::Ordering::Less
                } else if span.start > column {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
            .map(|index| &spans[index]);

        match found {
            Some(span) => ScopeChain::from_names(
                span.scopes.iter().copied().chain(std::iter::once(self.root)),
            ),
            None => ScopeChain::root(self.root),
        }
    }
}

/// Anything that can answer "which scopes cover this position".
pub trait ScopeProvider {
    fn scopes_at(&self, pos: Position) -> ScopeChain;
}

impl ScopeProvider for ScopeMap {
    fn scopes_at(&self, pos: Position) -> ScopeChain {
        ScopeMap::scopes_at(self, pos)
    }
}
