//! Live range markers.
//!
//! A marker is a handle ([`MarkerId`]) into an arena of ranges owned by the
//! buffer. Every edit is fed through [`MarkerSet::apply_change`], which
//! rebinds each marker's range to the edited text and flags markers whose
//! text was wiped out. Nothing aliases the stored ranges: callers always go
//! back through the buffer to read the current bounds.
//!
//! ## Learning: Handles Instead of References
//!
//! Holding `&Range` into the buffer would freeze the buffer (no `&mut self`
//! while borrowed). A `Copy` id that is looked up on demand keeps ownership
//! in one place and makes a dangling marker an observable `None`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Position, Range, TextChange};

/// Identifier of a marker registered with a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(u64);

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// Visual decoration attached to a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoration {
    /// CSS-like class name the view layer renders the range with
    pub class: String,
}

impl Decoration {
    /// A highlight decoration with the given class.
    pub fn highlight(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }
}

/// A tracked range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    range: Range,
    valid: bool,
    decoration: Option<Decoration>,
}

impl Marker {
    /// Current bounds of the marker.
    pub fn range(&self) -> Range {
        self.range
    }

    /// False once an edit removed text surrounding the whole marker.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Decoration attached to this marker, if any.
    pub fn decoration(&self) -> Option<&Decoration> {
        self.decoration.as_ref()
    }
}

/// Arena of markers, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: BTreeMap<MarkerId, Marker>,
    next_id: u64,
}

impl MarkerSet {
    /// Creates an empty marker set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `range`.
    pub fn mark(&mut self, range: Range) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.insert(
            id,
            Marker {
                range,
                valid: true,
                decoration: None,
            },
        );
        id
    }

    /// Looks up a marker.
    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    /// Current range of a marker, `None` once destroyed.
    pub fn range(&self, id: MarkerId) -> Option<Range> {
        self.markers.get(&id).map(Marker::range)
    }

    /// Attaches a decoration. Returns false for unknown markers.
    pub fn decorate(&mut self, id: MarkerId, decoration: Decoration) -> bool {
        match self.markers.get_mut(&id) {
            Some(marker) => {
                marker.decoration = Some(decoration);
                true
            }
            None => false,
        }
    }

    /// Stops tracking a marker. Returns false if it was already gone.
    pub fn destroy(&mut self, id: MarkerId) -> bool {
        self.markers.remove(&id).is_some()
    }

    /// Number of live markers.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Returns true if no markers are live.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Iterates over live markers in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (MarkerId, &Marker)> {
        self.markers.iter().map(|(id, marker)| (*id, marker))
    }

    /// Rebinds every marker to the buffer after `change`.
    ///
    /// Markers are inclusive at both ends: text inserted exactly at a
    /// marker's start or end becomes part of it. This is what lets a tag
    /// name marker grow as the user keeps typing at the end of the name.
    pub fn apply_change(&mut self, change: &TextChange) {
        let old = change.old_range;
        for marker in self.markers.values_mut() {
            let before = marker.range;
            if !old.is_empty() && old != before && old.contains_range(&before) {
                marker.valid = false;
            }
            let start = adjust_start(before.start, change);
            let end = adjust_end(before.end, change).max(start);
            marker.range = Range { start, end };
        }
    }
}

fn adjust_start(point: Position, change: &TextChange) -> Position {
    let old = change.old_range;
    if point <= old.start {
        point
    } else if point >= old.end {
        shift(point, change)
    } else {
        old.start
    }
}

fn adjust_end(point: Position, change: &TextChange) -> Position {
    let old = change.old_range;
    if point < old.start {
        point
    } else if point >= old.end {
        shift(point, change)
    } else {
        change.new_range.end
    }
}

/// Moves a point located at or after the old end of `change`.
fn shift(point: Position, change: &TextChange) -> Position {
    let old_end = change.old_range.end;
    let new_end = change.new_range.end;
    if point.row == old_end.row {
        Position::new(new_end.row, new_end.column + (point.column - old_end.column))
    } else {
        Position::new(point.row - old_end.row + new_end.row, point.column)
    }
}
