//! The per-element record: anchor coordinates, refinement level, and the
//! Bey sub-simplex type.

use serde::{Deserialize, Serialize};

/// Integer anchor coordinate. The root element of every class spans
/// `[0, 2^max_level)` per axis; an element at level `l` has extent
/// `2^(max_level - l)` and its anchor is a multiple of that extent.
pub type Coord = i32;

/// One element of a space-tree.
///
/// An element is fully identified by its anchor corner, its level, and (for
/// simplex classes) its `kind`, the Bey sub-simplex type. The element class
/// itself is not stored here; it is carried by the tree the element lives in
/// and by the scheme operating on it. Unused anchor components (e.g. `z` for
/// a quad) are zero, and `kind` is zero for tensor-product classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element {
    anchor: [Coord; 3],
    level: u8,
    kind: u8,
}

impl Element {
    pub(crate) fn new(anchor: [Coord; 3], level: u8, kind: u8) -> Self {
        Self { anchor, level, kind }
    }

    /// The anchor corner in integer root-grid coordinates.
    pub fn anchor(&self) -> [Coord; 3] {
        self.anchor
    }

    /// The refinement level; the root element has level 0.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// The Bey sub-simplex type. Always 0 for tensor-product classes.
    pub fn kind(&self) -> u8 {
        self.kind
    }
}
