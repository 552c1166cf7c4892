//! The closed set of element classes a coarse tree can carry.

use serde::{Deserialize, Serialize};

/// The shape class of a coarse tree and of every element refined from it.
///
/// Tensor-product classes (`Line`, `Quad`, `Hex`) refine into `2^d` children
/// in Morton order. Simplex classes (`Triangle`, `Tet`) refine by the Bey
/// scheme into 4 resp. 8 children. `Prism` and `Pyramid` are members of the
/// closed enumeration but carry no element scheme yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementClass {
    Vertex,
    Line,
    Quad,
    Hex,
    Triangle,
    Tet,
    Prism,
    Pyramid,
}

impl ElementClass {
    /// All classes, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Vertex,
        Self::Line,
        Self::Quad,
        Self::Hex,
        Self::Triangle,
        Self::Tet,
        Self::Prism,
        Self::Pyramid,
    ];

    /// The spatial dimension of the class.
    pub fn dimension(&self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Line => 1,
            Self::Quad | Self::Triangle => 2,
            Self::Hex | Self::Tet | Self::Prism | Self::Pyramid => 3,
        }
    }

    /// The number of children one refinement step produces.
    pub fn num_children(&self) -> usize {
        match self {
            Self::Vertex => 1,
            Self::Line => 2,
            Self::Quad | Self::Triangle => 4,
            Self::Hex | Self::Tet | Self::Prism => 8,
            Self::Pyramid => 10,
        }
    }

    /// The number of codimension-1 faces.
    pub fn num_faces(&self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Quad | Self::Tet => 4,
            Self::Prism | Self::Pyramid => 5,
            Self::Hex => 6,
        }
    }

    /// The number of corners.
    pub fn num_corners(&self) -> usize {
        match self {
            Self::Vertex => 1,
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Quad | Self::Tet => 4,
            Self::Pyramid => 5,
            Self::Prism => 6,
            Self::Hex => 8,
        }
    }

    /// The deepest refinement level the class supports. The linear SFC id of
    /// an element at this level still fits in a `u64`.
    pub fn max_level(&self) -> u8 {
        match self {
            Self::Vertex | Self::Line => 30,
            Self::Quad | Self::Triangle => 29,
            Self::Hex => 18,
            Self::Tet | Self::Prism | Self::Pyramid => 21,
        }
    }
}

impl std::fmt::Display for ElementClass {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Line => "line",
            Self::Quad => "quad",
            Self::Hex => "hex",
            Self::Triangle => "triangle",
            Self::Tet => "tet",
            Self::Prism => "prism",
            Self::Pyramid => "pyramid",
        };
        write!(f, "{name}")
    }
}
