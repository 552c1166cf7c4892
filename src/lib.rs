//! Sylva: a forest of adaptive space-trees.
//!
//! A coarse mesh of connected level-0 cells is refined, cell by cell, into
//! trees of elements whose leaves tile the domain in space-filling-curve
//! order. Forests are adapted into new forests by selectively refining and
//! coarsening leaves under a user callback, optionally recursively, with a
//! replace callback letting user data follow every topology change.

mod adapt;
mod cmesh;
mod comm;
mod eclass;
mod element;
mod forest;
mod scheme;
mod tree;

pub use adapt::AdaptAction;
pub use cmesh::{Attribute, AttributeKey, CoarseMesh, CoarseMeshBuilder, FaceJoin};
pub use comm::{Communicator, SingleProcess};
pub use eclass::ElementClass;
pub use element::{Coord, Element};
pub use forest::{AdaptFn, Forest, ForestBuilder, ReplaceFn};
pub use scheme::{Scheme, SchemeRegistry};
pub use tree::Tree;
