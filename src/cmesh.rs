//! The in-memory coarse mesh: the level-0 cells that become the roots of
//! the forest's trees.
//!
//! A coarse mesh provides, per tree, the element class, the corner
//! coordinates, the face joins to neighboring trees, and a set of typed
//! attributes keyed by `(package id, key)`. Construction goes through
//! `CoarseMeshBuilder`; readers for third-party mesh files live outside the
//! core and drive the same builder.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::eclass::ElementClass;

/// A face-to-face connection between two coarse trees.
///
/// `orientation` encodes which corner of the neighbor's face coincides with
/// the first corner of this face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceJoin {
    /// The global id of the neighboring tree.
    pub tree: usize,
    /// The face index on the neighboring tree.
    pub face: usize,
    /// The rotation of the shared face.
    pub orientation: u8,
}

/// Addresses one attribute on one coarse tree. The key set is closed per
/// package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeKey {
    pub package: u32,
    pub key: u32,
}

/// A typed per-tree attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Int(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug)]
struct CoarseTree {
    eclass: ElementClass,
    vertices: Array2<f64>,
    joins: Vec<Option<FaceJoin>>,
    attributes: HashMap<AttributeKey, Attribute>,
}

/// The level-0 mesh: each cell becomes the root of one tree.
#[derive(Debug)]
pub struct CoarseMesh {
    trees: Vec<CoarseTree>,
}

impl CoarseMesh {
    /// Starts building a coarse mesh.
    pub fn builder() -> CoarseMeshBuilder {
        CoarseMeshBuilder { trees: Vec::new() }
    }

    /// A mesh of one tree of the given class with unit corner coordinates
    /// and no joins.
    pub fn new_single(eclass: ElementClass) -> Self {
        let mut builder = Self::builder();
        builder.add_tree(eclass);
        builder.build().unwrap()
    }

    /// The unit square split into two triangles joined along the diagonal.
    pub fn new_unit_square_triangles() -> Self {
        let mut builder = Self::builder();
        let lower = builder.add_tree(ElementClass::Triangle);
        let upper = builder.add_tree(ElementClass::Triangle);
        builder.set_vertices(
            lower,
            Array2::from_shape_vec((3, 3), vec![0., 0., 0., 1., 0., 0., 1., 1., 0.]).unwrap(),
        );
        builder.set_vertices(
            upper,
            Array2::from_shape_vec((3, 3), vec![0., 0., 0., 0., 1., 0., 1., 1., 0.]).unwrap(),
        );
        // The diagonal is face 1 of both root triangles.
        builder.join(lower, 1, upper, 1, 0);
        builder.build().unwrap()
    }

    /// The number of trees in the mesh.
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// The element class of tree `tree_id`.
    pub fn tree_class(&self, tree_id: usize) -> ElementClass {
        self.trees[tree_id].eclass
    }

    /// The corner coordinates of tree `tree_id`, one row per corner.
    pub fn tree_vertices(&self, tree_id: usize) -> ArrayView2<'_, f64> {
        self.trees[tree_id].vertices.view()
    }

    /// The join across `face` of tree `tree_id`, if the face is not a
    /// domain boundary.
    pub fn join(&self, tree_id: usize, face: usize) -> Option<&FaceJoin> {
        self.trees[tree_id].joins[face].as_ref()
    }

    /// The attribute stored on tree `tree_id` under `key`.
    pub fn attribute(&self, tree_id: usize, key: AttributeKey) -> Option<&Attribute> {
        self.trees[tree_id].attributes.get(&key)
    }
}

struct BuilderTree {
    eclass: ElementClass,
    vertices: Option<Array2<f64>>,
    joins: Vec<Option<FaceJoin>>,
    attributes: HashMap<AttributeKey, Attribute>,
}

/// Accumulates trees, coordinates, joins, and attributes, then validates
/// them into an immutable `CoarseMesh`.
pub struct CoarseMeshBuilder {
    trees: Vec<BuilderTree>,
}

impl CoarseMeshBuilder {
    /// Appends a tree of the given class and returns its global id.
    pub fn add_tree(&mut self, eclass: ElementClass) -> usize {
        self.trees.push(BuilderTree {
            eclass,
            vertices: None,
            joins: vec![None; eclass.num_faces()],
            attributes: HashMap::new(),
        });
        self.trees.len() - 1
    }

    /// Sets the corner coordinates of `tree_id`, one row of 3 per corner.
    pub fn set_vertices(&mut self, tree_id: usize, vertices: Array2<f64>) -> &mut Self {
        self.trees[tree_id].vertices = Some(vertices);
        self
    }

    /// Joins `face_a` of `tree_a` with `face_b` of `tree_b`. Both sides of
    /// the connection are recorded.
    pub fn join(
        &mut self,
        tree_a: usize,
        face_a: usize,
        tree_b: usize,
        face_b: usize,
        orientation: u8,
    ) -> &mut Self {
        self.trees[tree_a].joins[face_a] = Some(FaceJoin {
            tree: tree_b,
            face: face_b,
            orientation,
        });
        self.trees[tree_b].joins[face_b] = Some(FaceJoin {
            tree: tree_a,
            face: face_a,
            orientation,
        });
        self
    }

    /// Stores `attribute` on `tree_id` under `key`.
    pub fn set_attribute(
        &mut self,
        tree_id: usize,
        key: AttributeKey,
        attribute: Attribute,
    ) -> &mut Self {
        self.trees[tree_id].attributes.insert(key, attribute);
        self
    }

    /// Validates the accumulated mesh. Trees without explicit coordinates
    /// get the unit reference coordinates of their class.
    pub fn build(self) -> Result<CoarseMesh, String> {
        let num_trees = self.trees.len();
        if num_trees == 0 {
            return Err("a coarse mesh needs at least one tree".to_string());
        }

        let mut trees = Vec::with_capacity(num_trees);
        for (id, tree) in self.trees.into_iter().enumerate() {
            let corners = tree.eclass.num_corners();
            let vertices = match tree.vertices {
                Some(v) => {
                    if v.shape() != [corners, 3] {
                        return Err(format!(
                            "tree {id} is a {} and needs {corners}x3 corner coordinates, got {}x{}",
                            tree.eclass,
                            v.nrows(),
                            v.ncols(),
                        ));
                    }
                    v
                }
                None => unit_vertices(tree.eclass),
            };
            for (face, join) in tree.joins.iter().enumerate() {
                if let Some(join) = join {
                    if join.tree >= num_trees {
                        return Err(format!(
                            "face {face} of tree {id} joins the unknown tree {}",
                            join.tree,
                        ));
                    }
                }
            }
            trees.push(CoarseTree {
                eclass: tree.eclass,
                vertices,
                joins: tree.joins,
                attributes: tree.attributes,
            });
        }

        // Joins must agree from both sides.
        let mesh = CoarseMesh { trees };
        for id in 0..mesh.num_trees() {
            for face in 0..mesh.tree_class(id).num_faces() {
                if let Some(join) = mesh.join(id, face) {
                    let back = mesh.join(join.tree, join.face);
                    if back != Some(&FaceJoin { tree: id, face, orientation: join.orientation }) {
                        return Err(format!(
                            "face {face} of tree {id} is joined one-sidedly",
                        ));
                    }
                }
            }
        }
        Ok(mesh)
    }
}

/// Unit reference corner coordinates of a class, one row per corner.
fn unit_vertices(eclass: ElementClass) -> Array2<f64> {
    let corners: Vec<[f64; 3]> = match eclass {
        ElementClass::Vertex => vec![[0., 0., 0.]],
        ElementClass::Line => vec![[0., 0., 0.], [1., 0., 0.]],
        ElementClass::Quad => vec![
            [0., 0., 0.],
            [1., 0., 0.],
            [0., 1., 0.],
            [1., 1., 0.],
        ],
        ElementClass::Hex => vec![
            [0., 0., 0.],
            [1., 0., 0.],
            [0., 1., 0.],
            [1., 1., 0.],
            [0., 0., 1.],
            [1., 0., 1.],
            [0., 1., 1.],
            [1., 1., 1.],
        ],
        ElementClass::Triangle => vec![[0., 0., 0.], [1., 0., 0.], [1., 1., 0.]],
        ElementClass::Tet => vec![
            [0., 0., 0.],
            [1., 0., 0.],
            [1., 0., 1.],
            [1., 1., 1.],
        ],
        ElementClass::Prism => vec![
            [0., 0., 0.],
            [1., 0., 0.],
            [1., 1., 0.],
            [0., 0., 1.],
            [1., 0., 1.],
            [1., 1., 1.],
        ],
        ElementClass::Pyramid => vec![
            [0., 0., 0.],
            [1., 0., 0.],
            [0., 1., 0.],
            [1., 1., 0.],
            [1., 1., 1.],
        ],
    };
    let rows = corners.len();
    Array2::from_shape_vec((rows, 3), corners.into_iter().flatten().collect()).unwrap()
}
