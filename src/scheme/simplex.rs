//! Element algebra for the simplex classes: triangle and tet.
//!
//! A simplex type is a permutation of the axes of its cube: the element of
//! type `t` is the Kuhn simplex whose local coordinates are descending along
//! the permuted axes. Triangles have 2 types, tets have the 6 types of the
//! Kuhn cube decomposition. Bey refinement produces the corner children
//! first (they keep the parent type), then the interior children in a fixed
//! order; the child id and the parent type of an element are recovered by
//! locating its `(cube offset, type)` pair among the candidate parents'
//! child tables, which is unique.

use crate::eclass::ElementClass;
use crate::element::{Coord, Element};

use super::Scheme;

/// Axis permutations of the six tet types. Type `t` walks its vertices
/// along axis `t / 2` first, matching the original vertex-walk convention
/// `ei = t / 2`, `ej = (ei + (t % 2 == 0 ? 2 : 1)) % 3`.
const TET_PERMS: [[usize; 3]; 6] = [
    [0, 2, 1],
    [0, 1, 2],
    [1, 0, 2],
    [1, 2, 0],
    [2, 1, 0],
    [2, 0, 1],
];

fn tet_perm(kind: u8) -> [usize; 3] {
    TET_PERMS[kind as usize]
}

fn tet_kind(perm: [usize; 3]) -> u8 {
    TET_PERMS
        .iter()
        .position(|p| *p == perm)
        .map(|p| p as u8)
        .unwrap_or_else(|| panic!("{perm:?} is not an axis permutation"))
}

fn tri_perm(kind: u8) -> [usize; 2] {
    if kind == 0 {
        [0, 1]
    } else {
        [1, 0]
    }
}

/// `(cube offset, type)` of the four triangle children in Bey order.
fn tri_child_slots(kind: u8) -> [([Coord; 3], u8); 4] {
    let [i, j] = tri_perm(kind);
    let mut ei = [0; 3];
    ei[i] = 1;
    let mut eij = ei;
    eij[j] = 1;
    [([0; 3], kind), (ei, kind), (eij, kind), (ei, 1 - kind)]
}

/// `(cube offset, type)` of the eight tet children in Bey order: the corner
/// children along the vertex walk, then the interior children of the
/// octahedron split.
fn tet_child_slots(kind: u8) -> [([Coord; 3], u8); 8] {
    let [i, j, k] = tet_perm(kind);
    let mut ei = [0; 3];
    ei[i] = 1;
    let mut eij = ei;
    eij[j] = 1;
    [
        ([0; 3], kind),
        (ei, kind),
        (eij, kind),
        ([1, 1, 1], kind),
        (ei, tet_kind([j, i, k])),
        (ei, tet_kind([j, k, i])),
        (eij, tet_kind([i, k, j])),
        (eij, tet_kind([k, i, j])),
    ]
}

/// The element's offset within its parent cube, one 0/1 entry per axis.
fn cube_offset(element: &Element, h: Coord, dim: usize) -> [Coord; 3] {
    let mut offset = [0; 3];
    for (d, o) in offset.iter_mut().enumerate().take(dim) {
        *o = Coord::from(element.anchor()[d] & h != 0);
    }
    offset
}

/// Parent type and child id of the element with the given cube offset and
/// type. The pair is unique across all parent types.
fn locate<const N: usize>(
    slots: impl Fn(u8) -> [([Coord; 3], u8); N],
    num_kinds: u8,
    offset: [Coord; 3],
    kind: u8,
) -> (u8, usize) {
    for parent_kind in 0..num_kinds {
        for (slot, (o, k)) in slots(parent_kind).into_iter().enumerate() {
            if o == offset && k == kind {
                return (parent_kind, slot);
            }
        }
    }
    panic!("no Kuhn simplex has a child at offset {offset:?} with type {kind}");
}

/// Whether `v` lies inside the closed Kuhn simplex of the given permutation,
/// anchored at `anchor` with edge length `len`.
fn simplex_contains(perm: &[usize], anchor: [Coord; 3], len: Coord, v: [Coord; 3]) -> bool {
    let local: Vec<Coord> = perm.iter().map(|&a| v[a] - anchor[a]).collect();
    local[0] <= len
        && *local.last().unwrap() >= 0
        && local.windows(2).all(|w| w[0] >= w[1])
}

/// Bey algebra for the triangle class.
#[derive(Debug)]
pub(crate) struct TriangleScheme;

impl Scheme for TriangleScheme {
    fn eclass(&self) -> ElementClass {
        ElementClass::Triangle
    }

    fn parent(&self, element: &Element) -> Element {
        debug_assert!(element.level() > 0, "the root element has no parent");
        let h = self.len(element.level());
        let offset = cube_offset(element, h, 2);
        let (parent_kind, _) = locate(tri_child_slots, 2, offset, element.kind());
        let mut anchor = element.anchor();
        anchor[0] &= !h;
        anchor[1] &= !h;
        Element::new(anchor, element.level() - 1, parent_kind)
    }

    fn child(&self, element: &Element, child_index: usize) -> Element {
        debug_assert!(
            element.level() < self.max_level(),
            "refining a triangle past level {}",
            self.max_level(),
        );
        debug_assert!(child_index < self.num_children());
        let h = self.len(element.level() + 1);
        let (offset, kind) = tri_child_slots(element.kind())[child_index];
        let mut anchor = element.anchor();
        anchor[0] += offset[0] * h;
        anchor[1] += offset[1] * h;
        Element::new(anchor, element.level() + 1, kind)
    }

    fn child_id(&self, element: &Element) -> usize {
        if element.level() == 0 {
            return 0;
        }
        let h = self.len(element.level());
        let offset = cube_offset(element, h, 2);
        locate(tri_child_slots, 2, offset, element.kind()).1
    }

    fn face_neighbor(&self, element: &Element, face: usize) -> (Element, usize) {
        debug_assert!(face < self.num_faces());
        let [i, j] = tri_perm(element.kind());
        let flipped = 1 - element.kind();
        let h = self.len(element.level());
        let mut anchor = element.anchor();
        let neighbor_face = match face {
            0 => {
                anchor[i] += h;
                2
            }
            1 => 1,
            _ => {
                anchor[j] -= h;
                0
            }
        };
        (
            Element::new(anchor, element.level(), flipped),
            neighbor_face,
        )
    }

    fn is_inside_root(&self, element: &Element) -> bool {
        let root_perm = tri_perm(0);
        self.all_vertex_coords(element)
            .into_iter()
            .all(|v| simplex_contains(&root_perm, [0; 3], self.root_len(), v))
    }

    fn is_outside(&self, element: &Element, root_kind: u8, root_level: u8) -> bool {
        debug_assert!(root_level <= element.level());
        let ref_len = self.len(root_level);
        let mask = !(ref_len - 1);
        let anchor = element.anchor();
        let ref_anchor = [anchor[0] & mask, anchor[1] & mask, 0];
        let perm = tri_perm(root_kind);
        !self
            .all_vertex_coords(element)
            .into_iter()
            .all(|v| simplex_contains(&perm, ref_anchor, ref_len, v))
    }

    fn vertex_coords(&self, element: &Element, vertex: usize) -> [Coord; 3] {
        debug_assert!(vertex < self.num_corners());
        let [i, j] = tri_perm(element.kind());
        let h = self.len(element.level());
        let mut coords = element.anchor();
        if vertex >= 1 {
            coords[i] += h;
        }
        if vertex == 2 {
            coords[j] += h;
        }
        coords
    }
}

/// Bey algebra for the tet class.
#[derive(Debug)]
pub(crate) struct TetScheme;

impl Scheme for TetScheme {
    fn eclass(&self) -> ElementClass {
        ElementClass::Tet
    }

    fn parent(&self, element: &Element) -> Element {
        debug_assert!(element.level() > 0, "the root element has no parent");
        let h = self.len(element.level());
        let offset = cube_offset(element, h, 3);
        let (parent_kind, _) = locate(tet_child_slots, 6, offset, element.kind());
        let mut anchor = element.anchor();
        for a in anchor.iter_mut() {
            *a &= !h;
        }
        Element::new(anchor, element.level() - 1, parent_kind)
    }

    fn child(&self, element: &Element, child_index: usize) -> Element {
        debug_assert!(
            element.level() < self.max_level(),
            "refining a tet past level {}",
            self.max_level(),
        );
        debug_assert!(child_index < self.num_children());
        let h = self.len(element.level() + 1);
        let (offset, kind) = tet_child_slots(element.kind())[child_index];
        let mut anchor = element.anchor();
        for (a, o) in anchor.iter_mut().zip(offset) {
            *a += o * h;
        }
        Element::new(anchor, element.level() + 1, kind)
    }

    fn child_id(&self, element: &Element) -> usize {
        if element.level() == 0 {
            return 0;
        }
        let h = self.len(element.level());
        let offset = cube_offset(element, h, 3);
        locate(tet_child_slots, 6, offset, element.kind()).1
    }

    fn face_neighbor(&self, element: &Element, face: usize) -> (Element, usize) {
        debug_assert!(face < self.num_faces());
        let [i, j, k] = tet_perm(element.kind());
        let h = self.len(element.level());
        let mut anchor = element.anchor();
        let (kind, neighbor_face) = match face {
            0 => {
                anchor[i] += h;
                (tet_kind([j, k, i]), 3)
            }
            1 => (tet_kind([j, i, k]), 1),
            2 => (tet_kind([i, k, j]), 2),
            _ => {
                anchor[k] -= h;
                (tet_kind([k, i, j]), 0)
            }
        };
        (Element::new(anchor, element.level(), kind), neighbor_face)
    }

    fn is_inside_root(&self, element: &Element) -> bool {
        let root_perm = tet_perm(0);
        self.all_vertex_coords(element)
            .into_iter()
            .all(|v| simplex_contains(&root_perm, [0; 3], self.root_len(), v))
    }

    fn is_outside(&self, element: &Element, root_kind: u8, root_level: u8) -> bool {
        debug_assert!(root_level <= element.level());
        let ref_len = self.len(root_level);
        let mask = !(ref_len - 1);
        let anchor = element.anchor();
        let ref_anchor = [anchor[0] & mask, anchor[1] & mask, anchor[2] & mask];
        let perm = tet_perm(root_kind);
        !self
            .all_vertex_coords(element)
            .into_iter()
            .all(|v| simplex_contains(&perm, ref_anchor, ref_len, v))
    }

    fn vertex_coords(&self, element: &Element, vertex: usize) -> [Coord; 3] {
        debug_assert!(vertex < self.num_corners());
        let [i, j, _] = tet_perm(element.kind());
        let h = self.len(element.level());
        let mut coords = element.anchor();
        match vertex {
            0 => {}
            1 => coords[i] += h,
            2 => {
                coords[i] += h;
                coords[j] += h;
            }
            _ => {
                for c in coords.iter_mut() {
                    *c += h;
                }
            }
        }
        coords
    }
}
