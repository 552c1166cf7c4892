//! Element algebra for the tensor-product classes: line, quad, hex.
//!
//! Children are ordered by the Morton index: bit `d` of the child index
//! selects the upper half along axis `d`. All operations are plain bit
//! arithmetic on the anchor.

use crate::eclass::ElementClass;
use crate::element::{Coord, Element};

use super::Scheme;

/// Morton-ordered algebra for `Line`, `Quad`, and `Hex`.
#[derive(Debug)]
pub(crate) struct TensorScheme {
    eclass: ElementClass,
}

impl TensorScheme {
    pub(crate) fn new(eclass: ElementClass) -> Self {
        assert!(
            matches!(
                eclass,
                ElementClass::Line | ElementClass::Quad | ElementClass::Hex
            ),
            "{eclass} is not a tensor-product class",
        );
        Self { eclass }
    }

    fn dim(&self) -> usize {
        self.eclass.dimension()
    }
}

impl Scheme for TensorScheme {
    fn eclass(&self) -> ElementClass {
        self.eclass
    }

    fn parent(&self, element: &Element) -> Element {
        debug_assert!(element.level() > 0, "the root element has no parent");
        let h = self.len(element.level());
        let mut anchor = element.anchor();
        for a in anchor.iter_mut().take(self.dim()) {
            *a &= !h;
        }
        Element::new(anchor, element.level() - 1, 0)
    }

    fn child(&self, element: &Element, child_index: usize) -> Element {
        debug_assert!(
            element.level() < self.max_level(),
            "refining a {} past level {}",
            self.eclass,
            self.max_level(),
        );
        debug_assert!(child_index < self.num_children());
        let h = self.len(element.level() + 1);
        let mut anchor = element.anchor();
        for (d, a) in anchor.iter_mut().enumerate().take(self.dim()) {
            if child_index >> d & 1 == 1 {
                *a += h;
            }
        }
        Element::new(anchor, element.level() + 1, 0)
    }

    fn child_id(&self, element: &Element) -> usize {
        if element.level() == 0 {
            return 0;
        }
        let h = self.len(element.level());
        let anchor = element.anchor();
        (0..self.dim()).fold(0, |id, d| id | usize::from(anchor[d] & h != 0) << d)
    }

    fn face_neighbor(&self, element: &Element, face: usize) -> (Element, usize) {
        debug_assert!(face < self.num_faces());
        let axis = face / 2;
        let h = self.len(element.level());
        let mut anchor = element.anchor();
        anchor[axis] += if face % 2 == 1 { h } else { -h };
        (
            Element::new(anchor, element.level(), 0),
            face ^ 1,
        )
    }

    fn is_inside_root(&self, element: &Element) -> bool {
        let anchor = element.anchor();
        (0..self.dim()).all(|d| 0 <= anchor[d] && anchor[d] < self.root_len())
    }

    fn vertex_coords(&self, element: &Element, vertex: usize) -> [Coord; 3] {
        debug_assert!(vertex < self.num_corners());
        let h = self.len(element.level());
        let mut coords = element.anchor();
        for (d, c) in coords.iter_mut().enumerate().take(self.dim()) {
            if vertex >> d & 1 == 1 {
                *c += h;
            }
        }
        coords
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use rand::prelude::*;

    use super::TensorScheme;
    use crate::eclass::ElementClass;
    use crate::element::Element;
    use crate::scheme::Scheme;

    fn schemes() -> Vec<TensorScheme> {
        vec![
            TensorScheme::new(ElementClass::Line),
            TensorScheme::new(ElementClass::Quad),
            TensorScheme::new(ElementClass::Hex),
        ]
    }

    /// Every element of the scheme's class up to `level`, in SFC order.
    fn descendants(scheme: &dyn Scheme, element: &Element, level: u8, out: &mut Vec<Element>) {
        out.push(*element);
        if element.level() < level {
            for child in scheme.children(element) {
                descendants(scheme, &child, level, out);
            }
        }
    }

    #[test]
    fn test_parent_child_round_trip() {
        for scheme in schemes() {
            let mut elements = Vec::new();
            descendants(&scheme, &scheme.root(), 3, &mut elements);
            for e in &elements {
                for i in 0..scheme.num_children() {
                    let child = scheme.child(e, i);
                    assert_eq!(scheme.parent(&child), *e);
                    assert_eq!(scheme.child_id(&child), i);
                    assert!(scheme.is_parent(e, &child));
                }
            }
        }
    }

    #[test]
    fn test_family_recognition() {
        use itertools::Itertools;

        for scheme in schemes() {
            let children = scheme.children(&scheme.root());
            assert!(scheme.is_family(&children));

            // Any permutation other than the identity is not a family.
            for permuted in children.iter().copied().permutations(children.len()) {
                if permuted != children {
                    assert!(!scheme.is_family(&permuted));
                }
            }

            assert!(!scheme.is_family(&children[1..]));
            assert!(!scheme.is_family(&[scheme.root()]));
        }
    }

    #[test]
    fn test_sfc_monotone_within_family() {
        for scheme in schemes() {
            let element = scheme.child(&scheme.child(&scheme.root(), 1), 0);
            let children = scheme.children(&element);
            for (i, a) in children.iter().enumerate() {
                for (j, b) in children.iter().enumerate() {
                    assert_eq!(scheme.compare(a, b), i.cmp(&j));
                }
            }
        }
    }

    #[test]
    fn test_ancestor_precedes_descendants() {
        for scheme in schemes() {
            let mut elements = Vec::new();
            descendants(&scheme, &scheme.root(), 3, &mut elements);
            for e in &elements {
                if e.level() == 0 {
                    continue;
                }
                let parent = scheme.parent(e);
                assert!(scheme.is_ancestor(&parent, e));
                assert!(!scheme.is_ancestor(e, &parent));
                assert_eq!(scheme.compare(&parent, e), Ordering::Less);
            }
        }
    }

    #[test]
    fn test_face_neighbor_involution() {
        for scheme in schemes() {
            let mut elements = Vec::new();
            descendants(&scheme, &scheme.root(), 3, &mut elements);
            for e in &elements {
                for face in 0..scheme.num_faces() {
                    let (neighbor, neighbor_face) = scheme.face_neighbor(e, face);
                    if scheme.is_inside_root(&neighbor) {
                        assert_eq!(scheme.face_neighbor(&neighbor, neighbor_face), (*e, face));
                    }
                }
            }
        }
    }

    #[test]
    fn test_root_boundary_neighbors_are_outside() {
        let scheme = TensorScheme::new(ElementClass::Quad);
        let root = scheme.root();
        for face in 0..scheme.num_faces() {
            let (neighbor, _) = scheme.face_neighbor(&root, face);
            assert!(!scheme.is_inside_root(&neighbor));
        }
    }

    #[test]
    fn test_quad_corner_coords() {
        let scheme = TensorScheme::new(ElementClass::Quad);
        let h = scheme.len(2);
        // Child path 3, 0 from the root: upper-right quadrant, lowest corner.
        let e = scheme.child(&scheme.child(&scheme.root(), 3), 0);
        assert_eq!(
            scheme.all_vertex_coords(&e),
            vec![
                [2 * h, 2 * h, 0],
                [3 * h, 2 * h, 0],
                [2 * h, 3 * h, 0],
                [3 * h, 3 * h, 0],
            ],
        );
    }

    #[test]
    fn test_random_descent_keeps_invariants() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
        for scheme in schemes() {
            for _ in 0..32 {
                let mut e = scheme.root();
                for _ in 0..8 {
                    let i = rng.gen_range(0..scheme.num_children());
                    e = scheme.child(&e, i);
                    assert_eq!(scheme.child_id(&e), i);
                    assert!(scheme.is_inside_root(&e));
                    // Anchor stays aligned to the element's extent.
                    let h = scheme.len(e.level());
                    assert!(e.anchor().iter().all(|&a| a % h == 0));
                }
                assert!(scheme.is_ancestor(&scheme.root(), &e));
                assert_eq!(
                    scheme.ancestor_at_level(&e, 0),
                    scheme.root(),
                );
            }
        }
    }
}
