//! Provides the `Scheme` trait, the per-class element algebra, and the
//! `SchemeRegistry` that dispatches it by element class.

mod simplex;
mod tensor;

use std::cmp::Ordering;

use crate::eclass::ElementClass;
use crate::element::{Coord, Element};

pub(crate) use simplex::{TetScheme, TriangleScheme};
pub(crate) use tensor::TensorScheme;

/// The combinatorial algebra of one element class.
///
/// Every operation is a pure function of its inputs. Operations that would
/// leave the valid range (the parent of the root, a child beyond the
/// maximum level, a face index out of range) are contract violations and
/// are detected in debug builds.
pub trait Scheme: std::fmt::Debug + Send + Sync {
    /// The element class this scheme operates on.
    fn eclass(&self) -> ElementClass;

    /// The root element: level 0, anchor at the origin, type 0.
    fn root(&self) -> Element {
        Element::new([0, 0, 0], 0, 0)
    }

    /// The deepest level elements of this class may reach.
    fn max_level(&self) -> u8 {
        self.eclass().max_level()
    }

    /// Children produced by one refinement step.
    fn num_children(&self) -> usize {
        self.eclass().num_children()
    }

    /// Codimension-1 faces of an element.
    fn num_faces(&self) -> usize {
        self.eclass().num_faces()
    }

    /// Corners of an element.
    fn num_corners(&self) -> usize {
        self.eclass().num_corners()
    }

    /// The edge length of the root element in anchor coordinates.
    fn root_len(&self) -> Coord {
        1 << self.max_level()
    }

    /// The edge length of an element at `level`.
    fn len(&self, level: u8) -> Coord {
        debug_assert!(level <= self.max_level());
        1 << (self.max_level() - level)
    }

    /// The parent of `element`. Must not be called on the root.
    fn parent(&self, element: &Element) -> Element;

    /// The `child_index`-th child in canonical order: Morton for
    /// tensor-product classes, Bey for simplex classes.
    fn child(&self, element: &Element, child_index: usize) -> Element;

    /// All children of `element` in canonical order.
    fn children(&self, element: &Element) -> Vec<Element> {
        (0..self.num_children())
            .map(|i| self.child(element, i))
            .collect()
    }

    /// The `sibling_index`-th sibling; `sibling(e, child_id(e))` is `e`.
    fn sibling(&self, element: &Element, sibling_index: usize) -> Element {
        self.child(&self.parent(element), sibling_index)
    }

    /// The position of `element` among its siblings, in canonical order.
    fn child_id(&self, element: &Element) -> usize;

    /// Whether `elements` are exactly the children of a common parent, in
    /// canonical order.
    fn is_family(&self, elements: &[Element]) -> bool {
        if elements.len() != self.num_children() {
            return false;
        }
        if elements[0].level() == 0 {
            return false;
        }
        let parent = self.parent(&elements[0]);
        elements.iter().enumerate().all(|(i, e)| {
            e.level() == elements[0].level()
                && self.child_id(e) == i
                && self.parent(e) == parent
        })
    }

    /// Whether `parent` is the parent of `child`.
    fn is_parent(&self, parent: &Element, child: &Element) -> bool {
        child.level() == parent.level() + 1 && self.parent(child) == *parent
    }

    /// Whether `ancestor` is a proper ancestor of `descendant`.
    fn is_ancestor(&self, ancestor: &Element, descendant: &Element) -> bool {
        ancestor.level() < descendant.level()
            && self.ancestor_at_level(descendant, ancestor.level()) == *ancestor
    }

    /// The ancestor of `element` at `level`; `level` must not exceed the
    /// element's own level.
    fn ancestor_at_level(&self, element: &Element, level: u8) -> Element {
        debug_assert!(level <= element.level());
        let mut current = *element;
        while current.level() > level {
            current = self.parent(&current);
        }
        current
    }

    /// The element sharing `face` with `element` inside the root grid,
    /// together with the matching face index of the neighbor. The neighbor
    /// may lie outside the root element; callers check `is_inside_root` and
    /// translate through the coarse-mesh face join if it does not.
    fn face_neighbor(&self, element: &Element, face: usize) -> (Element, usize);

    /// Whether `element` lies inside the root element of its class.
    fn is_inside_root(&self, element: &Element) -> bool;

    /// Whether `element` lies outside the reference element of type
    /// `root_kind` and level `root_level` spanning the element's ancestor
    /// cube. Tensor-product elements always lie inside their ancestor cube.
    fn is_outside(&self, element: &Element, root_kind: u8, root_level: u8) -> bool {
        let _ = (element, root_kind, root_level);
        false
    }

    /// The SFC index of `element` among all elements of its level: the
    /// base-`num_children` number whose digits are the child ids along the
    /// root-to-element path.
    fn linear_id(&self, element: &Element) -> u64 {
        let base = self.num_children() as u64;
        let mut id = 0;
        let mut digit = 1u64;
        let mut current = *element;
        while current.level() > 0 {
            id += self.child_id(&current) as u64 * digit;
            digit *= base;
            current = self.parent(&current);
        }
        id
    }

    /// Total SFC order. Elements of equal level compare by linear id; an
    /// ancestor precedes all of its proper descendants.
    fn compare(&self, a: &Element, b: &Element) -> Ordering {
        let base = self.num_children() as u64;
        let level = a.level().max(b.level());
        let id_a = self.linear_id(a) * base.pow(u32::from(level - a.level()));
        let id_b = self.linear_id(b) * base.pow(u32::from(level - b.level()));
        id_a.cmp(&id_b).then(a.level().cmp(&b.level()))
    }

    /// Integer coordinates of the `vertex`-th corner of `element`.
    fn vertex_coords(&self, element: &Element, vertex: usize) -> [Coord; 3];

    /// Integer coordinates of every corner of `element`.
    fn all_vertex_coords(&self, element: &Element) -> Vec<[Coord; 3]> {
        (0..self.num_corners())
            .map(|v| self.vertex_coords(element, v))
            .collect()
    }
}

/// Dispatches the element algebra by element class.
///
/// The registry is constructed once at startup and passed by shared
/// read-only reference to every forest referring to it. Classes without a
/// scheme (`Vertex`, `Prism`, `Pyramid`) are programmer errors to request.
#[derive(Debug)]
pub struct SchemeRegistry {
    line: TensorScheme,
    quad: TensorScheme,
    hex: TensorScheme,
    triangle: TriangleScheme,
    tet: TetScheme,
}

impl SchemeRegistry {
    /// The scheme for `eclass`.
    ///
    /// # Panics
    ///
    /// If no scheme is registered for `eclass`.
    pub fn scheme(&self, eclass: ElementClass) -> &dyn Scheme {
        match eclass {
            ElementClass::Line => &self.line,
            ElementClass::Quad => &self.quad,
            ElementClass::Hex => &self.hex,
            ElementClass::Triangle => &self.triangle,
            ElementClass::Tet => &self.tet,
            _ => panic!("no scheme registered for element class {eclass}"),
        }
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self {
            line: TensorScheme::new(ElementClass::Line),
            quad: TensorScheme::new(ElementClass::Quad),
            hex: TensorScheme::new(ElementClass::Hex),
            triangle: TriangleScheme,
            tet: TetScheme,
        }
    }
}
