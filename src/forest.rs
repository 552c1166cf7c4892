//! The forest façade: an ordered set of trees partitioning the domain into
//! leaves.
//!
//! A forest is configured through `ForestBuilder`, the uncommitted state,
//! and becomes an immutable `Forest` at `commit`. The source is either a
//! coarse mesh (uniform construction to a given level) or a committed
//! parent forest plus an adapt callback. For most use-cases, one reaches
//! for the `Forest::new_uniform` and `Forest::new_adapt` shorthands.

use std::any::Any;
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use crate::adapt::{AdaptAction, AdaptPass};
use crate::cmesh::CoarseMesh;
use crate::comm::{Communicator, SingleProcess};
use crate::element::Element;
use crate::scheme::{Scheme, SchemeRegistry};
use crate::tree::Tree;

/// Decides, window by window, whether elements are refined, kept, or
/// coarsened. Called with the source forest, the local tree id, the tree's
/// scheme, and either a single element or a full family candidate.
pub type AdaptFn<'a> =
    Box<dyn FnMut(&Forest, usize, &dyn Scheme, &[Element]) -> AdaptAction + 'a>;

/// Invoked at every topology change with the consumed and the produced
/// elements, so user data can follow the leaves.
pub type ReplaceFn<'a> =
    Box<dyn FnMut(&Forest, usize, &dyn Scheme, &[Element], &[Element]) + 'a>;

/// A committed forest: the local trees, their global element offsets, and
/// the local and global element counts.
pub struct Forest {
    cmesh: Arc<CoarseMesh>,
    schemes: Arc<SchemeRegistry>,
    pub(crate) comm: Arc<dyn Communicator>,
    trees: Vec<Tree>,
    local_num_elements: u64,
    global_num_elements: u64,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for Forest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Forest")
            .field("num_local_trees", &self.trees.len())
            .field("local_num_elements", &self.local_num_elements)
            .field("global_num_elements", &self.global_num_elements)
            .finish()
    }
}

impl Forest {
    /// Starts configuring a forest.
    pub fn builder<'a>() -> ForestBuilder<'a> {
        ForestBuilder::new()
    }

    /// A forest uniformly refined to `level` on every tree of `cmesh`.
    pub fn new_uniform(
        cmesh: Arc<CoarseMesh>,
        schemes: Arc<SchemeRegistry>,
        level: u8,
    ) -> Result<Self, String> {
        Self::builder()
            .set_cmesh(cmesh)
            .set_schemes(schemes)
            .set_level(level)
            .commit()
    }

    /// A forest adapted from `source` under `adapt_fn`.
    pub fn new_adapt<'a, F>(
        source: &'a Forest,
        adapt_fn: F,
        recursive: bool,
    ) -> Result<Self, String>
    where
        F: FnMut(&Forest, usize, &dyn Scheme, &[Element]) -> AdaptAction + 'a,
    {
        Self::builder()
            .set_adapt(source, adapt_fn, recursive)
            .commit()
    }

    /// The coarse mesh this forest refines.
    pub fn cmesh(&self) -> &Arc<CoarseMesh> {
        &self.cmesh
    }

    /// The scheme registry shared by this forest.
    pub fn schemes(&self) -> &Arc<SchemeRegistry> {
        &self.schemes
    }

    /// The number of trees on this process.
    pub fn num_local_trees(&self) -> usize {
        self.trees.len()
    }

    /// The number of elements on this process.
    pub fn num_local_elements(&self) -> u64 {
        self.local_num_elements
    }

    /// The number of elements across all processes.
    pub fn num_global_elements(&self) -> u64 {
        self.global_num_elements
    }

    /// The `ltree`-th local tree.
    pub fn tree(&self, ltree: usize) -> &Tree {
        &self.trees[ltree]
    }

    /// All local trees, in SFC order.
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// The element at local SFC index `index`.
    pub fn element(&self, index: usize) -> &Element {
        assert!(
            (index as u64) < self.local_num_elements,
            "element index {index} out of range",
        );
        let at = self
            .trees
            .partition_point(|t| t.elements_offset() <= index as u64);
        let tree = &self.trees[at - 1];
        tree.element(index - tree.elements_offset() as usize)
    }

    /// All local leaves with their tree ids, in SFC order.
    pub fn leaves(&self) -> impl Iterator<Item = (usize, &Element)> + '_ {
        self.trees
            .iter()
            .enumerate()
            .flat_map(|(t, tree)| tree.elements().iter().map(move |e| (t, e)))
    }

    /// The opaque user data configured on this forest, if any.
    pub fn user_data(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.user_data.as_deref()
    }
}

/// The uncommitted state of a forest. Configure a source (a coarse mesh for
/// uniform construction, or a committed parent forest with an adapt
/// callback), then `commit`.
pub struct ForestBuilder<'a> {
    cmesh: Option<Arc<CoarseMesh>>,
    schemes: Option<Arc<SchemeRegistry>>,
    comm: Arc<dyn Communicator>,
    level: Option<u8>,
    source: Option<&'a Forest>,
    adapt_fn: Option<AdaptFn<'a>>,
    replace_fn: Option<ReplaceFn<'a>>,
    recursive: bool,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl<'a> ForestBuilder<'a> {
    pub fn new() -> Self {
        Self {
            cmesh: None,
            schemes: None,
            comm: Arc::new(SingleProcess),
            level: None,
            source: None,
            adapt_fn: None,
            replace_fn: None,
            recursive: false,
            user_data: None,
        }
    }

    /// Sets the coarse mesh for uniform construction.
    pub fn set_cmesh(mut self, cmesh: Arc<CoarseMesh>) -> Self {
        self.cmesh = Some(cmesh);
        self
    }

    /// Sets the scheme registry.
    pub fn set_schemes(mut self, schemes: Arc<SchemeRegistry>) -> Self {
        self.schemes = Some(schemes);
        self
    }

    /// Sets the communicator. Defaults to `SingleProcess`.
    pub fn set_communicator(mut self, comm: Arc<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }

    /// Sets the uniform refinement level. Defaults to 0.
    pub fn set_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    /// Configures this forest to be adapted from `source` under `adapt_fn`,
    /// optionally re-feeding produced elements through the callback.
    pub fn set_adapt<F>(mut self, source: &'a Forest, adapt_fn: F, recursive: bool) -> Self
    where
        F: FnMut(&Forest, usize, &dyn Scheme, &[Element]) -> AdaptAction + 'a,
    {
        self.source = Some(source);
        self.adapt_fn = Some(Box::new(adapt_fn));
        self.recursive = recursive;
        self
    }

    /// Sets the replace callback invoked at every topology change.
    pub fn set_replace<F>(mut self, replace_fn: F) -> Self
    where
        F: FnMut(&Forest, usize, &dyn Scheme, &[Element], &[Element]) + 'a,
    {
        self.replace_fn = Some(Box::new(replace_fn));
        self
    }

    /// Attaches opaque user data; the core passes it through unchanged.
    pub fn set_user_data(mut self, user_data: Arc<dyn Any + Send + Sync>) -> Self {
        self.user_data = Some(user_data);
        self
    }

    /// Validates the configuration and builds the committed forest.
    pub fn commit(self) -> Result<Forest, String> {
        match self.source {
            Some(source) => {
                if self.cmesh.is_some() || self.schemes.is_some() || self.level.is_some() {
                    return Err(
                        "a forest is built either from a coarse mesh or from a source forest, \
                         not both"
                            .to_string(),
                    );
                }
                let mut adapt_fn = self
                    .adapt_fn
                    .ok_or_else(|| "an adapt source needs an adapt callback".to_string())?;
                let mut replace_fn = self.replace_fn;

                let trees = AdaptPass {
                    source,
                    adapt: &mut *adapt_fn,
                    replace: replace_fn.as_deref_mut(),
                    recursive: self.recursive,
                }
                .run();

                let local: u64 = trees.iter().map(|t| t.len() as u64).sum();
                let comm = source.comm.clone();
                let global = comm.sum(local);
                info!("Done forest adapt with {global} total elements");

                Ok(Forest {
                    cmesh: source.cmesh.clone(),
                    schemes: source.schemes.clone(),
                    comm,
                    trees,
                    local_num_elements: local,
                    global_num_elements: global,
                    user_data: self.user_data,
                })
            }
            None => {
                let cmesh = self
                    .cmesh
                    .ok_or_else(|| "a forest needs a coarse mesh or a source forest".to_string())?;
                let schemes = self
                    .schemes
                    .ok_or_else(|| "a forest needs a scheme registry".to_string())?;
                if self.adapt_fn.is_some() || self.replace_fn.is_some() {
                    return Err("adapt callbacks need a source forest".to_string());
                }
                let level = self.level.unwrap_or(0);
                for t in 0..cmesh.num_trees() {
                    let class = cmesh.tree_class(t);
                    if level > class.max_level() {
                        return Err(format!(
                            "uniform level {level} exceeds the {class} maximum of {}",
                            class.max_level(),
                        ));
                    }
                }

                let mut trees: Vec<Tree> = (0..cmesh.num_trees())
                    .map(|t| Tree::new(cmesh.tree_class(t)))
                    .collect();
                trees.par_iter_mut().for_each(|tree| {
                    let scheme = schemes.scheme(tree.eclass());
                    fill_uniform(scheme, &scheme.root(), level, tree);
                });

                let mut offset = 0;
                for tree in &mut trees {
                    tree.set_elements_offset(offset);
                    offset += tree.len() as u64;
                }
                let local = offset;
                let global = self.comm.sum(local);
                debug!("committed uniform level {level} forest with {global} total elements");

                Ok(Forest {
                    cmesh,
                    schemes,
                    comm: self.comm,
                    trees,
                    local_num_elements: local,
                    global_num_elements: global,
                    user_data: self.user_data,
                })
            }
        }
    }
}

impl Default for ForestBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pushes every descendant of `element` at exactly `level`, in SFC order.
fn fill_uniform(scheme: &dyn Scheme, element: &Element, level: u8, tree: &mut Tree) {
    if element.level() == level {
        tree.push(*element);
    } else {
        for child in scheme.children(element) {
            fill_uniform(scheme, &child, level, tree);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::{Forest, ForestBuilder};
    use crate::adapt::AdaptAction;
    use crate::cmesh::CoarseMesh;
    use crate::eclass::ElementClass;
    use crate::element::Element;
    use crate::scheme::{Scheme, SchemeRegistry};

    fn uniform(eclass: ElementClass, level: u8) -> Forest {
        let cmesh = Arc::new(CoarseMesh::new_single(eclass));
        let schemes = Arc::new(SchemeRegistry::default());
        Forest::new_uniform(cmesh, schemes, level).unwrap()
    }

    fn assert_sfc_sorted(forest: &Forest) {
        for tree in forest.trees() {
            let scheme = forest.schemes().scheme(tree.eclass());
            for pair in tree.elements().windows(2) {
                assert_eq!(
                    scheme.compare(&pair[0], &pair[1]),
                    std::cmp::Ordering::Less,
                );
            }
        }
    }

    fn assert_same_leaves(a: &Forest, b: &Forest) {
        assert_eq!(a.num_local_elements(), b.num_local_elements());
        for ((ta, ea), (tb, eb)) in a.leaves().zip(b.leaves()) {
            assert_eq!(ta, tb);
            assert_eq!(ea, eb);
        }
    }

    #[test]
    fn test_commit_validation() {
        assert!(ForestBuilder::new().commit().is_err());

        let cmesh = Arc::new(CoarseMesh::new_single(ElementClass::Quad));
        assert!(Forest::builder().set_cmesh(cmesh.clone()).commit().is_err());

        let schemes = Arc::new(SchemeRegistry::default());
        let too_deep = Forest::new_uniform(cmesh.clone(), schemes.clone(), 99);
        assert!(too_deep.is_err());

        // Replace callbacks are only meaningful when adapting.
        let orphan = Forest::builder()
            .set_cmesh(cmesh)
            .set_schemes(schemes)
            .set_replace(|_, _, _, _, _| {})
            .commit();
        assert!(orphan.is_err());
    }

    #[test]
    fn test_uniform_quad_level_3() {
        let forest = uniform(ElementClass::Quad, 3);
        assert_eq!(forest.num_local_elements(), 64);
        assert_eq!(forest.num_global_elements(), 64);
        assert!(forest.leaves().all(|(_, e)| e.level() == 3));
        assert_sfc_sorted(&forest);

        // The identity adapt reproduces the forest element-wise.
        let same = Forest::new_adapt(&forest, |_, _, _, _| AdaptAction::Keep, false).unwrap();
        assert_same_leaves(&forest, &same);
    }

    #[test]
    fn test_refine_left_boundary_quads() {
        let forest = uniform(ElementClass::Quad, 2);
        assert_eq!(forest.num_local_elements(), 16);

        let adapted = Forest::new_adapt(
            &forest,
            |_, _, _, elements| {
                if elements[0].anchor()[0] == 0 {
                    AdaptAction::Refine
                } else {
                    AdaptAction::Keep
                }
            },
            false,
        )
        .unwrap();

        // 4 of the 16 level-2 quads touch the left boundary; each becomes 4
        // level-3 quads.
        assert_eq!(adapted.num_local_elements(), 28);
        let at_level = |l| adapted.leaves().filter(|(_, e)| e.level() == l).count();
        assert_eq!(at_level(2), 12);
        assert_eq!(at_level(3), 16);
        assert_sfc_sorted(&adapted);
    }

    #[test]
    fn test_coarsen_all_triangles() {
        let forest = uniform(ElementClass::Triangle, 2);
        assert_eq!(forest.num_local_elements(), 16);

        let coarsen_families = |_: &Forest, _: usize, scheme: &dyn Scheme, elements: &[Element]| {
            if elements.len() == scheme.num_children() {
                AdaptAction::Coarsen
            } else {
                AdaptAction::Keep
            }
        };

        let once = Forest::new_adapt(&forest, coarsen_families, false).unwrap();
        assert_eq!(once.num_local_elements(), 4);
        assert!(once.leaves().all(|(_, e)| e.level() == 1));

        let twice = Forest::new_adapt(&once, coarsen_families, false).unwrap();
        assert_eq!(twice.num_local_elements(), 1);
        assert_eq!(twice.element(0).level(), 0);
    }

    #[test]
    fn test_recursive_refine_hex_to_level_3() {
        let forest = uniform(ElementClass::Hex, 1);
        assert_eq!(forest.num_local_elements(), 8);

        let adapted = Forest::new_adapt(
            &forest,
            |_, _, _, elements: &[Element]| {
                if elements[0].level() < 3 {
                    AdaptAction::Refine
                } else {
                    AdaptAction::Keep
                }
            },
            true,
        )
        .unwrap();

        assert_eq!(adapted.num_local_elements(), 512);
        assert!(adapted.leaves().all(|(_, e)| e.level() == 3));
        assert_sfc_sorted(&adapted);
    }

    #[test]
    fn test_refine_single_triangle() {
        let forest = uniform(ElementClass::Triangle, 2);
        let target = *forest.tree(0).element(5);

        let adapted = Forest::new_adapt(
            &forest,
            move |_, _, _, elements: &[Element]| {
                if elements[0] == target {
                    AdaptAction::Refine
                } else {
                    AdaptAction::Keep
                }
            },
            false,
        )
        .unwrap();

        assert_eq!(adapted.num_local_elements(), 19);
        assert_sfc_sorted(&adapted);
        assert_eq!(
            adapted.leaves().filter(|(_, e)| e.level() == 3).count(),
            4,
        );
    }

    #[test]
    fn test_refine_then_coarsen_cancels() {
        let forest = uniform(ElementClass::Quad, 2);

        let refined =
            Forest::new_adapt(&forest, |_, _, _, _| AdaptAction::Refine, false).unwrap();
        assert_eq!(refined.num_local_elements(), 64);

        let back = Forest::new_adapt(
            &refined,
            |_: &Forest, _, scheme: &dyn Scheme, elements: &[Element]| {
                if elements.len() == scheme.num_children() {
                    AdaptAction::Coarsen
                } else {
                    AdaptAction::Keep
                }
            },
            false,
        )
        .unwrap();

        assert_same_leaves(&forest, &back);
    }

    #[test]
    fn test_recursive_refinement_reaches_cap_without_duplicates() {
        let forest = uniform(ElementClass::Triangle, 0);

        let adapted = Forest::new_adapt(
            &forest,
            |_, _, _, elements: &[Element]| {
                if elements[0].level() < 4 {
                    AdaptAction::Refine
                } else {
                    AdaptAction::Keep
                }
            },
            true,
        )
        .unwrap();

        assert_eq!(adapted.num_local_elements(), 256);
        assert_sfc_sorted(&adapted);
    }

    #[test]
    fn test_freshly_refined_family_is_not_coarsened() {
        // An oscillating callback: refine every singleton below level 2,
        // coarsen every family. Families produced by refinement within the
        // same pass must survive it.
        let forest = uniform(ElementClass::Quad, 0);

        let adapted = Forest::new_adapt(
            &forest,
            |_: &Forest, _, scheme: &dyn Scheme, elements: &[Element]| {
                if elements.len() == scheme.num_children() {
                    AdaptAction::Coarsen
                } else if elements[0].level() < 2 {
                    AdaptAction::Refine
                } else {
                    AdaptAction::Keep
                }
            },
            true,
        )
        .unwrap();

        assert_eq!(adapted.num_local_elements(), 16);
        assert!(adapted.leaves().all(|(_, e)| e.level() == 2));
    }

    #[test]
    fn test_replace_callback_carries_tags() {
        let forest = uniform(ElementClass::Quad, 2);
        let scheme_registry = forest.schemes().clone();
        let scheme = scheme_registry.scheme(ElementClass::Quad);

        let mut tags: HashMap<Element, usize> = forest
            .leaves()
            .enumerate()
            .map(|(i, (_, e))| (*e, i))
            .collect();

        let refined = Forest::builder()
            .set_adapt(&forest, |_, _, _, _| AdaptAction::Refine, false)
            .set_replace(|_, _, _, old: &[Element], new: &[Element]| {
                let tag = tags[&old[0]];
                for e in new {
                    tags.insert(*e, tag);
                }
            })
            .commit()
            .unwrap();

        // Every refined leaf carries the tag of its source parent.
        for (_, leaf) in refined.leaves() {
            let parent = scheme.parent(leaf);
            assert_eq!(tags[leaf], tags[&parent]);
        }

        let mut coarse_tags: HashMap<Element, usize> = HashMap::new();
        let back = Forest::builder()
            .set_adapt(
                &refined,
                |_: &Forest, _, scheme: &dyn Scheme, elements: &[Element]| {
                    if elements.len() == scheme.num_children() {
                        AdaptAction::Coarsen
                    } else {
                        AdaptAction::Keep
                    }
                },
                false,
            )
            .set_replace(|_, _, _, old: &[Element], new: &[Element]| {
                coarse_tags.insert(new[0], tags[&old[0]]);
            })
            .commit()
            .unwrap();

        // Every coarsened leaf carries the tag of the first of its family.
        for (_, leaf) in back.leaves() {
            assert_eq!(coarse_tags[leaf], tags[&scheme.child(leaf, 0)]);
        }
    }

    #[test]
    fn test_two_tree_offsets() {
        let cmesh = Arc::new(CoarseMesh::new_unit_square_triangles());
        let schemes = Arc::new(SchemeRegistry::default());
        let forest = Forest::new_uniform(cmesh, schemes, 1).unwrap();

        assert_eq!(forest.num_local_trees(), 2);
        assert_eq!(forest.num_local_elements(), 8);
        assert_eq!(forest.tree(0).elements_offset(), 0);
        assert_eq!(forest.tree(1).elements_offset(), 4);
        assert_eq!(forest.element(5), forest.tree(1).element(1));
    }

    #[test]
    fn test_user_data_is_passed_through() {
        let cmesh = Arc::new(CoarseMesh::new_single(ElementClass::Line));
        let schemes = Arc::new(SchemeRegistry::default());
        let forest = Forest::builder()
            .set_cmesh(cmesh)
            .set_schemes(schemes)
            .set_level(1)
            .set_user_data(Arc::new(7usize))
            .commit()
            .unwrap();

        let data = forest.user_data().unwrap();
        assert_eq!(data.downcast_ref::<usize>(), Some(&7));
    }
}
