//! The adapt engine: consumes the element sequence of each source tree in
//! SFC order and produces the refined/coarsened output sequence.
//!
//! Per tree, three cursors drive the pass: `considered` (next source index),
//! `inserted` (elements already in the output), and `coarsen_floor` (the
//! smallest output index that may still take part in recursive coarsening).
//! A window of up to `num_children` consecutive source elements is a family
//! candidate when the child ids match 0, 1, 2, …; otherwise the window is a
//! singleton. Recursive refinement runs over an explicit LIFO stack with
//! children pushed in reverse so child 0 is processed next; recursive
//! coarsening re-inspects the output tail whenever the last inserted
//! element closes a family.

use log::info;

use crate::element::Element;
use crate::forest::Forest;
use crate::scheme::Scheme;
use crate::tree::Tree;

/// The verdict of an adapt callback for one window of elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptAction {
    /// Replace the first window element by its children.
    Refine,
    /// Copy the first window element unchanged.
    Keep,
    /// Replace the window (which must be a family) by its parent.
    Coarsen,
}

pub(crate) type AdaptDyn<'a> =
    dyn FnMut(&Forest, usize, &dyn Scheme, &[Element]) -> AdaptAction + 'a;

pub(crate) type ReplaceDyn<'a> =
    dyn FnMut(&Forest, usize, &dyn Scheme, &[Element], &[Element]) + 'a;

pub(crate) struct AdaptPass<'f, 'p> {
    pub source: &'f Forest,
    pub adapt: &'p mut AdaptDyn<'f>,
    pub replace: Option<&'p mut ReplaceDyn<'f>>,
    pub recursive: bool,
}

impl AdaptPass<'_, '_> {
    /// Adapts every local tree of the source forest and returns the new
    /// trees with their element offsets set.
    pub(crate) fn run(&mut self) -> Vec<Tree> {
        info!(
            "Into forest adapt from {} total elements",
            self.source.num_global_elements(),
        );

        let mut trees = Vec::with_capacity(self.source.num_local_trees());
        let mut offset = 0;
        for ltree in 0..self.source.num_local_trees() {
            let tree_from = self.source.tree(ltree);
            let mut tree = Tree::new(tree_from.eclass());
            self.adapt_tree(ltree, tree_from, &mut tree);
            tree.set_elements_offset(offset);
            offset += tree.len() as u64;
            trees.push(tree);
        }
        trees
    }

    fn adapt_tree(&mut self, ltree: usize, tree_from: &Tree, tree: &mut Tree) {
        let source = self.source;
        let scheme = source.schemes().scheme(tree_from.eclass());
        let num_children = scheme.num_children();
        let num_from = tree_from.len();

        let mut considered = 0;
        let mut inserted = 0;
        let mut coarsen_floor = 0;
        let mut refine_list: Vec<Element> = Vec::new();

        while considered < num_from {
            // Truncate the window at the first element whose child id does
            // not match its position.
            let window = num_children.min(num_from - considered);
            let matched = (0..window)
                .take_while(|&z| scheme.child_id(tree_from.element(considered + z)) == z)
                .count();
            let num_elements = if matched == num_children { num_children } else { 1 };
            let elements_from =
                &tree_from.elements()[considered..considered + num_elements];
            debug_assert!(num_elements == 1 || scheme.is_family(elements_from));

            let action = (self.adapt)(source, ltree, scheme, elements_from);
            debug_assert!(
                num_elements == num_children || action != AdaptAction::Coarsen,
                "adapt callback coarsens a window that is not a family",
            );

            match action {
                AdaptAction::Refine => {
                    debug_assert!(
                        elements_from[0].level() < scheme.max_level(),
                        "adapt callback refines past the maximum level",
                    );
                    let children = scheme.children(&elements_from[0]);
                    self.call_replace(ltree, scheme, &elements_from[..1], &children);
                    if self.recursive {
                        // A family that emerges from a refinement is never
                        // coarsened again within this pass.
                        coarsen_floor = inserted + num_children;
                        refine_list.extend(children.iter().rev());
                        self.refine_recursive(ltree, scheme, &mut refine_list, tree, &mut inserted);
                    } else {
                        for child in children {
                            tree.push(child);
                        }
                        inserted += num_children;
                    }
                    considered += 1;
                }
                AdaptAction::Coarsen => {
                    let parent = scheme.parent(&elements_from[0]);
                    self.call_replace(
                        ltree,
                        scheme,
                        elements_from,
                        std::slice::from_ref(&parent),
                    );
                    tree.push(parent);
                    inserted += 1;
                    if self.recursive && scheme.child_id(&parent) == num_children - 1 {
                        self.coarsen_recursive(ltree, scheme, tree, coarsen_floor, &mut inserted);
                    }
                    considered += num_children;
                }
                AdaptAction::Keep => {
                    let element = elements_from[0];
                    tree.push(element);
                    inserted += 1;
                    if self.recursive && scheme.child_id(&element) == num_children - 1 {
                        self.coarsen_recursive(ltree, scheme, tree, coarsen_floor, &mut inserted);
                    }
                    considered += 1;
                }
            }
        }

        debug_assert!(refine_list.is_empty());
        debug_assert_eq!(inserted, tree.len());
    }

    /// Drains the refine stack: each popped element is either expanded, with
    /// its children pushed back in reverse, or committed to the output.
    fn refine_recursive(
        &mut self,
        ltree: usize,
        scheme: &dyn Scheme,
        refine_list: &mut Vec<Element>,
        tree: &mut Tree,
        inserted: &mut usize,
    ) {
        let source = self.source;
        while let Some(element) = refine_list.pop() {
            let action = (self.adapt)(source, ltree, scheme, std::slice::from_ref(&element));
            debug_assert!(
                action != AdaptAction::Coarsen,
                "adapt callback coarsens a window that is not a family",
            );
            if action == AdaptAction::Refine {
                debug_assert!(
                    element.level() < scheme.max_level(),
                    "adapt callback refines past the maximum level",
                );
                let children = scheme.children(&element);
                self.call_replace(ltree, scheme, std::slice::from_ref(&element), &children);
                refine_list.extend(children.iter().rev());
            } else {
                tree.push(element);
                *inserted += 1;
            }
        }
    }

    /// The last inserted element closed a family boundary: keep replacing
    /// the output tail by its parent while the tail is a family above the
    /// coarsen floor and the callback agrees. The inserted parent may close
    /// a higher family in turn.
    fn coarsen_recursive(
        &mut self,
        ltree: usize,
        scheme: &dyn Scheme,
        tree: &mut Tree,
        coarsen_floor: usize,
        inserted: &mut usize,
    ) {
        let source = self.source;
        let num_children = scheme.num_children();
        debug_assert_eq!(*inserted, tree.len());
        debug_assert_eq!(
            scheme.child_id(tree.element(*inserted - 1)),
            num_children - 1,
        );

        loop {
            if *inserted < num_children {
                return;
            }
            let pos = *inserted - num_children;
            if pos < coarsen_floor {
                return;
            }
            if scheme.child_id(tree.element(*inserted - 1)) != num_children - 1 {
                return;
            }
            let family = &tree.elements()[pos..*inserted];
            if !family
                .iter()
                .enumerate()
                .all(|(i, e)| scheme.child_id(e) == i)
            {
                return;
            }
            debug_assert!(scheme.is_family(family));
            if (self.adapt)(source, ltree, scheme, family) != AdaptAction::Coarsen {
                return;
            }

            let family: Vec<Element> = family.to_vec();
            let parent = scheme.parent(&family[0]);
            tree.truncate(pos);
            tree.push(parent);
            *inserted = pos + 1;
            self.call_replace(ltree, scheme, &family, std::slice::from_ref(&parent));
        }
    }

    fn call_replace(
        &mut self,
        ltree: usize,
        scheme: &dyn Scheme,
        old: &[Element],
        new: &[Element],
    ) {
        let source = self.source;
        if let Some(replace) = self.replace.as_deref_mut() {
            replace(source, ltree, scheme, old, new);
        }
    }
}
