//! Build a uniform forest on a single tet tree, adapt it, and print the
//! element counts.

use std::sync::Arc;

use sylva::{AdaptAction, CoarseMesh, ElementClass, Forest, SchemeRegistry};

fn basic(level: u8, adapt_level: u8) {
    let cmesh = Arc::new(CoarseMesh::new_single(ElementClass::Tet));
    let schemes = Arc::new(SchemeRegistry::default());

    let forest = Forest::new_uniform(cmesh, schemes, level).unwrap();
    println!(
        "uniform level {level}: {} elements",
        forest.num_global_elements(),
    );

    // Refine everything touching the root anchor down to `adapt_level`.
    let adapted = Forest::new_adapt(
        &forest,
        move |_, _, _, elements| {
            let e = &elements[0];
            if e.level() < adapt_level && e.anchor() == [0, 0, 0] {
                AdaptAction::Refine
            } else {
                AdaptAction::Keep
            }
        },
        true,
    )
    .unwrap();
    println!(
        "adapted to level {adapt_level} at the origin: {} elements",
        adapted.num_global_elements(),
    );
}

fn main() {
    env_logger::init();

    basic(2, 4);
    basic(3, 5);
}
