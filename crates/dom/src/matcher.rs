//! Right-to-left selector matching against the arena tree.

use rne_core_types::selector::{Combinator, Compound};
use rne_core_types::{NodeId, Selector};

use crate::document::Tree;

/// `anchor` is the node a query runs from; only it satisfies `:scope`.
pub(crate) fn matches(tree: &Tree, node: NodeId, selector: &Selector, anchor: NodeId) -> bool {
    let steps = selector.steps();
    if steps.is_empty() {
        return false;
    }
    match_step(tree, node, steps, steps.len() - 1, anchor)
}

fn match_step(
    tree: &Tree,
    node: NodeId,
    steps: &[(Combinator, Compound)],
    index: usize,
    anchor: NodeId,
) -> bool {
    let (combinator, compound) = &steps[index];
    if !compound_matches(tree, node, compound, anchor) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match combinator {
        Combinator::Child => match tree.parent(node) {
            Some(parent) => match_step(tree, parent, steps, index - 1, anchor),
            None => false,
        },
        Combinator::Descendant => {
            let mut cursor = tree.parent(node);
            while let Some(ancestor) = cursor {
                if match_step(tree, ancestor, steps, index - 1, anchor) {
                    return true;
                }
                cursor = tree.parent(ancestor);
            }
            false
        }
    }
}

fn compound_matches(tree: &Tree, node: NodeId, compound: &Compound, anchor: NodeId) -> bool {
    let Some(element) = tree.element(node) else {
        return false;
    };
    if compound.scope && node != anchor {
        return false;
    }
    if let Some(tag) = &compound.tag {
        if !element.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if element.id() != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|class| element.has_class(class)) {
        return false;
    }
    compound.attrs.iter().all(|test| match element.attribute(&test.name) {
        Some(actual) => match &test.value {
            Some(expected) => &actual == expected,
            None => true,
        },
        None => false,
    })
}
