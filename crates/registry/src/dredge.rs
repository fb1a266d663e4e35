//! Discovery of nodes of interest inside an arbitrary subtree.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use rne_core_types::{HostTree, NodeId};
use tracing::trace;

use crate::descriptor::{Descriptor, DescriptorSet};

/// A node together with the descriptor it satisfied.
pub struct Dredged<H> {
    pub node: NodeId,
    pub descriptor: Arc<Descriptor<H>>,
}

impl<H> Clone for Dredged<H> {
    fn clone(&self) -> Self {
        Self {
            node: self.node,
            descriptor: Arc::clone(&self.descriptor),
        }
    }
}

impl<H> fmt::Debug for Dredged<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dredged")
            .field("node", &self.node)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Finds every node under (and including) `node` that satisfies a descriptor of `set`.
///
/// If `node` itself matches, it is the only result and its descendants are not
/// searched. Otherwise each descriptor's hint selects candidates which are then
/// tested; a node is claimed by the first descriptor (in set order) it passes.
/// Non-element nodes yield nothing.
pub fn dredge<H: HostTree>(host: &H, node: NodeId, set: &DescriptorSet<H>) -> Vec<Dredged<H>> {
    if !host.is_element(node) {
        return Vec::new();
    }

    if let Some(descriptor) = set.iter().find(|d| d.test(host, node)) {
        return vec![Dredged {
            node,
            descriptor: Arc::clone(descriptor),
        }];
    }

    let mut claimed = HashSet::new();
    let mut found = Vec::new();
    for descriptor in set.iter() {
        for candidate in host.select_all(node, descriptor.hint()) {
            if claimed.contains(&candidate) {
                continue;
            }
            if descriptor.test(host, candidate) {
                claimed.insert(candidate);
                found.push(Dredged {
                    node: candidate,
                    descriptor: Arc::clone(descriptor),
                });
            } else {
                trace!(%candidate, descriptor = descriptor.name(), "hint matched, test failed");
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rne_core_types::EntityKind;
    use rne_dom::{Document, El};

    use crate::descriptor::Identities;

    fn items() -> DescriptorSet<Document> {
        let tweet = Descriptor::item(
            "TWEET",
            "div.tweet",
            |_: &Document, _| Identities::default(),
            |_: &Document, _, _| {},
        )
        .unwrap()
        .with_test(|doc: &Document, node| {
            doc.has_class(node, "tweet") && doc.has_attribute(node, "data-user-id")
        });
        let card = Descriptor::item(
            "CARD",
            "div.card",
            |_: &Document, _| Identities::default(),
            |_: &Document, _, _| {},
        )
        .unwrap();
        DescriptorSet::from_descriptors(EntityKind::Item, [tweet, card]).unwrap()
    }

    fn names(found: &[Dredged<Document>]) -> Vec<&str> {
        found.iter().map(|d| d.descriptor.name()).collect()
    }

    #[test]
    fn matched_node_is_the_only_result() {
        let doc = Document::new();
        let outer = doc
            .append(
                doc.body(),
                &El::new("div")
                    .class("tweet")
                    .attr("data-user-id", "1")
                    .child(El::new("div").class("tweet").attr("data-user-id", "2")),
            )
            .unwrap();

        let found = dredge(&doc, outer, &items());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, outer);
    }

    #[test]
    fn descendants_are_collected_in_descriptor_order() {
        let doc = Document::new();
        let list = doc
            .append(
                doc.body(),
                &El::new("ol").children([
                    El::new("li").child(El::new("div").class("card")),
                    El::new("li").child(El::new("div").class("tweet").attr("data-user-id", "1")),
                    // Hint matches but the full test fails.
                    El::new("li").child(El::new("div").class("tweet")),
                ]),
            )
            .unwrap();

        let found = dredge(&doc, list, &items());
        assert_eq!(names(&found), vec!["TWEET", "CARD"]);
    }

    #[test]
    fn a_node_is_claimed_once() {
        let doc = Document::new();
        let list = doc
            .append(
                doc.body(),
                &El::new("ol").child(
                    El::new("div")
                        .class("tweet")
                        .class("card")
                        .attr("data-user-id", "1"),
                ),
            )
            .unwrap();
        let found = dredge(&doc, list, &items());
        assert_eq!(names(&found), vec!["TWEET"]);
    }

    #[test]
    fn text_nodes_yield_nothing() {
        let doc = Document::new();
        let text = doc.create_text("tweet");
        assert!(dredge(&doc, text, &items()).is_empty());
    }
}
