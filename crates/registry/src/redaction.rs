use rne_core_types::{Classification, HostTree, IdentityId, NodeId};
use tracing::debug;

use crate::{events, metrics, model::ItemRegistration, state::RegistryImpl};

/// Narrows a bulk redaction pass. Empty fields select everything.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RedactionFilter {
    /// Items referencing this identity.
    pub identity: Option<IdentityId>,
    /// Items contained in this node, e.g. a root or a stream.
    pub within: Option<NodeId>,
}

impl RedactionFilter {
    pub fn identity(identity: impl Into<IdentityId>) -> Self {
        Self {
            identity: Some(identity.into()),
            within: None,
        }
    }

    pub fn within(node: NodeId) -> Self {
        Self {
            identity: None,
            within: Some(node),
        }
    }

    fn selects<H: HostTree>(&self, host: &H, item: &ItemRegistration) -> bool {
        if let Some(identity) = &self.identity {
            if !item.references(identity) {
                return false;
            }
        }
        match self.within {
            Some(ancestor) => host.contains(ancestor, item.node),
            None => true,
        }
    }
}

impl<H: HostTree> RegistryImpl<H> {
    /// True when any identity of the item is classified as tainted.
    pub fn is_tainted(&self, item: &ItemRegistration) -> bool {
        item.identities.iter().any(|identity| {
            self.identities
                .get(identity)
                .map(|record| record.classification.is_tainted())
                .unwrap_or(false)
        })
    }

    /// The state an item should render with right now.
    pub fn wants_suppressed(&self, item: &ItemRegistration) -> bool {
        self.suppress_all || self.is_tainted(item)
    }

    /// Hands `suppressed` to the item's redraw callback. False if the node is not a registered item.
    pub fn apply_redaction(&mut self, node: NodeId, suppressed: bool) -> bool {
        let Some(item) = self.items.get_mut(&node) else {
            return false;
        };
        match self.item_descriptors.get(&item.descriptor) {
            Some(descriptor) => {
                descriptor.set_suppressed(self.host.as_ref(), node, suppressed);
                item.suppressed = suppressed;
                metrics::record_redaction(suppressed);
                true
            }
            None => {
                debug!(%node, descriptor = %item.descriptor, "item descriptor no longer active");
                false
            }
        }
    }

    /// Recomputes suppression for every selected item. Returns how many were selected.
    pub fn update_all(&mut self, filter: Option<&RedactionFilter>) -> usize {
        let targets: Vec<(NodeId, bool)> = self
            .select(filter)
            .into_iter()
            .map(|item| (item.node, self.wants_suppressed(item)))
            .collect();
        for (node, suppressed) in &targets {
            self.apply_redaction(*node, *suppressed);
        }
        targets.len()
    }

    /// Renders every selected item unsuppressed, whatever its classification.
    pub fn clear_all(&mut self, filter: Option<&RedactionFilter>) -> usize {
        let targets: Vec<NodeId> = self
            .select(filter)
            .into_iter()
            .map(|item| item.node)
            .collect();
        for node in &targets {
            self.apply_redaction(*node, false);
        }
        targets.len()
    }

    fn select(&self, filter: Option<&RedactionFilter>) -> Vec<&ItemRegistration> {
        self.items
            .values()
            .filter(|item| match filter {
                Some(filter) => filter.selects(self.host.as_ref(), item),
                None => true,
            })
            .collect()
    }

    /// Caches a verdict and redraws the items referencing the identity.
    ///
    /// Returns false when the identity is no longer tracked; the verdict is dropped.
    pub fn set_identity_classification(
        &mut self,
        identity: &IdentityId,
        value: Classification,
    ) -> bool {
        let applied = match self.identities.get_mut(identity) {
            Some(record) => {
                record.classification = value;
                true
            }
            None => false,
        };
        let affected = self.update_all(Some(&RedactionFilter::identity(identity.clone())));
        events::emit_classification(identity, applied, affected);
        applied
    }

    /// Suppresses every item regardless of classification, or reverts to per-item state.
    pub fn set_suppress_all(&mut self, on: bool) {
        self.suppress_all = on;
        let affected = self.update_all(None);
        events::emit_suppress_all(on, affected);
    }

    pub fn is_suppress_all(&self) -> bool {
        self.suppress_all
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::descriptor::{Descriptor, Identities};
    use pretty_assertions::assert_eq;
    use rne_dom::{Document, El};

    fn engine(doc: &Arc<Document>) -> RegistryImpl<Document> {
        let mut engine = RegistryImpl::new(Arc::clone(doc));
        engine
            .set_stream_descriptors([Descriptor::stream("STREAM", "ol.stream").unwrap()])
            .unwrap();
        engine
            .set_item_descriptors([Descriptor::item(
                "TWEET",
                "div.tweet[data-user-id]",
                |doc: &Document, node| {
                    Identities::single(doc.attribute(node, "data-user-id").unwrap_or_default())
                },
                |doc: &Document, node, on| {
                    let _ = doc.toggle_class(node, "redacted", on);
                },
            )
            .unwrap()])
            .unwrap();
        engine
    }

    fn tweet(user: &str) -> El {
        El::new("div").class("tweet").attr("data-user-id", user)
    }

    fn rendered(doc: &Document, engine: &RegistryImpl<Document>) -> Vec<bool> {
        engine
            .items()
            .map(|item| doc.has_class(item.node, "redacted"))
            .collect()
    }

    #[test]
    fn suppression_tracks_classification_and_override() {
        let doc = Arc::new(Document::new());
        let stream = doc
            .append(
                doc.body(),
                &El::new("ol").class("stream").children([tweet("1"), tweet("2")]),
            )
            .unwrap();
        let mut engine = engine(&doc);
        engine.register_stream(stream, "STREAM").unwrap();

        assert!(engine.set_identity_classification(&"1".into(), Classification::Tainted));
        assert_eq!(rendered(&doc, &engine), vec![true, false]);

        engine.set_suppress_all(true);
        assert_eq!(rendered(&doc, &engine), vec![true, true]);
        for item in engine.items() {
            assert_eq!(item.suppressed, engine.wants_suppressed(item));
        }

        engine.set_suppress_all(false);
        assert_eq!(rendered(&doc, &engine), vec![true, false]);

        engine.set_identity_classification(&"1".into(), Classification::Clean);
        assert_eq!(rendered(&doc, &engine), vec![false, false]);
    }

    #[test]
    fn stale_verdicts_are_dropped() {
        let doc = Arc::new(Document::new());
        let mut engine = engine(&doc);
        assert!(!engine.set_identity_classification(&"404".into(), Classification::Tainted));
        assert!(engine.identity(&"404".into()).is_none());
    }

    #[test]
    fn filters_limit_the_pass() {
        let doc = Arc::new(Document::new());
        let left = doc
            .append(doc.body(), &El::new("ol").class("stream").child(tweet("1")))
            .unwrap();
        let right = doc
            .append(doc.body(), &El::new("ol").class("stream").child(tweet("1")))
            .unwrap();
        let mut engine = engine(&doc);
        engine.register_stream(left, "STREAM").unwrap();
        engine.register_stream(right, "STREAM").unwrap();
        engine.set_suppress_all(true);

        assert_eq!(engine.clear_all(Some(&RedactionFilter::within(left))), 1);
        assert_eq!(rendered(&doc, &engine), vec![false, true]);

        assert_eq!(engine.clear_all(Some(&RedactionFilter::identity("1"))), 2);
        assert_eq!(rendered(&doc, &engine), vec![false, false]);

        assert_eq!(engine.update_all(Some(&RedactionFilter::identity("2"))), 0);
    }
}
