use std::sync::Arc;

use rne_core_types::{
    ChangeNotice, ChangeSource, HostTree, NodeId, ObserveScope, ObserverId, Selector,
};
use tokio::sync::Notify;

use crate::document::Document;

impl HostTree for Document {
    fn document_root(&self) -> NodeId {
        self.document_element()
    }

    fn is_element(&self, node: NodeId) -> bool {
        Document::is_element(self, node)
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        Document::contains(self, ancestor, node)
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        Document::matches(self, node, selector)
    }

    fn select_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        Document::select_all(self, scope, selector)
    }

    fn select_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        Document::select_first(self, scope, selector)
    }

    fn observe(&self, target: NodeId, scope: ObserveScope) -> ObserverId {
        Document::observe(self, target, scope)
    }

    fn disconnect(&self, observer: ObserverId) {
        Document::disconnect(self, observer);
    }
}

impl ChangeSource for Document {
    fn take_changes(&self) -> Vec<ChangeNotice> {
        self.observers.drain()
    }

    fn change_signal(&self) -> Arc<Notify> {
        self.observers.signal()
    }
}
