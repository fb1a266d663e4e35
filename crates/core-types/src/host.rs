//! Ports implemented by whatever tree the engine runs against.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::{ChangeNotice, NodeId, ObserveScope, ObserverId, Selector};

/// Read access to the host tree plus observer management.
///
/// Implementations use interior mutability; every method takes `&self` so the
/// same host can be shared between the engine and whoever mutates the tree.
pub trait HostTree: Send + Sync + 'static {
    /// The node a whole-document scan starts from.
    fn document_root(&self) -> NodeId;

    /// Text and other non-element nodes are never dredged.
    fn is_element(&self, node: NodeId) -> bool;

    /// Inclusive containment: a node contains itself.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    /// Tests `node` against `selector`, with `node` as the `:scope` anchor.
    fn matches(&self, node: NodeId, selector: &Selector) -> bool;

    /// Descendants of `scope` (excluding `scope`) matching `selector`, in document order.
    fn select_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId>;

    fn select_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.select_all(scope, selector).into_iter().next()
    }

    /// Starts delivering child-list changes under `target`.
    fn observe(&self, target: NodeId, scope: ObserveScope) -> ObserverId;

    /// Stops an observer and discards anything it had not delivered yet.
    fn disconnect(&self, observer: ObserverId);
}

/// Delivery side of the observation mechanism.
pub trait ChangeSource: Send + Sync + 'static {
    /// Drains every pending batch, one notice per observer.
    fn take_changes(&self) -> Vec<ChangeNotice>;

    /// Notified whenever a new record is queued.
    fn change_signal(&self) -> Arc<Notify>;
}
