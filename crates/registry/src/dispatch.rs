//! Observation lifecycle and routing of change batches into registry mutations.

use rne_core_types::{
    ChangeBatch, ChangeRecord, ChangeSource, HostTree, NodeId, ObserveScope, ObserverId,
};
use tracing::{debug, trace};

use crate::{
    dredge::dredge,
    events, metrics,
    model::ObserverRoute,
    redaction::RedactionFilter,
    state::RegistryImpl,
};

impl<H: HostTree> RegistryImpl<H> {
    /// Watches `node` for roots appearing or disappearing.
    ///
    /// The watch stays attached in every state until `panic`, so a page that
    /// starts without roots still picks them up later.
    pub fn watch_document(&mut self, node: NodeId, scope: ObserveScope) {
        self.unwatch_document();
        self.document_watch = Some(self.attach(node, scope, ObserverRoute::Document));
    }

    pub fn unwatch_document(&mut self) {
        if let Some(observer) = self.document_watch.take() {
            self.detach(observer);
        }
    }

    /// Dormant to Monitoring: attaches observers top-down, picks up streams and
    /// items that appeared unobserved, then renders every item.
    pub fn start_monitoring(&mut self) {
        if self.monitoring {
            return;
        }
        self.monitoring = true;
        self.prune_detached();

        let roots: Vec<(NodeId, ObserveScope)> = self
            .roots
            .values()
            .filter(|root| root.observer.is_none())
            .map(|root| (root.node, root.scope))
            .collect();
        for (node, scope) in roots {
            let observer = self.attach(node, scope, ObserverRoute::Root(node));
            if let Some(root) = self.roots.get_mut(&node) {
                root.observer = Some(observer);
            }
        }

        self.register_all_streams();
        let streams: Vec<NodeId> = self
            .streams
            .values()
            .filter(|stream| stream.observer.is_none())
            .map(|stream| stream.node)
            .collect();
        for node in streams {
            let observer = self.attach(node, ObserveScope::Subtree, ObserverRoute::Stream(node));
            if let Some(stream) = self.streams.get_mut(&node) {
                stream.observer = Some(observer);
            }
        }

        self.update_all(None);
        events::emit_monitoring(true, &self.counts());
    }

    /// Monitoring to Dormant: detaches root and stream observers and clears all
    /// suppression. Registrations, the identity cache and the document watch stay.
    pub fn stop_monitoring(&mut self) {
        if !self.monitoring {
            return;
        }
        self.monitoring = false;
        self.detach_registrations();
        self.clear_all(None);
        events::emit_monitoring(false, &self.counts());
    }

    pub fn set_monitoring(&mut self, on: bool) {
        if on {
            self.start_monitoring();
        } else {
            self.stop_monitoring();
        }
    }

    fn detach_registrations(&mut self) {
        let mut observers: Vec<ObserverId> = Vec::new();
        for root in self.roots.values_mut() {
            observers.extend(root.observer.take());
        }
        for stream in self.streams.values_mut() {
            observers.extend(stream.observer.take());
        }
        for observer in observers {
            self.detach(observer);
        }
    }

    /// Drops registrations whose nodes left the document while nobody was watching.
    fn prune_detached(&mut self) {
        let document = self.host.document_root();
        let host = self.host.as_ref();
        let roots: Vec<NodeId> = self
            .roots
            .keys()
            .copied()
            .filter(|node| !host.contains(document, *node))
            .collect();
        let streams: Vec<NodeId> = self
            .streams
            .keys()
            .copied()
            .filter(|node| !host.contains(document, *node))
            .collect();
        let items: Vec<NodeId> = self
            .items
            .keys()
            .copied()
            .filter(|node| !host.contains(document, *node))
            .collect();

        for node in roots {
            self.clear_all(Some(&RedactionFilter::within(node)));
            self.unregister_root(node);
        }
        for node in streams {
            self.clear_all(Some(&RedactionFilter::within(node)));
            self.unregister_stream(node);
        }
        for node in items {
            self.apply_redaction(node, false);
            self.unregister_item(node);
        }
    }

    /// Routes one batch to the level its observer watches.
    ///
    /// Returns false, doing nothing, when the observer is unknown or already detached.
    pub fn handle_changes(&mut self, observer: ObserverId, batch: &ChangeBatch) -> bool {
        let Some(route) = self.routes.get(&observer).copied() else {
            debug!(target: "rne.registry", %observer, "change batch for detached observer dropped");
            return false;
        };
        metrics::record_change_batch(route.level());
        let roots_before = self.roots.len();
        let mut roots_found = false;
        for record in &batch.records {
            if !self.routes.contains_key(&observer) {
                debug!(target: "rne.registry", %observer, "observer detached mid-batch");
                break;
            }
            match route {
                ObserverRoute::Document => roots_found |= self.on_document_record(record),
                ObserverRoute::Root(_) => self.on_root_record(record),
                ObserverRoute::Stream(_) => self.on_stream_record(record),
            }
        }
        if route == ObserverRoute::Document {
            self.settle_document_batch(roots_before, roots_found);
        }
        true
    }

    /// Monitoring ends once the page has no roots left; roots found while not
    /// monitoring are announced so the driver can ask for settings again.
    fn settle_document_batch(&mut self, roots_before: usize, roots_found: bool) {
        if self.roots.is_empty() {
            if self.monitoring {
                debug!(target: "rne.registry", roots_before, "last root gone, monitoring stops");
                self.stop_monitoring();
            }
        } else if roots_found && !self.monitoring {
            self.announce_roots();
        }
    }

    /// True when `node` is attached to the document again, inside one of `containers`.
    ///
    /// A node moved between watched containers shows up as a removal on one
    /// observer and an addition on another, in either order.
    fn reattached<'a>(
        &self,
        node: NodeId,
        mut containers: impl Iterator<Item = &'a NodeId>,
    ) -> bool {
        let host = self.host.as_ref();
        host.contains(host.document_root(), node)
            && containers.any(|container| host.contains(*container, node))
    }

    /// Returns whether any new root was registered.
    fn on_document_record(&mut self, record: &ChangeRecord) -> bool {
        let mut found_any = false;
        for &added in &record.added {
            for found in dredge(self.host.as_ref(), added, &self.root_descriptors) {
                found_any |= self.insert_root(found.node, &found.descriptor);
                if self.monitoring {
                    self.update_all(Some(&RedactionFilter::within(found.node)));
                }
            }
        }
        let document = self.host.document_root();
        for &removed in &record.removed {
            for found in dredge(self.host.as_ref(), removed, &self.root_descriptors) {
                if self.roots.contains_key(&found.node)
                    && !self.host.contains(document, found.node)
                {
                    self.clear_all(Some(&RedactionFilter::within(found.node)));
                    self.unregister_root(found.node);
                }
            }
        }
        found_any
    }

    fn on_root_record(&mut self, record: &ChangeRecord) {
        for &added in &record.added {
            for found in dredge(self.host.as_ref(), added, &self.stream_descriptors) {
                self.insert_stream(found.node, &found.descriptor);
                self.update_all(Some(&RedactionFilter::within(found.node)));
            }
        }
        for &removed in &record.removed {
            for found in dredge(self.host.as_ref(), removed, &self.stream_descriptors) {
                if self.streams.contains_key(&found.node)
                    && !self.reattached(found.node, self.roots.keys())
                {
                    self.clear_all(Some(&RedactionFilter::within(found.node)));
                    self.unregister_stream(found.node);
                }
            }
        }
    }

    fn on_stream_record(&mut self, record: &ChangeRecord) {
        let hook = self.stream_node_added_hook.clone();
        for &added in &record.added {
            if let Some(hook) = &hook {
                if hook(self.host.as_ref(), added) {
                    trace!(%added, "added node handled by page hook");
                    continue;
                }
            }
            for found in dredge(self.host.as_ref(), added, &self.item_descriptors) {
                self.insert_item(found.node, &found.descriptor);
                let suppressed = match self.items.get(&found.node) {
                    Some(item) => self.wants_suppressed(item),
                    None => continue,
                };
                self.apply_redaction(found.node, suppressed);
            }
        }
        for &removed in &record.removed {
            for found in dredge(self.host.as_ref(), removed, &self.item_descriptors) {
                if self.items.contains_key(&found.node)
                    && !self.reattached(found.node, self.streams.keys())
                {
                    self.apply_redaction(found.node, false);
                    self.unregister_item(found.node);
                }
            }
        }
    }

    /// Page navigation reset: drops everything and rescans the document for roots.
    ///
    /// Returns whether any roots are present afterwards.
    pub fn reset_page(&mut self) -> bool {
        let had_roots = !self.roots.is_empty();
        if had_roots {
            self.stop_monitoring();
            self.clear_all(None);
            self.unregister_all_roots();
        }
        self.register_all_roots();
        events::emit_page_reset(had_roots, &self.counts());
        !self.roots.is_empty()
    }

    /// Collapses to Idle from any state: no observers, no suppression, no registrations.
    pub fn panic(&mut self) {
        let before = self.counts();
        self.monitoring = false;
        self.detach_registrations();
        self.clear_all(None);
        self.unregister_all_roots();
        self.identities.clear();
        self.unwatch_document();
        for observer in self.routes.keys().copied().collect::<Vec<_>>() {
            self.detach(observer);
        }
        events::emit_panic(&before);
    }
}

impl<H: HostTree + ChangeSource> RegistryImpl<H> {
    /// Drains the host's pending notices and dispatches them. Returns the number handled.
    pub fn pump_changes(&mut self) -> usize {
        let notices = self.host.take_changes();
        let mut handled = 0;
        for notice in notices {
            if self.handle_changes(notice.observer, &notice.batch) {
                handled += 1;
            }
        }
        handled
    }
}
