use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use rne_core_types::{EntityKind, HostTree, IdentityId, NodeId, ObserveScope, ObserverId};
use tracing::{debug, trace};

use crate::{
    descriptor::{Descriptor, DescriptorSet},
    dredge::dredge,
    errors::RegistryError,
    events,
    model::{
        EngineCounts, EngineState, IdentityRecord, ItemRegistration,
        ObserverRoute, RootRegistration, StreamRegistration,
    },
};

/// Receives every batch of identities the engine has not seen before.
pub type NewIdentitiesCallback = Box<dyn FnMut(&[IdentityId]) + Send>;

/// Told the root count when the document watch finds roots while monitoring is off.
pub type RootsFoundCallback = Box<dyn FnMut(usize) + Send>;

/// Consulted for each node added under a stream; `true` means handled, skip dredging.
pub type NodeAddedHook<H> = Arc<dyn Fn(&H, NodeId) -> bool + Send + Sync>;

/// The registry and redaction engine for one page.
///
/// Owns every registration and the identity cache. All mutation goes through
/// `&mut self`; callers that share an engine wrap it in a mutex.
pub struct RegistryImpl<H: HostTree> {
    pub(crate) host: Arc<H>,
    pub(crate) root_descriptors: DescriptorSet<H>,
    pub(crate) stream_descriptors: DescriptorSet<H>,
    pub(crate) item_descriptors: DescriptorSet<H>,
    pub(crate) roots: IndexMap<NodeId, RootRegistration>,
    pub(crate) streams: IndexMap<NodeId, StreamRegistration>,
    pub(crate) items: IndexMap<NodeId, ItemRegistration>,
    pub(crate) identities: HashMap<IdentityId, IdentityRecord>,
    pub(crate) routes: HashMap<ObserverId, ObserverRoute>,
    pub(crate) document_watch: Option<ObserverId>,
    pub(crate) monitoring: bool,
    pub(crate) suppress_all: bool,
    pub(crate) stream_node_added_hook: Option<NodeAddedHook<H>>,
    new_identities_callback: Option<NewIdentitiesCallback>,
    roots_found_callback: Option<RootsFoundCallback>,
}

impl<H: HostTree> RegistryImpl<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            root_descriptors: DescriptorSet::new(EntityKind::Root),
            stream_descriptors: DescriptorSet::new(EntityKind::Stream),
            item_descriptors: DescriptorSet::new(EntityKind::Item),
            roots: IndexMap::new(),
            streams: IndexMap::new(),
            items: IndexMap::new(),
            identities: HashMap::new(),
            routes: HashMap::new(),
            document_watch: None,
            monitoring: false,
            suppress_all: false,
            stream_node_added_hook: None,
            new_identities_callback: None,
            roots_found_callback: None,
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn set_root_descriptors(
        &mut self,
        descriptors: impl IntoIterator<Item = Descriptor<H>>,
    ) -> Result<(), RegistryError> {
        self.root_descriptors = DescriptorSet::from_descriptors(EntityKind::Root, descriptors)?;
        Ok(())
    }

    pub fn set_stream_descriptors(
        &mut self,
        descriptors: impl IntoIterator<Item = Descriptor<H>>,
    ) -> Result<(), RegistryError> {
        self.stream_descriptors =
            DescriptorSet::from_descriptors(EntityKind::Stream, descriptors)?;
        Ok(())
    }

    pub fn set_item_descriptors(
        &mut self,
        descriptors: impl IntoIterator<Item = Descriptor<H>>,
    ) -> Result<(), RegistryError> {
        self.item_descriptors = DescriptorSet::from_descriptors(EntityKind::Item, descriptors)?;
        Ok(())
    }

    pub fn root_descriptors(&self) -> &DescriptorSet<H> {
        &self.root_descriptors
    }

    pub fn stream_descriptors(&self) -> &DescriptorSet<H> {
        &self.stream_descriptors
    }

    pub fn item_descriptors(&self) -> &DescriptorSet<H> {
        &self.item_descriptors
    }

    pub fn set_stream_node_added_hook(&mut self, hook: Option<NodeAddedHook<H>>) {
        self.stream_node_added_hook = hook;
    }

    pub fn set_new_identities_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&[IdentityId]) + Send + 'static,
    {
        self.new_identities_callback = Some(Box::new(callback));
    }

    pub fn set_roots_found_callback<F>(&mut self, callback: F)
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.roots_found_callback = Some(Box::new(callback));
    }

    pub(crate) fn announce_roots(&mut self) {
        let roots = self.roots.len();
        events::emit_roots_found(&self.counts());
        if let Some(callback) = self.roots_found_callback.as_mut() {
            callback(roots);
        }
    }

    /// Registers a root and every stream already inside it. Re-registering returns the existing record.
    pub fn register_root(
        &mut self,
        node: NodeId,
        descriptor: &str,
    ) -> Result<&RootRegistration, RegistryError> {
        let descriptor = Arc::clone(self.root_descriptors.require(descriptor)?);
        self.insert_root(node, &descriptor);
        Ok(&self.roots[&node])
    }

    /// Registers a stream and every item already inside it.
    ///
    /// An already known stream keeps its record, but its items are dredged
    /// again so entries that appeared unobserved are picked up.
    pub fn register_stream(
        &mut self,
        node: NodeId,
        descriptor: &str,
    ) -> Result<&StreamRegistration, RegistryError> {
        let descriptor = Arc::clone(self.stream_descriptors.require(descriptor)?);
        self.insert_stream(node, &descriptor);
        Ok(&self.streams[&node])
    }

    pub fn register_item(
        &mut self,
        node: NodeId,
        descriptor: &str,
    ) -> Result<&ItemRegistration, RegistryError> {
        let descriptor = Arc::clone(self.item_descriptors.require(descriptor)?);
        self.insert_item(node, &descriptor);
        Ok(&self.items[&node])
    }

    pub(crate) fn insert_root(&mut self, node: NodeId, descriptor: &Arc<Descriptor<H>>) -> bool {
        if self.roots.contains_key(&node) {
            trace!(%node, "root already registered");
            return false;
        }
        let scope = descriptor.observe_scope();
        let observer = if self.monitoring {
            Some(self.attach(node, scope, ObserverRoute::Root(node)))
        } else {
            None
        };
        self.roots.insert(
            node,
            RootRegistration {
                node,
                descriptor: descriptor.name().to_string(),
                scope,
                observer,
            },
        );
        events::emit_registered(EntityKind::Root, node, descriptor.name(), &self.counts());
        self.register_streams_within(node);
        true
    }

    pub(crate) fn insert_stream(
        &mut self,
        node: NodeId,
        descriptor: &Arc<Descriptor<H>>,
    ) -> bool {
        let created = !self.streams.contains_key(&node);
        if created {
            let observer = if self.monitoring {
                Some(self.attach(node, ObserveScope::Subtree, ObserverRoute::Stream(node)))
            } else {
                None
            };
            self.streams.insert(
                node,
                StreamRegistration {
                    node,
                    descriptor: descriptor.name().to_string(),
                    observer,
                },
            );
            events::emit_registered(EntityKind::Stream, node, descriptor.name(), &self.counts());
        }
        for found in dredge(self.host.as_ref(), node, &self.item_descriptors) {
            self.insert_item(found.node, &found.descriptor);
        }
        created
    }

    pub(crate) fn insert_item(&mut self, node: NodeId, descriptor: &Arc<Descriptor<H>>) -> bool {
        if self.items.contains_key(&node) {
            return false;
        }
        let (primary, identities) = descriptor
            .extract_identities(self.host.as_ref(), node)
            .normalized();

        let mut fresh = Vec::new();
        for identity in &identities {
            match self.identities.entry(identity.clone()) {
                Entry::Occupied(mut entry) => entry.get_mut().count += 1,
                Entry::Vacant(entry) => {
                    entry.insert(IdentityRecord {
                        count: 1,
                        ..IdentityRecord::default()
                    });
                    fresh.push(identity.clone());
                }
            }
        }

        self.items.insert(
            node,
            ItemRegistration {
                node,
                descriptor: descriptor.name().to_string(),
                primary,
                identities,
                suppressed: false,
            },
        );
        events::emit_registered(EntityKind::Item, node, descriptor.name(), &self.counts());

        if !fresh.is_empty() {
            self.report_new_identities(&fresh);
        }
        true
    }

    fn register_streams_within(&mut self, node: NodeId) {
        for found in dredge(self.host.as_ref(), node, &self.stream_descriptors) {
            self.insert_stream(found.node, &found.descriptor);
        }
    }

    fn report_new_identities(&mut self, fresh: &[IdentityId]) {
        events::emit_new_identities(fresh);
        if let Some(callback) = self.new_identities_callback.as_mut() {
            callback(fresh);
        }
    }

    /// Drops an item and releases its identity references.
    pub fn unregister_item(&mut self, node: NodeId) -> bool {
        self.remove_item(node).is_some()
    }

    pub(crate) fn remove_item(&mut self, node: NodeId) -> Option<ItemRegistration> {
        let item = self.items.shift_remove(&node)?;
        for identity in &item.identities {
            if let Entry::Occupied(mut entry) = self.identities.entry(identity.clone()) {
                let record = entry.get_mut();
                record.count = record.count.saturating_sub(1);
                if record.count == 0 {
                    entry.remove();
                }
            }
        }
        events::emit_unregistered(EntityKind::Item, node, &self.counts());
        Some(item)
    }

    /// Drops a stream, its observer, and every item it contains.
    pub fn unregister_stream(&mut self, node: NodeId) -> bool {
        let Some(stream) = self.streams.shift_remove(&node) else {
            return false;
        };
        if let Some(observer) = stream.observer {
            self.detach(observer);
        }
        let items = self.contained(self.items.keys(), node);
        for item in items {
            self.remove_item(item);
        }
        events::emit_unregistered(EntityKind::Stream, node, &self.counts());
        true
    }

    /// Drops a root, its observer, and every stream and item it contains.
    pub fn unregister_root(&mut self, node: NodeId) -> bool {
        let Some(root) = self.roots.shift_remove(&node) else {
            return false;
        };
        if let Some(observer) = root.observer {
            self.detach(observer);
        }
        let streams = self.contained(self.streams.keys(), node);
        for stream in streams {
            self.unregister_stream(stream);
        }
        let items = self.contained(self.items.keys(), node);
        for item in items {
            self.remove_item(item);
        }
        events::emit_unregistered(EntityKind::Root, node, &self.counts());
        true
    }

    fn contained<'a>(&self, nodes: impl Iterator<Item = &'a NodeId>, ancestor: NodeId) -> Vec<NodeId> {
        nodes
            .copied()
            .filter(|node| self.host.contains(ancestor, *node))
            .collect()
    }

    /// Registers every root present in the document. Returns the number of registered roots.
    ///
    /// Descriptors flagged unique take only their first match.
    pub fn register_all_roots(&mut self) -> usize {
        let document = self.host.document_root();
        let mut found: Vec<(NodeId, Arc<Descriptor<H>>)> = Vec::new();
        for descriptor in self.root_descriptors.iter() {
            let host = self.host.as_ref();
            let mut candidates = host
                .select_all(document, descriptor.hint())
                .into_iter()
                .filter(|node| descriptor.test(host, *node));
            if descriptor.is_unique() {
                found.extend(candidates.next().map(|node| (node, Arc::clone(descriptor))));
            } else {
                found.extend(candidates.map(|node| (node, Arc::clone(descriptor))));
            }
        }

        let mut present: Vec<String> = Vec::new();
        for (node, descriptor) in found {
            self.insert_root(node, &descriptor);
            if !present.iter().any(|name| name == descriptor.name()) {
                present.push(descriptor.name().to_string());
            }
        }
        if !present.is_empty() {
            debug!(target: "rne.registry", roots = ?present, "roots present");
        }
        self.roots.len()
    }

    /// Dredges every registered root for streams, and every stream for items.
    pub fn register_all_streams(&mut self) {
        let roots: Vec<NodeId> = self.roots.keys().copied().collect();
        for root in roots {
            self.register_streams_within(root);
        }
    }

    /// Unregisters every stream, then any item left outside a stream.
    pub fn unregister_all_streams(&mut self) {
        let streams: Vec<NodeId> = self.streams.keys().copied().collect();
        for stream in streams {
            self.unregister_stream(stream);
        }
        let items: Vec<NodeId> = self.items.keys().copied().collect();
        for item in items {
            self.remove_item(item);
        }
    }

    /// Leaves the engine with no registrations at all.
    pub fn unregister_all_roots(&mut self) {
        let roots: Vec<NodeId> = self.roots.keys().copied().collect();
        for root in roots {
            self.unregister_root(root);
        }
        self.unregister_all_streams();
    }

    /// Forgets every cached verdict, renders every item unsuppressed, and
    /// returns the identities that need classifying again.
    pub fn reset_classifications(&mut self) -> Vec<IdentityId> {
        for record in self.identities.values_mut() {
            record.classification = Default::default();
        }
        self.clear_all(None);
        self.registered_identities()
    }

    pub(crate) fn attach(
        &mut self,
        node: NodeId,
        scope: ObserveScope,
        route: ObserverRoute,
    ) -> ObserverId {
        let observer = self.host.observe(node, scope);
        self.routes.insert(observer, route);
        trace!(%observer, %node, level = route.level(), "observer attached");
        observer
    }

    pub(crate) fn detach(&mut self, observer: ObserverId) {
        self.routes.remove(&observer);
        self.host.disconnect(observer);
        trace!(%observer, "observer detached");
    }

    pub fn state(&self) -> EngineState {
        if self.monitoring {
            EngineState::Monitoring
        } else if self.roots.is_empty() {
            EngineState::Idle
        } else {
            EngineState::Dormant
        }
    }

    pub fn counts(&self) -> EngineCounts {
        EngineCounts {
            roots: self.roots.len(),
            streams: self.streams.len(),
            items: self.items.len(),
            identities: self.identities.len(),
        }
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn root(&self, node: NodeId) -> Option<&RootRegistration> {
        self.roots.get(&node)
    }

    pub fn stream(&self, node: NodeId) -> Option<&StreamRegistration> {
        self.streams.get(&node)
    }

    pub fn item(&self, node: NodeId) -> Option<&ItemRegistration> {
        self.items.get(&node)
    }

    pub fn identity(&self, identity: &IdentityId) -> Option<&IdentityRecord> {
        self.identities.get(identity)
    }

    /// Registration order.
    pub fn roots(&self) -> impl Iterator<Item = &RootRegistration> {
        self.roots.values()
    }

    pub fn streams(&self) -> impl Iterator<Item = &StreamRegistration> {
        self.streams.values()
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemRegistration> {
        self.items.values()
    }

    /// Every tracked identity, sorted.
    pub fn registered_identities(&self) -> Vec<IdentityId> {
        let mut ids: Vec<IdentityId> = self.identities.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn active_observer_count(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Identities;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rne_dom::{Document, El};

    fn engine(doc: &Arc<Document>) -> RegistryImpl<Document> {
        let mut engine = RegistryImpl::new(Arc::clone(doc));
        engine
            .set_root_descriptors([Descriptor::root("TIMELINE", "div#timeline")
                .unwrap()
                .unique(true)
                .subtree(true)])
            .unwrap();
        engine
            .set_stream_descriptors([Descriptor::stream("STREAM", "ol.stream").unwrap()])
            .unwrap();
        engine
            .set_item_descriptors([Descriptor::item(
                "TWEET",
                "div.tweet[data-user-id]",
                |doc: &Document, node| {
                    let mut ids = Identities::default();
                    if let Some(author) = doc.attribute(node, "data-user-id") {
                        ids = Identities::single(author);
                    }
                    if let Some(quoted) = doc.attribute(node, "data-quoted-id") {
                        ids.all.push(quoted.into());
                    }
                    ids
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

    fn page(doc: &Document, tweets: Vec<El>) -> (NodeId, NodeId) {
        let timeline = doc
            .append(
                doc.body(),
                &El::new("div")
                    .id("timeline")
                    .child(El::new("ol").class("stream").children(tweets)),
            )
            .unwrap();
        let stream = doc.children(timeline)[0];
        (timeline, stream)
    }

    #[test]
    fn registering_a_root_dredges_streams_and_items() {
        let doc = Arc::new(Document::new());
        let (timeline, stream) = page(&doc, vec![tweet("1"), tweet("2")]);
        let mut engine = engine(&doc);

        engine.register_root(timeline, "TIMELINE").unwrap();
        assert_eq!(engine.counts(), EngineCounts { roots: 1, streams: 1, items: 2, identities: 2 });
        assert!(engine.stream(stream).is_some());
        assert_eq!(engine.state(), EngineState::Dormant);
        assert_eq!(engine.active_observer_count(), 0);
    }

    #[test]
    fn registration_is_idempotent() {
        let doc = Arc::new(Document::new());
        let (_, stream) = page(&doc, vec![tweet("1")]);
        let mut engine = engine(&doc);

        let first = engine.register_stream(stream, "STREAM").unwrap().clone();
        let item = engine.items().next().unwrap().node;
        let second = engine.register_stream(stream, "STREAM").unwrap().clone();
        assert_eq!(first, second);

        let before = engine.item(item).cloned();
        engine.register_item(item, "TWEET").unwrap();
        assert_eq!(engine.item(item).cloned(), before);
        assert_eq!(engine.identity(&"1".into()).unwrap().count, 1);
        assert_eq!(engine.item_count(), 1);
    }

    #[test]
    fn identity_counts_follow_live_items() {
        let doc = Arc::new(Document::new());
        let (_, stream) = page(
            &doc,
            vec![
                tweet("7"),
                tweet("7").attr("data-quoted-id", "8"),
                tweet("8").attr("data-quoted-id", "8"),
            ],
        );
        let mut engine = engine(&doc);
        engine.register_stream(stream, "STREAM").unwrap();
        let items: Vec<NodeId> = engine.items().map(|i| i.node).collect();

        assert_eq!(engine.identity(&"7".into()).unwrap().count, 2);
        assert_eq!(engine.identity(&"8".into()).unwrap().count, 2);
        assert_eq!(
            engine.item(items[2]).unwrap().identities,
            vec![IdentityId::from("8")]
        );

        assert!(engine.unregister_item(items[1]));
        assert!(!engine.unregister_item(items[1]));
        assert_eq!(engine.identity(&"7".into()).unwrap().count, 1);
        assert_eq!(engine.identity(&"8".into()).unwrap().count, 1);

        engine.unregister_item(items[2]);
        assert!(engine.identity(&"8".into()).is_none());
    }

    #[test]
    fn new_identities_are_reported_once_per_item() {
        let doc = Arc::new(Document::new());
        let (_, stream) = page(
            &doc,
            vec![tweet("1").attr("data-quoted-id", "2"), tweet("1")],
        );
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut engine = engine(&doc);
        let sink = Arc::clone(&reports);
        engine.set_new_identities_callback(move |ids| sink.lock().push(ids.to_vec()));

        engine.register_stream(stream, "STREAM").unwrap();
        assert_eq!(
            *reports.lock(),
            vec![vec![IdentityId::from("1"), IdentityId::from("2")]]
        );
    }

    #[test]
    fn unregistering_a_root_cascades_by_containment() {
        let doc = Arc::new(Document::new());
        let (timeline, _) = page(&doc, vec![tweet("1")]);
        let outside = doc
            .append(
                doc.body(),
                &El::new("ol").class("stream").child(tweet("2")),
            )
            .unwrap();
        let mut engine = engine(&doc);
        engine.register_root(timeline, "TIMELINE").unwrap();
        engine.register_stream(outside, "STREAM").unwrap();
        assert_eq!(engine.item_count(), 2);

        assert!(engine.unregister_root(timeline));
        assert_eq!(engine.counts(), EngineCounts { roots: 0, streams: 1, items: 1, identities: 1 });
        assert!(engine.identity(&"2".into()).is_some());
        assert!(engine.identity(&"1".into()).is_none());
    }

    #[test]
    fn register_all_roots_honours_unique() {
        let doc = Arc::new(Document::new());
        page(&doc, vec![]);
        page(&doc, vec![]);
        let mut engine = engine(&doc);
        assert_eq!(engine.register_all_roots(), 1);

        engine
            .set_root_descriptors([Descriptor::root("TIMELINE", "div#timeline").unwrap()])
            .unwrap();
        assert_eq!(engine.register_all_roots(), 2);
    }

    #[test]
    fn unknown_descriptor_names_are_errors() {
        let doc = Arc::new(Document::new());
        let mut engine = engine(&doc);
        assert!(matches!(
            engine.register_item(doc.body(), "PROFILE_CARD"),
            Err(RegistryError::UnknownDescriptor { kind: EntityKind::Item, .. })
        ));
    }

    #[test]
    fn reset_classifications_returns_every_identity() {
        let doc = Arc::new(Document::new());
        let (_, stream) = page(&doc, vec![tweet("9"), tweet("3")]);
        let mut engine = engine(&doc);
        engine.register_stream(stream, "STREAM").unwrap();
        engine.set_identity_classification(&"9".into(), true.into());

        let ids = engine.reset_classifications();
        assert_eq!(ids, vec![IdentityId::from("3"), IdentityId::from("9")]);
        assert!(engine.items().all(|item| !item.suppressed));
        assert!(!engine.identity(&"9".into()).unwrap().classification.is_tainted());
    }
}
