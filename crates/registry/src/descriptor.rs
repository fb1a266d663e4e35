//! Data-only definitions of the entity kinds the engine understands.
//!
//! A descriptor pairs a coarse structural hint, used to narrow candidates
//! during dredging, with a full structural test. Item descriptors also carry
//! the identity extractor and the redraw callback.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rne_core_types::{EntityKind, HostTree, IdentityId, NodeId, ObserveScope, Selector};

use crate::errors::RegistryError;

pub type TestFn<H> = Arc<dyn Fn(&H, NodeId) -> bool + Send + Sync>;
pub type ExtractFn<H> = Arc<dyn Fn(&H, NodeId) -> Identities + Send + Sync>;
pub type SuppressFn<H> = Arc<dyn Fn(&H, NodeId, bool) + Send + Sync>;

/// Identities scraped from one item.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Identities {
    pub primary: Option<IdentityId>,
    pub all: Vec<IdentityId>,
}

impl Identities {
    pub fn new(primary: Option<IdentityId>, all: Vec<IdentityId>) -> Self {
        Self { primary, all }
    }

    pub fn single(id: impl Into<IdentityId>) -> Self {
        let id = id.into();
        Self {
            primary: Some(id.clone()),
            all: vec![id],
        }
    }

    /// Deduplicates in first-seen order and makes sure the primary leads.
    pub fn normalized(self) -> (Option<IdentityId>, Vec<IdentityId>) {
        let mut out: Vec<IdentityId> = Vec::with_capacity(self.all.len() + 1);
        if let Some(primary) = &self.primary {
            out.push(primary.clone());
        }
        for id in self.all {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        (self.primary, out)
    }
}

pub enum DescriptorKind<H> {
    Root {
        /// Only the first match in the document is registered.
        unique: bool,
        scope: ObserveScope,
    },
    Stream,
    Item {
        extract: ExtractFn<H>,
        set_suppressed: SuppressFn<H>,
    },
}

pub struct Descriptor<H> {
    name: String,
    hint: Selector,
    test: Option<TestFn<H>>,
    kind: DescriptorKind<H>,
}

impl<H: HostTree> Descriptor<H> {
    /// A root region, observed over its direct children by default.
    pub fn root(name: impl Into<String>, hint: &str) -> Result<Self, RegistryError> {
        Ok(Self {
            name: name.into(),
            hint: Selector::parse(hint)?,
            test: None,
            kind: DescriptorKind::Root {
                unique: false,
                scope: ObserveScope::Children,
            },
        })
    }

    pub fn stream(name: impl Into<String>, hint: &str) -> Result<Self, RegistryError> {
        Ok(Self {
            name: name.into(),
            hint: Selector::parse(hint)?,
            test: None,
            kind: DescriptorKind::Stream,
        })
    }

    pub fn item<E, S>(
        name: impl Into<String>,
        hint: &str,
        extract: E,
        set_suppressed: S,
    ) -> Result<Self, RegistryError>
    where
        E: Fn(&H, NodeId) -> Identities + Send + Sync + 'static,
        S: Fn(&H, NodeId, bool) + Send + Sync + 'static,
    {
        Ok(Self {
            name: name.into(),
            hint: Selector::parse(hint)?,
            test: None,
            kind: DescriptorKind::Item {
                extract: Arc::new(extract),
                set_suppressed: Arc::new(set_suppressed),
            },
        })
    }

    /// Replaces the default test, which is the hint itself.
    pub fn with_test<F>(mut self, test: F) -> Self
    where
        F: Fn(&H, NodeId) -> bool + Send + Sync + 'static,
    {
        self.test = Some(Arc::new(test));
        self
    }

    /// Root descriptors only; ignored elsewhere.
    pub fn unique(mut self, value: bool) -> Self {
        if let DescriptorKind::Root { unique, .. } = &mut self.kind {
            *unique = value;
        }
        self
    }

    /// Root descriptors only; ignored elsewhere.
    pub fn subtree(mut self, value: bool) -> Self {
        if let DescriptorKind::Root { scope, .. } = &mut self.kind {
            *scope = ObserveScope::from_subtree(value);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hint(&self) -> &Selector {
        &self.hint
    }

    pub fn kind(&self) -> EntityKind {
        match self.kind {
            DescriptorKind::Root { .. } => EntityKind::Root,
            DescriptorKind::Stream => EntityKind::Stream,
            DescriptorKind::Item { .. } => EntityKind::Item,
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self.kind, DescriptorKind::Root { unique: true, .. })
    }

    /// Observation depth for a root; streams are always watched deeply.
    pub fn observe_scope(&self) -> ObserveScope {
        match self.kind {
            DescriptorKind::Root { scope, .. } => scope,
            _ => ObserveScope::Subtree,
        }
    }

    pub fn test(&self, host: &H, node: NodeId) -> bool {
        match &self.test {
            Some(test) => test(host, node),
            None => host.matches(node, &self.hint),
        }
    }

    /// Empty for anything but items.
    pub fn extract_identities(&self, host: &H, node: NodeId) -> Identities {
        match &self.kind {
            DescriptorKind::Item { extract, .. } => extract(host, node),
            _ => Identities::default(),
        }
    }

    pub fn set_suppressed(&self, host: &H, node: NodeId, suppressed: bool) {
        if let DescriptorKind::Item { set_suppressed, .. } = &self.kind {
            set_suppressed(host, node, suppressed);
        }
    }
}

impl<H> fmt::Debug for Descriptor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DescriptorKind::Root { .. } => EntityKind::Root,
            DescriptorKind::Stream => EntityKind::Stream,
            DescriptorKind::Item { .. } => EntityKind::Item,
        };
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("hint", &self.hint.as_str())
            .finish()
    }
}

/// An ordered set of descriptors of one kind. Order is match priority.
pub struct DescriptorSet<H> {
    kind: EntityKind,
    entries: Vec<Arc<Descriptor<H>>>,
    by_name: HashMap<String, usize>,
}

impl<H: HostTree> DescriptorSet<H> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn from_descriptors(
        kind: EntityKind,
        descriptors: impl IntoIterator<Item = Descriptor<H>>,
    ) -> Result<Self, RegistryError> {
        let mut set = Self::new(kind);
        for descriptor in descriptors {
            set.push(descriptor)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, descriptor: Descriptor<H>) -> Result<(), RegistryError> {
        if descriptor.kind() != self.kind {
            return Err(RegistryError::KindMismatch {
                name: descriptor.name().to_string(),
                expected: self.kind,
                found: descriptor.kind(),
            });
        }
        if self.by_name.contains_key(descriptor.name()) {
            return Err(RegistryError::DuplicateDescriptor(
                descriptor.name().to_string(),
            ));
        }
        self.by_name
            .insert(descriptor.name().to_string(), self.entries.len());
        self.entries.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Descriptor<H>>> {
        self.by_name.get(name).map(|index| &self.entries[*index])
    }

    pub fn require(&self, name: &str) -> Result<&Arc<Descriptor<H>>, RegistryError> {
        self.get(name).ok_or_else(|| RegistryError::UnknownDescriptor {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Descriptor<H>>> {
        self.entries.iter()
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.name()).collect()
    }
}

impl<H> fmt::Debug for DescriptorSet<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("kind", &self.kind)
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rne_dom::{Document, El};

    #[test]
    fn identities_are_deduplicated_with_primary_first() {
        let ids = Identities::new(
            Some("1".into()),
            vec!["2".into(), "1".into(), "2".into(), "3".into()],
        );
        let (primary, all) = ids.normalized();
        assert_eq!(primary, Some(IdentityId::from("1")));
        assert_eq!(
            all,
            vec![
                IdentityId::from("1"),
                IdentityId::from("2"),
                IdentityId::from("3")
            ]
        );
    }

    #[test]
    fn set_rejects_duplicates_and_foreign_kinds() {
        let mut set = DescriptorSet::<Document>::new(EntityKind::Stream);
        set.push(Descriptor::stream("COLUMN", "section.js-column").unwrap())
            .unwrap();
        assert!(matches!(
            set.push(Descriptor::stream("COLUMN", "section").unwrap()),
            Err(RegistryError::DuplicateDescriptor(name)) if name == "COLUMN"
        ));
        assert!(matches!(
            set.push(Descriptor::root("TIMELINE", "div#timeline").unwrap()),
            Err(RegistryError::KindMismatch { .. })
        ));
        assert_eq!(set.names(), vec!["COLUMN"]);
        assert!(set.require("MISSING").is_err());
    }

    #[test]
    fn default_test_is_the_hint() {
        let doc = Document::new();
        let column = doc
            .append(doc.body(), &El::new("section").class("js-column"))
            .unwrap();
        let plain = doc.append(doc.body(), &El::new("section")).unwrap();
        let descriptor = Descriptor::<Document>::stream("COLUMN", "section.js-column").unwrap();
        assert!(descriptor.test(&doc, column));
        assert!(!descriptor.test(&doc, plain));
    }

    #[test]
    fn root_flags_only_apply_to_roots() {
        let root = Descriptor::<Document>::root("TIMELINE", "div#timeline")
            .unwrap()
            .unique(true)
            .subtree(true);
        assert!(root.is_unique());
        assert_eq!(root.observe_scope(), ObserveScope::Subtree);

        let stream = Descriptor::<Document>::stream("NAV", "ol").unwrap().unique(true);
        assert!(!stream.is_unique());
        assert_eq!(stream.observe_scope(), ObserveScope::Subtree);
    }

    #[test]
    fn invalid_hint_is_reported() {
        assert!(matches!(
            Descriptor::<Document>::stream("BROKEN", "ol >"),
            Err(RegistryError::InvalidHint(_))
        ));
    }
}
