use std::collections::BTreeMap;

use parking_lot::{RwLock, RwLockWriteGuard};
use rne_core_types::{ChangeRecord, NodeId, ObserveScope, ObserverId, Selector};
use tracing::trace;

use crate::errors::DomError;
use crate::matcher;
use crate::model::{El, ElementData, NodeContent, NodeData};
use crate::observe::ObserverTable;

pub(crate) struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.push(NodeContent::Element(ElementData {
            tag: "html".into(),
            ..Default::default()
        }));
        tree
    }

    fn push(&mut self, content: NodeContent) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            content,
        });
        id
    }

    fn get(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0 as usize)
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.0 as usize)
    }

    fn require(&self, node: NodeId) -> Result<&NodeData, DomError> {
        self.get(node).ok_or(DomError::UnknownNode(node))
    }

    pub(crate) fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.get(node)?.content {
            NodeContent::Element(element) => Some(element),
            NodeContent::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self
            .get_mut(node)
            .ok_or(DomError::UnknownNode(node))?
            .content
        {
            NodeContent::Element(element) => Ok(element),
            NodeContent::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    pub(crate) fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.parent
    }

    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if self.get(node).is_none() || self.get(ancestor).is_none() {
            return false;
        }
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Descendants of `scope` in document order, `scope` excluded.
    pub(crate) fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.get(scope) {
            Some(data) => data.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(node) = stack.pop() {
            out.push(node);
            if let Some(data) = self.get(node) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.get(node)?.parent?;
        if let Some(parent_data) = self.get_mut(parent) {
            parent_data.children.retain(|child| *child != node);
        }
        if let Some(data) = self.get_mut(node) {
            data.parent = None;
        }
        Some(parent)
    }

    fn build(&mut self, el: &El) -> NodeId {
        let mut attributes = el.attrs.clone();
        let mut classes = el.classes.clone();
        if let Some(raw) = attributes.remove("class") {
            classes.extend(raw.split_whitespace().map(str::to_string));
        }
        if let Some(id) = &el.id {
            attributes.insert("id".into(), id.clone());
        }
        let node = self.push(NodeContent::Element(ElementData {
            tag: el.tag.to_ascii_lowercase(),
            classes,
            attributes,
        }));
        if let Some(text) = &el.text {
            let text_node = self.push(NodeContent::Text(text.clone()));
            self.link(node, text_node, None);
        }
        for child in &el.children {
            let child_node = self.build(child);
            self.link(node, child_node, None);
        }
        node
    }

    fn link(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        if let Some(parent_data) = self.get_mut(parent) {
            let index = before
                .and_then(|reference| parent_data.children.iter().position(|c| *c == reference))
                .unwrap_or(parent_data.children.len());
            parent_data.children.insert(index, child);
        }
        if let Some(child_data) = self.get_mut(child) {
            child_data.parent = Some(parent);
        }
    }
}

/// The observable host document.
pub struct Document {
    tree: RwLock<Tree>,
    pub(crate) observers: ObserverTable,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `html > body` document.
    pub fn new() -> Self {
        let mut tree = Tree::new();
        let root = tree.root;
        let body = tree.build(&El::new("body"));
        tree.link(root, body, None);
        Self {
            tree: RwLock::new(tree),
            observers: ObserverTable::new(),
            body,
        }
    }

    pub fn document_element(&self) -> NodeId {
        self.tree.read().root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.tree.write().build(&El::new(tag))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.tree.write().push(NodeContent::Text(text.to_string()))
    }

    /// Builds a detached subtree from a declarative `El`.
    pub fn instantiate(&self, el: &El) -> NodeId {
        self.tree.write().build(el)
    }

    /// Builds `el` and appends it under `parent` as a single mutation.
    pub fn append(&self, parent: NodeId, el: &El) -> Result<NodeId, DomError> {
        let node = self.instantiate(el);
        self.append_child(parent, node)?;
        Ok(node)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    pub fn insert_after(&self, reference: NodeId, child: NodeId) -> Result<(), DomError> {
        let (parent, next) = {
            let tree = self.tree.read();
            let parent = tree
                .parent(reference)
                .ok_or(DomError::UnknownNode(reference))?;
            let siblings = &tree.require(parent)?.children;
            let next = siblings
                .iter()
                .position(|c| *c == reference)
                .and_then(|index| siblings.get(index + 1).copied());
            (parent, next)
        };
        self.insert_before(parent, child, next)
    }

    /// Inserts `child` under `parent` before `reference` (or last), moving it if attached elsewhere.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.require(child)?;
        tree.element(parent).ok_or_else(|| match tree.get(parent) {
            Some(_) => DomError::NotAnElement(parent),
            None => DomError::UnknownNode(parent),
        })?;
        if tree.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if tree.parent(reference) != Some(parent) || reference == child {
                return Err(DomError::NotAChild { parent, reference });
            }
        }

        let mut records = Vec::new();
        if let Some(old_parent) = tree.detach(child) {
            records.extend(self.records_for(&tree, old_parent, ChangeRecord::removed([child])));
        }
        tree.link(parent, child, reference);
        records.extend(self.records_for(&tree, parent, ChangeRecord::added([child])));
        drop(tree);

        trace!(%parent, %child, "dom.insert");
        self.observers.enqueue(records);
        Ok(())
    }

    /// Detaches `node` from its parent. Detached nodes keep their own subtree.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.require(node)?;
        let Some(parent) = tree.detach(node) else {
            return Ok(());
        };
        let records = self.records_for(&tree, parent, ChangeRecord::removed([node]));
        drop(tree);

        trace!(%parent, %node, "dom.remove");
        self.observers.enqueue(records);
        Ok(())
    }

    /// Replaces every child of `parent` with the given elements, as one removal and one addition.
    pub fn replace_children(&self, parent: NodeId, els: &[El]) -> Result<Vec<NodeId>, DomError> {
        let new_nodes: Vec<NodeId> = els.iter().map(|el| self.instantiate(el)).collect();
        let mut tree = self.tree.write();
        tree.element(parent).ok_or(DomError::NotAnElement(parent))?;
        let old_children = tree.require(parent)?.children.clone();
        for child in &old_children {
            tree.detach(*child);
        }
        for child in &new_nodes {
            tree.link(parent, *child, None);
        }
        let record = ChangeRecord {
            added: new_nodes.clone(),
            removed: old_children,
        };
        let records = self.records_for(&tree, parent, record);
        drop(tree);
        self.observers.enqueue(records);
        Ok(new_nodes)
    }

    fn records_for(
        &self,
        tree: &RwLockWriteGuard<'_, Tree>,
        parent: NodeId,
        record: ChangeRecord,
    ) -> Vec<(ObserverId, ChangeRecord)> {
        self.observers
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| {
                entry.target == parent
                    || (entry.scope.is_subtree() && tree.contains(entry.target, parent))
            })
            .map(|(id, _)| (id, record.clone()))
            .collect()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().parent(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .read()
            .get(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.tree.read().element(node).is_some()
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.tree.read().contains(ancestor, node)
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let tree = self.tree.read();
        tree.contains(tree.root, node)
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.read().element(node).map(|el| el.tag.clone())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree.read().element(node)?.attribute(name)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        let element = tree.element_mut(node)?;
        if name == "class" {
            element.classes = value.split_whitespace().map(str::to_string).collect();
        } else {
            element.attributes.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        let element = tree.element_mut(node)?;
        if name == "class" {
            element.classes.clear();
        } else {
            element.attributes.remove(name);
        }
        Ok(())
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.tree
            .read()
            .element(node)
            .map(|el| el.has_class(class))
            .unwrap_or(false)
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        let element = tree.element_mut(node)?;
        if !element.has_class(class) {
            element.classes.push(class.to_string());
        }
        Ok(())
    }

    pub fn remove_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.element_mut(node)?.classes.retain(|c| c != class);
        Ok(())
    }

    /// Adds or removes a class, the way `classList.toggle(name, force)` does.
    pub fn toggle_class(&self, node: NodeId, class: &str, on: bool) -> Result<(), DomError> {
        if on {
            self.add_class(node, class)
        } else {
            self.remove_class(node, class)
        }
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.tree
            .read()
            .element(node)
            .map(|el| el.classes.clone())
            .unwrap_or_default()
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let tree = self.tree.read();
        let mut text = String::new();
        if let Some(NodeContent::Text(value)) = tree.get(node).map(|data| &data.content) {
            text.push_str(value);
        }
        for descendant in tree.descendants(node) {
            if let Some(NodeContent::Text(value)) = tree.get(descendant).map(|data| &data.content)
            {
                text.push_str(value);
            }
        }
        text
    }

    /// Tests `node` against `selector`, with `node` itself as the `:scope` anchor.
    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        matcher::matches(&self.tree.read(), node, selector, node)
    }

    pub fn select_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let tree = self.tree.read();
        tree.descendants(scope)
            .into_iter()
            .filter(|node| matcher::matches(&tree, *node, selector, scope))
            .collect()
    }

    pub fn select_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let tree = self.tree.read();
        tree.descendants(scope)
            .into_iter()
            .find(|node| matcher::matches(&tree, *node, selector, scope))
    }

    /// Nearest ancestor (excluding `node`) for which `predicate` holds.
    pub fn closest_ancestor(
        &self,
        node: NodeId,
        mut predicate: impl FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut cursor = self.parent(node);
        while let Some(ancestor) = cursor {
            if predicate(ancestor) {
                return Some(ancestor);
            }
            cursor = self.parent(ancestor);
        }
        None
    }

    /// Short label such as `div#timeline.stream` for logs and reports.
    pub fn describe(&self, node: NodeId) -> String {
        let tree = self.tree.read();
        match tree.get(node).map(|data| &data.content) {
            Some(NodeContent::Element(element)) => {
                let mut label = element.tag.clone();
                if let Some(id) = element.id() {
                    label.push('#');
                    label.push_str(id);
                }
                for class in &element.classes {
                    label.push('.');
                    label.push_str(class);
                }
                label
            }
            Some(NodeContent::Text(_)) => "#text".to_string(),
            None => format!("<unknown {node}>"),
        }
    }

    pub fn attributes(&self, node: NodeId) -> BTreeMap<String, String> {
        self.tree
            .read()
            .element(node)
            .map(|el| el.attributes.clone())
            .unwrap_or_default()
    }

    pub fn observe(&self, target: NodeId, scope: ObserveScope) -> ObserverId {
        self.observers.attach(target, scope)
    }

    pub fn disconnect(&self, observer: ObserverId) -> bool {
        self.observers.detach(observer)
    }

    pub fn is_observing(&self, observer: ObserverId) -> bool {
        self.observers.is_active(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.active_count()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.observers.has_pending()
    }
}
