//! Change notifications delivered by the host tree.

use crate::{NodeId, ObserverId};

/// One structural mutation as seen by an observer.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeRecord {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl ChangeRecord {
    pub fn added(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            added: nodes.into_iter().collect(),
            removed: Vec::new(),
        }
    }

    pub fn removed(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            added: Vec::new(),
            removed: nodes.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Records accumulated for one observer during a single change cycle, in delivery order.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeBatch {
    pub records: Vec<ChangeRecord>,
}

impl ChangeBatch {
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    pub fn single(record: ChangeRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.iter().all(ChangeRecord::is_empty)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// A batch addressed to the observer that produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeNotice {
    pub observer: ObserverId,
    pub batch: ChangeBatch,
}
