use rne_core_types::{NodeId, RneError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("{0} is not an element")]
    NotAnElement(NodeId),
    #[error("cannot insert {child} under {parent}: would create a cycle")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("{reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },
}

impl From<DomError> for RneError {
    fn from(value: DomError) -> Self {
        RneError::new(value.to_string())
    }
}
