use rne_core_types::{Classification, IdentityId, NodeId, ObserveScope, ObserverId};
use serde::Serialize;

/// Lifecycle of one engine instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No roots registered.
    Idle,
    /// Roots registered, observers detached, nothing rendered by monitoring.
    Dormant,
    Monitoring,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RootRegistration {
    pub node: NodeId,
    pub descriptor: String,
    pub scope: ObserveScope,
    /// Present only while monitoring.
    pub observer: Option<ObserverId>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StreamRegistration {
    pub node: NodeId,
    pub descriptor: String,
    pub observer: Option<ObserverId>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ItemRegistration {
    pub node: NodeId,
    pub descriptor: String,
    pub primary: Option<IdentityId>,
    /// Deduplicated, primary first.
    pub identities: Vec<IdentityId>,
    /// Last value handed to the descriptor's redraw callback.
    pub suppressed: bool,
}

impl ItemRegistration {
    pub fn references(&self, identity: &IdentityId) -> bool {
        self.identities.iter().any(|id| id == identity)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IdentityRecord {
    pub count: usize,
    pub classification: Classification,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EngineCounts {
    pub roots: usize,
    pub streams: usize,
    pub items: usize,
    pub identities: usize,
}

/// Which registration an attached observer belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ObserverRoute {
    Document,
    Root(NodeId),
    Stream(NodeId),
}

impl ObserverRoute {
    pub fn level(self) -> &'static str {
        match self {
            ObserverRoute::Document => "document",
            ObserverRoute::Root(_) => "root",
            ObserverRoute::Stream(_) => "stream",
        }
    }
}
