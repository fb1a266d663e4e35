//! Incremental registry of roots, streams and items, and the redaction engine
//! that renders items according to cached identity verdicts.

pub mod api;
pub mod descriptor;
pub mod dispatch;
pub mod dredge;
pub mod errors;
pub mod events;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod redaction;
pub mod state;

pub use api::RedactionControl;
pub use descriptor::{Descriptor, DescriptorKind, DescriptorSet, Identities};
pub use dredge::{dredge, Dredged};
pub use errors::RegistryError;
pub use ingest::{
    announce_roots, apply_inbound, classify_requests, InboundMessage, IngestHandle, OutboundMessage, SharedEngine,
};
pub use model::{
    EngineCounts, EngineState, IdentityRecord, ItemRegistration, RootRegistration,
    StreamRegistration,
};
pub use redaction::RedactionFilter;
pub use state::{NewIdentitiesCallback, NodeAddedHook, RegistryImpl, RootsFoundCallback};
