use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rne_core_types::{Classification, IdentityId};
use rne_event_bus::{EventBus, InMemoryBus};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::RedactionControl;
use crate::errors::RegistryError;

/// An engine shared between the ingest tasks and whoever else drives it.
pub type SharedEngine = Arc<Mutex<dyn RedactionControl>>;

/// Messages from the classification collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ResetClassifications,
    SetClassifications {
        value: BTreeMap<IdentityId, Option<bool>>,
    },
    SetSuppressAll {
        value: bool,
    },
    SetMonitoring {
        value: bool,
    },
    ChannelLost,
}

impl InboundMessage {
    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Messages to the classification collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// The page has roots and is ready for settings.
    InitContent,
    ClassifyIdentities { identities: Vec<IdentityId> },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, RegistryError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Applies one inbound message. Returns the reply to publish, if any.
///
/// Everything but `channel_lost` and a request to stop monitoring is ignored
/// while no roots are registered.
pub fn apply_inbound(
    engine: &mut dyn RedactionControl,
    message: InboundMessage,
) -> Option<OutboundMessage> {
    if matches!(message, InboundMessage::ChannelLost) {
        warn!(target: "rne.registry", "classification channel lost");
        engine.panic();
        return None;
    }
    let stops_monitoring = matches!(message, InboundMessage::SetMonitoring { value: false });
    if engine.root_count() == 0 && !stops_monitoring {
        debug!(?message, "no roots registered, message ignored");
        return None;
    }

    match message {
        InboundMessage::ResetClassifications => {
            let identities = engine.reset_classifications();
            if identities.is_empty() {
                None
            } else {
                Some(OutboundMessage::ClassifyIdentities { identities })
            }
        }
        InboundMessage::SetClassifications { value } => {
            for (identity, verdict) in value {
                engine.set_identity_classification(&identity, Classification::from(verdict));
            }
            None
        }
        InboundMessage::SetSuppressAll { value } => {
            if value != engine.is_suppress_all() {
                engine.set_suppress_all(value);
            }
            None
        }
        InboundMessage::SetMonitoring { value } => {
            if value != engine.is_monitoring() {
                engine.set_monitoring(value);
            }
            None
        }
        InboundMessage::ChannelLost => None,
    }
}

/// A new-identities callback that asks the collaborator for verdicts over `outbound`.
pub fn classify_requests(
    outbound: Arc<InMemoryBus<OutboundMessage>>,
) -> impl FnMut(&[IdentityId]) + Send + 'static {
    move |identities: &[IdentityId]| {
        outbound.emit(OutboundMessage::ClassifyIdentities {
            identities: identities.to_vec(),
        });
    }
}

/// A roots-found callback that announces the page over `outbound`.
pub fn announce_roots(
    outbound: Arc<InMemoryBus<OutboundMessage>>,
) -> impl FnMut(usize) + Send + 'static {
    move |roots: usize| {
        debug!(roots, "announcing page");
        outbound.emit(OutboundMessage::InitContent);
    }
}

pub struct IngestHandle {
    task: JoinHandle<()>,
    pump_task: JoinHandle<()>,
}

impl IngestHandle {
    /// Spawns the inbound message loop and the change pump.
    ///
    /// The inbound loop holds only a subscription: once every sender of the
    /// inbound bus is gone the channel counts as lost and the engine panics.
    pub fn spawn(
        inbound: &InMemoryBus<InboundMessage>,
        outbound: Arc<InMemoryBus<OutboundMessage>>,
        engine: SharedEngine,
        changes: Arc<Notify>,
    ) -> Self {
        let mut rx = inbound.subscribe();
        let engine_for_bus = Arc::clone(&engine);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => {
                        let reply = {
                            let mut guard = engine_for_bus.lock();
                            apply_inbound(&mut *guard, message)
                        };
                        if let Some(reply) = reply {
                            outbound.emit(reply);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "inbound messages lagged");
                    }
                    Err(RecvError::Closed) => {
                        apply_inbound(&mut *engine_for_bus.lock(), InboundMessage::ChannelLost);
                        break;
                    }
                }
            }
        });

        let pump_task = tokio::spawn(async move {
            loop {
                changes.notified().await;
                let handled = engine.lock().pump_changes();
                if handled > 0 {
                    debug!(handled, "change batches dispatched");
                }
            }
        });

        Self { task, pump_task }
    }

    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        self.pump_task.abort();
        let _ = self.pump_task.await;
    }
}
