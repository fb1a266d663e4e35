//! Scripted page sessions.
//!
//! A scenario describes the initial markup of a page and a list of steps that
//! mutate it or talk to the engine the way the classification collaborator
//! would. The runner plays the collaborator too: it answers `init_content` with
//! the configured switches and `classify_identities` from the scenario's
//! blocklist, then lets the engine settle after every step.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rne_core_types::{Classification, IdentityId, NodeId, Selector};
use rne_dom::{Document, El};
use rne_event_bus::{EventBus, InMemoryBus};
use rne_profiles::{MenuHooking, PageProfile};
use rne_registry::{
    announce_roots, apply_inbound, classify_requests, EngineCounts, EngineState, InboundMessage,
    OutboundMessage, RegistryImpl,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::{debug, info, warn};

use crate::config::AppConfig;

/// Upper bound on pump rounds per step; a page that keeps mutating itself in
/// response to the engine never settles.
const MAX_SETTLE_ROUNDS: usize = 64;

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Overrides `engine.profile` from the configuration.
    #[serde(default)]
    pub profile: Option<PageProfile>,
    /// Appended under `<body>` before the profile is installed.
    pub markup: El,
    /// Identities the collaborator reports as tainted; every other identity is clean.
    #[serde(default)]
    pub blocklist: BTreeSet<IdentityId>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("parsing scenario")
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Appends `markup` under the first element matching `parent` (default `body`).
    Append {
        #[serde(default)]
        parent: Option<String>,
        markup: El,
    },
    /// Detaches the first element matching `target`.
    Remove { target: String },
    /// Sends one verdict, `null` meaning unknown.
    Classify {
        identity: IdentityId,
        tainted: Option<bool>,
    },
    SuppressAll { value: bool },
    Monitoring { value: bool },
    ResetClassifications,
    /// Simulated navigation.
    ResetPage,
    /// Simulated loss of the classification channel.
    Panic,
    MenuHooking { value: bool },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Append { parent, .. } => {
                write!(f, "append under {}", parent.as_deref().unwrap_or("body"))
            }
            Step::Remove { target } => write!(f, "remove {target}"),
            Step::Classify { identity, tainted } => {
                write!(f, "classify {identity} as {:?}", Classification::from(*tainted))
            }
            Step::SuppressAll { value } => write!(f, "suppress_all {value}"),
            Step::Monitoring { value } => write!(f, "monitoring {value}"),
            Step::ResetClassifications => f.write_str("reset_classifications"),
            Step::ResetPage => f.write_str("reset_page"),
            Step::Panic => f.write_str("panic"),
            Step::MenuHooking { value } => write!(f, "menu_hooking {value}"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub profile: PageProfile,
    pub state: EngineState,
    pub monitoring: bool,
    pub suppress_all: bool,
    pub steps: usize,
    pub counts: EngineCounts,
    pub items: Vec<ItemReport>,
    pub identities: BTreeMap<IdentityId, IdentityReport>,
    /// Outbound messages in publication order.
    pub outbound: Vec<OutboundMessage>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ItemReport {
    pub node: NodeId,
    pub element: String,
    pub descriptor: String,
    pub identities: Vec<IdentityId>,
    pub suppressed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct IdentityReport {
    pub count: usize,
    pub classification: Classification,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Profile:      {}", self.profile)?;
        writeln!(f, "State:        {:?}", self.state)?;
        writeln!(f, "Suppress all: {}", self.suppress_all)?;
        writeln!(f, "Steps run:    {}", self.steps)?;
        writeln!(
            f,
            "Registered:   {} roots, {} streams, {} items, {} identities",
            self.counts.roots, self.counts.streams, self.counts.items, self.counts.identities
        )?;
        if !self.items.is_empty() {
            writeln!(f)?;
            writeln!(f, "Items:")?;
            for item in &self.items {
                let ids: Vec<&str> = item.identities.iter().map(IdentityId::as_str).collect();
                writeln!(
                    f,
                    "  {} {:<18} {:<40} [{}]",
                    if item.suppressed { "x" } else { " " },
                    item.descriptor,
                    item.element,
                    ids.join(", ")
                )?;
            }
        }
        if !self.identities.is_empty() {
            writeln!(f)?;
            writeln!(f, "Identities:")?;
            for (id, record) in &self.identities {
                writeln!(f, "  {:<12} x{:<3} {:?}", id, record.count, record.classification)?;
            }
        }
        Ok(())
    }
}

pub struct Simulation {
    profile: PageProfile,
    doc: Arc<Document>,
    engine: RegistryImpl<Document>,
    menu_hooking: MenuHooking,
    outbound: Arc<InMemoryBus<OutboundMessage>>,
    requests: Receiver<OutboundMessage>,
    published: Vec<OutboundMessage>,
    blocklist: BTreeSet<IdentityId>,
    suppress_all: bool,
    monitoring: bool,
    steps: usize,
}

impl Simulation {
    /// Builds the page, installs the profile and settles the initial handshake.
    pub fn load(scenario: &Scenario, config: &AppConfig) -> Result<Self> {
        let profile = scenario.profile.unwrap_or(config.engine.profile);
        let doc = Arc::new(Document::new());
        doc.append(doc.body(), &scenario.markup)
            .context("building scenario markup")?;

        let outbound: Arc<InMemoryBus<OutboundMessage>> = InMemoryBus::new(config.bus.capacity);
        let requests = outbound.subscribe();
        let mut engine = RegistryImpl::new(Arc::clone(&doc));
        engine.set_new_identities_callback(classify_requests(Arc::clone(&outbound)));
        engine.set_roots_found_callback(announce_roots(Arc::clone(&outbound)));

        let menu_hooking = MenuHooking::new(config.engine.menu_hooking);
        let installed = profile.install(&mut engine, &menu_hooking)?;

        let mut simulation = Self {
            profile,
            doc,
            engine,
            menu_hooking,
            outbound,
            requests,
            published: Vec::new(),
            blocklist: scenario.blocklist.clone(),
            suppress_all: config.engine.suppress_all,
            monitoring: config.engine.monitoring,
            steps: 0,
        };
        if installed.roots > 0 {
            simulation.outbound.emit(OutboundMessage::InitContent);
        }
        simulation.settle();
        Ok(simulation)
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    pub fn engine(&self) -> &RegistryImpl<Document> {
        &self.engine
    }

    pub fn apply(&mut self, step: &Step) -> Result<()> {
        debug!(step = %step, "scenario step");
        match step {
            Step::Append { parent, markup } => {
                let parent = match parent {
                    Some(selector) => self.find(selector)?,
                    None => self.doc.body(),
                };
                self.doc.append(parent, markup)?;
            }
            Step::Remove { target } => {
                let node = self.find(target)?;
                self.doc.remove(node)?;
            }
            Step::Classify { identity, tainted } => {
                self.send(InboundMessage::SetClassifications {
                    value: BTreeMap::from([(identity.clone(), *tainted)]),
                });
            }
            Step::SuppressAll { value } => {
                self.suppress_all = *value;
                self.send(InboundMessage::SetSuppressAll { value: *value });
            }
            Step::Monitoring { value } => {
                self.monitoring = *value;
                self.send(InboundMessage::SetMonitoring { value: *value });
            }
            Step::ResetClassifications => self.send(InboundMessage::ResetClassifications),
            Step::ResetPage => {
                if self.engine.reset_page() {
                    self.outbound.emit(OutboundMessage::InitContent);
                }
            }
            Step::Panic => {
                self.send(InboundMessage::ChannelLost);
                let removed = self.profile.remove_injected(&self.doc);
                if removed > 0 {
                    info!(removed, "injected markup removed");
                }
            }
            Step::MenuHooking { value } => self.menu_hooking.set(*value),
        }
        self.steps += 1;
        self.settle();
        Ok(())
    }

    pub fn report(&self) -> SimulationReport {
        let items = self
            .engine
            .items()
            .map(|item| ItemReport {
                node: item.node,
                element: self.doc.describe(item.node),
                descriptor: item.descriptor.clone(),
                identities: item.identities.clone(),
                suppressed: item.suppressed,
            })
            .collect();
        let identities = self
            .engine
            .registered_identities()
            .into_iter()
            .filter_map(|id| {
                let record = self.engine.identity(&id)?;
                Some((
                    id,
                    IdentityReport {
                        count: record.count,
                        classification: record.classification,
                    },
                ))
            })
            .collect();
        SimulationReport {
            profile: self.profile,
            state: self.engine.state(),
            monitoring: self.engine.is_monitoring(),
            suppress_all: self.engine.is_suppress_all(),
            steps: self.steps,
            counts: self.engine.counts(),
            items,
            identities,
            outbound: self.published.clone(),
        }
    }

    fn find(&self, selector: &str) -> Result<NodeId> {
        let parsed = Selector::parse(selector)?;
        match self.doc.select_first(self.doc.document_element(), &parsed) {
            Some(node) => Ok(node),
            None => bail!("no element matches `{selector}`"),
        }
    }

    fn send(&mut self, message: InboundMessage) {
        if let Some(reply) = apply_inbound(&mut self.engine, message) {
            self.outbound.emit(reply);
        }
    }

    /// Pumps changes and answers outbound requests until neither produces work.
    fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            while self.engine.pump_changes() > 0 {}

            let mut replies = Vec::new();
            loop {
                match self.requests.try_recv() {
                    Ok(message) => {
                        replies.extend(self.answer(&message));
                        self.published.push(message);
                    }
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "outbound requests lagged");
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
            if replies.is_empty() {
                return;
            }
            for reply in replies {
                self.send(reply);
            }
        }
        warn!(rounds = MAX_SETTLE_ROUNDS, "page did not settle");
    }

    fn answer(&self, message: &OutboundMessage) -> Vec<InboundMessage> {
        match message {
            OutboundMessage::InitContent => vec![
                InboundMessage::SetSuppressAll {
                    value: self.suppress_all,
                },
                InboundMessage::SetMonitoring {
                    value: self.monitoring,
                },
            ],
            OutboundMessage::ClassifyIdentities { identities } => {
                vec![InboundMessage::SetClassifications {
                    value: identities
                        .iter()
                        .map(|id| (id.clone(), Some(self.blocklist.contains(id))))
                        .collect(),
                }]
            }
        }
    }
}

/// Loads `scenario`, runs every step and reports the final engine state.
pub fn run(scenario: &Scenario, config: &AppConfig) -> Result<SimulationReport> {
    let mut simulation = Simulation::load(scenario, config)?;
    for (index, step) in scenario.steps.iter().enumerate() {
        simulation
            .apply(step)
            .with_context(|| format!("step {} ({step})", index + 1))?;
    }
    Ok(simulation.report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TIMELINE: &str = r#"
markup:
  tag: div
  id: page-container
  children:
    - tag: div
      id: timeline
      children:
        - tag: ol
          classes: [js-navigable-stream]
          children:
            - tag: div
              classes: [tweet]
              attrs: { data-user-id: "1" }
              children:
                - { tag: div, classes: [content] }
            - tag: div
              classes: [tweet]
              attrs: { data-user-id: "2" }
              children:
                - { tag: div, classes: [content] }
blocklist: ["2"]
"#;

    #[test]
    fn steps_parse_by_op_tag() {
        let steps: Vec<Step> = serde_yaml::from_str(
            r#"
- { op: remove, target: "div#timeline" }
- { op: classify, identity: "7", tainted: null }
- { op: suppress_all, value: true }
- { op: reset_page }
"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 4);
        assert!(matches!(&steps[1], Step::Classify { identity, tainted: None } if identity.as_str() == "7"));
        assert_eq!(steps[0].to_string(), "remove div#timeline");
        assert!(serde_yaml::from_str::<Vec<Step>>("- { op: explode }").is_err());
    }

    #[test]
    fn load_answers_the_handshake_from_the_blocklist() {
        let scenario = Scenario::from_yaml(TIMELINE).unwrap();
        let simulation = Simulation::load(&scenario, &AppConfig::default()).unwrap();
        let report = simulation.report();

        assert_eq!(report.state, EngineState::Monitoring);
        assert_eq!(report.counts.items, 2);
        let suppressed: Vec<bool> = report.items.iter().map(|item| item.suppressed).collect();
        assert_eq!(suppressed, vec![false, true]);
        assert_eq!(
            report.identities[&IdentityId::from("2")].classification,
            Classification::Tainted
        );
        assert!(report
            .outbound
            .iter()
            .any(|message| matches!(message, OutboundMessage::InitContent)));
    }

    #[test]
    fn missing_target_fails_the_step() {
        let mut scenario = Scenario::from_yaml(TIMELINE).unwrap();
        scenario.steps.push(Step::Remove {
            target: "div#nowhere".into(),
        });
        let err = run(&scenario, &AppConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("step 1"));
    }
}
