use rne_core_types::{EntityKind, IdentityId, NodeId};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::model::EngineCounts;

pub fn emit_registered(kind: EntityKind, node: NodeId, descriptor: &str, counts: &EngineCounts) {
    metrics::set_counts(counts);
    debug!(
        target: "rne.registry",
        %kind,
        %node,
        descriptor,
        roots = counts.roots,
        streams = counts.streams,
        items = counts.items,
        identities = counts.identities,
        "registry.entity.registered"
    );
}

pub fn emit_unregistered(kind: EntityKind, node: NodeId, counts: &EngineCounts) {
    metrics::set_counts(counts);
    debug!(
        target: "rne.registry",
        %kind,
        %node,
        roots = counts.roots,
        streams = counts.streams,
        items = counts.items,
        identities = counts.identities,
        "registry.entity.unregistered"
    );
}

pub fn emit_new_identities(identities: &[IdentityId]) {
    metrics::record_identities_reported(identities.len());
    debug!(
        target: "rne.registry",
        count = identities.len(),
        "registry.identities.reported"
    );
}

pub fn emit_classification(identity: &IdentityId, applied: bool, affected: usize) {
    metrics::record_classification(applied);
    if applied {
        debug!(
            target: "rne.registry",
            %identity,
            affected,
            "registry.classification.applied"
        );
    } else {
        debug!(
            target: "rne.registry",
            %identity,
            "registry.classification.dropped"
        );
    }
}

pub fn emit_monitoring(on: bool, counts: &EngineCounts) {
    info!(
        target: "rne.registry",
        monitoring = on,
        roots = counts.roots,
        streams = counts.streams,
        items = counts.items,
        "registry.monitoring.changed"
    );
}

pub fn emit_suppress_all(on: bool, affected: usize) {
    info!(
        target: "rne.registry",
        suppress_all = on,
        affected,
        "registry.suppress_all.changed"
    );
}

pub fn emit_roots_found(counts: &EngineCounts) {
    metrics::set_counts(counts);
    info!(
        target: "rne.registry",
        roots = counts.roots,
        items = counts.items,
        "registry.roots.found"
    );
}

pub fn emit_page_reset(had_roots: bool, counts: &EngineCounts) {
    metrics::set_counts(counts);
    info!(
        target: "rne.registry",
        had_roots,
        roots = counts.roots,
        "registry.page.reset"
    );
}

pub fn emit_panic(counts_before: &EngineCounts) {
    metrics::record_panic();
    metrics::set_counts(&EngineCounts::default());
    warn!(
        target: "rne.registry",
        roots = counts_before.roots,
        streams = counts_before.streams,
        items = counts_before.items,
        identities = counts_before.identities,
        "registry.panic"
    );
}
