use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, IntGauge, Registry};
use tracing::error;

use crate::model::EngineCounts;

lazy_static! {
    static ref RNE_ROOTS: IntGauge =
        IntGauge::new("rne_registry_roots", "Registered root regions").unwrap();
    static ref RNE_STREAMS: IntGauge =
        IntGauge::new("rne_registry_streams", "Registered streams").unwrap();
    static ref RNE_ITEMS: IntGauge =
        IntGauge::new("rne_registry_items", "Registered items").unwrap();
    static ref RNE_IDENTITIES: IntGauge =
        IntGauge::new("rne_registry_identities", "Tracked identities").unwrap();
    static ref RNE_IDENTITIES_REPORTED: IntCounter = IntCounter::new(
        "rne_registry_identities_reported_total",
        "Newly seen identities handed to the classifier",
    )
    .unwrap();
    static ref RNE_CLASSIFICATIONS: IntCounterVec = IntCounterVec::new(
        opts!(
            "rne_registry_classification_updates_total",
            "Classification updates grouped by outcome"
        ),
        &["outcome"]
    )
    .unwrap();
    static ref RNE_REDACTIONS: IntCounterVec = IntCounterVec::new(
        opts!(
            "rne_registry_redactions_total",
            "Redraw callbacks issued grouped by target state"
        ),
        &["state"]
    )
    .unwrap();
    static ref RNE_CHANGE_BATCHES: IntCounterVec = IntCounterVec::new(
        opts!(
            "rne_registry_change_batches_total",
            "Change batches dispatched grouped by observation level"
        ),
        &["level"]
    )
    .unwrap();
    static ref RNE_PANICS: IntCounter =
        IntCounter::new("rne_registry_panics_total", "Emergency resets").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register engine metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, RNE_ROOTS.clone());
    register(registry, RNE_STREAMS.clone());
    register(registry, RNE_ITEMS.clone());
    register(registry, RNE_IDENTITIES.clone());
    register(registry, RNE_IDENTITIES_REPORTED.clone());
    register(registry, RNE_CLASSIFICATIONS.clone());
    register(registry, RNE_REDACTIONS.clone());
    register(registry, RNE_CHANGE_BATCHES.clone());
    register(registry, RNE_PANICS.clone());
}

pub fn set_counts(counts: &EngineCounts) {
    RNE_ROOTS.set(counts.roots as i64);
    RNE_STREAMS.set(counts.streams as i64);
    RNE_ITEMS.set(counts.items as i64);
    RNE_IDENTITIES.set(counts.identities as i64);
}

pub fn record_identities_reported(count: usize) {
    RNE_IDENTITIES_REPORTED.inc_by(count as u64);
}

pub fn record_classification(applied: bool) {
    let outcome = if applied { "applied" } else { "dropped" };
    RNE_CLASSIFICATIONS.with_label_values(&[outcome]).inc();
}

pub fn record_redaction(suppressed: bool) {
    let state = if suppressed { "on" } else { "off" };
    RNE_REDACTIONS.with_label_values(&[state]).inc();
}

pub fn record_change_batch(level: &str) {
    RNE_CHANGE_BATCHES.with_label_values(&[level]).inc();
}

pub fn record_panic() {
    RNE_PANICS.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_is_tolerated() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);
        record_change_batch("stream");
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"rne_registry_change_batches_total".to_string()));
        assert!(names.contains(&"rne_registry_items".to_string()));
    }
}
