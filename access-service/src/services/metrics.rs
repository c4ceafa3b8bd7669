use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static CONFIG_RESOLUTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CMS_FETCH_FAILURES_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static ACCESS_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PERMISSION_PACK_APPLICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let metric = match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create {} metric: {}", name, e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };
    if let Err(e) = registry.register(Box::new(metric.clone())) {
        tracing::error!("Failed to register {} collector: {}", name, e);
        panic!("Failed to initialize metrics: {}", e);
    }
    metric
}

/// Register all collectors. Later calls are no-ops.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }
    let registry = Registry::new();

    let resolutions = counter_vec(
        &registry,
        "config_resolutions_total",
        "Configuration resolutions served, by cache outcome",
        &["cache"],
    );

    let cms_failures = match IntCounter::new(
        "cms_fetch_failures_total",
        "CMS fetches that failed and fell back to defaults",
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create cms_fetch_failures_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };
    if let Err(e) = registry.register(Box::new(cms_failures.clone())) {
        tracing::error!("Failed to register cms_fetch_failures_total collector: {}", e);
        panic!("Failed to initialize metrics: {}", e);
    }

    let decisions = counter_vec(
        &registry,
        "access_decisions_total",
        "Access guard decisions, by outcome",
        &["outcome"],
    );

    let packs = counter_vec(
        &registry,
        "permission_pack_applications_total",
        "Permission packs applied to memberships",
        &["pack"],
    );

    let _ = REGISTRY.set(registry);
    let _ = CONFIG_RESOLUTIONS_TOTAL.set(resolutions);
    let _ = CMS_FETCH_FAILURES_TOTAL.set(cms_failures);
    let _ = ACCESS_DECISIONS_TOTAL.set(decisions);
    let _ = PERMISSION_PACK_APPLICATIONS_TOTAL.set(packs);
}

pub fn record_config_resolution(cached: bool) {
    if let Some(counter) = CONFIG_RESOLUTIONS_TOTAL.get() {
        let label = if cached { "hit" } else { "miss" };
        counter.with_label_values(&[label]).inc();
    }
}

pub fn record_cms_failure() {
    if let Some(counter) = CMS_FETCH_FAILURES_TOTAL.get() {
        counter.inc();
    }
}

pub fn record_access_decision(outcome: &str) {
    if let Some(counter) = ACCESS_DECISIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_pack_application(pack_id: &str) {
    if let Some(counter) = PERMISSION_PACK_APPLICATIONS_TOTAL.get() {
        counter.with_label_values(&[pack_id]).inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
