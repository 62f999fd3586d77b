//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::template::RegistryReport;

use super::{
    BROADCASTS_TOTAL, BROADCAST_BUCKETS, BROADCAST_RECIPIENTS, CATALOG_GENERATION,
    CATALOG_LOADS_TOTAL, CATALOG_RELOAD_FAILURES_TOTAL, CATALOG_TEMPLATES, CATALOG_WARNINGS_TOTAL,
    GROUPING_FRESH_ALLOCATIONS_TOTAL, MESSAGES_DELIVERED_TOTAL, MESSAGES_FAILED_TOTAL,
    PLAYERS_ONLINE, RENDERS_DEGRADED_TOTAL, RENDERS_KEY_ONLY_TOTAL, RENDERS_TOTAL,
    UNKNOWN_COLOR_KEYS_TOTAL, UNKNOWN_FORMAT_TOKENS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording render metrics
pub struct RenderMetrics;

impl RenderMetrics {
    pub fn record_rendered() {
        RENDERS_TOTAL.inc();
    }

    /// Record a render that produced degraded output
    pub fn record_degraded(reason: &str) {
        RENDERS_DEGRADED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_key_only() {
        RENDERS_KEY_ONLY_TOTAL.inc();
    }

    /// Record the first sighting of an unknown format token
    pub fn record_unknown_token() {
        UNKNOWN_FORMAT_TOKENS_TOTAL.inc();
    }

    /// Record the first sighting of an unknown color key
    pub fn record_unknown_color_key() {
        UNKNOWN_COLOR_KEYS_TOTAL.inc();
    }
}

/// Helper struct for recording catalog metrics
pub struct CatalogMetrics;

impl CatalogMetrics {
    /// Record an installed registry
    pub fn record_load(report: &RegistryReport) {
        CATALOG_LOADS_TOTAL.inc();
        CATALOG_TEMPLATES.set(report.templates_loaded as i64);
        CATALOG_GENERATION.set(report.generation as i64);
        for warning in &report.warnings {
            CATALOG_WARNINGS_TOTAL
                .with_label_values(&[warning.kind()])
                .inc();
        }
    }

    pub fn record_reload_failed() {
        CATALOG_RELOAD_FAILURES_TOTAL.inc();
    }
}

/// Helper struct for recording broadcast metrics
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record a finished broadcast
    pub fn record_broadcast(audience: &str, buckets: usize, recipients: usize) {
        BROADCASTS_TOTAL.with_label_values(&[audience]).inc();
        BROADCAST_BUCKETS.observe(buckets as f64);
        BROADCAST_RECIPIENTS
            .with_label_values(&[audience])
            .observe(recipients as f64);
    }

    pub fn record_delivered(count: usize) {
        MESSAGES_DELIVERED_TOTAL.inc_by(count as u64);
    }

    pub fn record_failed(count: usize) {
        MESSAGES_FAILED_TOTAL.inc_by(count as u64);
    }

    /// Record a grouping that could not use pooled storage
    pub fn record_fresh_grouping() {
        GROUPING_FRESH_ALLOCATIONS_TOTAL.inc();
    }

    pub fn set_players_online(count: usize) {
        PLAYERS_ONLINE.set(count as i64);
    }
}
