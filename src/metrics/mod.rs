//! Prometheus metrics for the localization engine.
//!
//! - Render metrics (rendered, degraded, key-only, unknown tokens and colors)
//! - Catalog metrics (loads, warnings, reload failures)
//! - Broadcast metrics (audience sizes, buckets, deliveries, online players)

mod helpers;

pub use helpers::{encode_metrics, BroadcastMetrics, CatalogMetrics, RenderMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "l10n";

lazy_static! {
    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Successful renders
    pub static ref RENDERS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_renders_total", METRIC_PREFIX),
        "Total templates rendered successfully"
    ).unwrap();

    /// Renders that fell back to the degraded "key: args" text
    pub static ref RENDERS_DEGRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_renders_degraded_total", METRIC_PREFIX),
        "Total renders that produced degraded output",
        &["reason"]
    ).unwrap();

    /// Renders of templates with no text in any language
    pub static ref RENDERS_KEY_ONLY_TOTAL: IntCounter = register_int_counter!(
        format!("{}_renders_key_only_total", METRIC_PREFIX),
        "Total renders that emitted only the template key"
    ).unwrap();

    /// Format tokens nobody recognized (counted once per token)
    pub static ref UNKNOWN_FORMAT_TOKENS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_unknown_format_tokens_total", METRIC_PREFIX),
        "Distinct unknown format tokens seen"
    ).unwrap();

    /// Color keys missing from the palette (counted once per key)
    pub static ref UNKNOWN_COLOR_KEYS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_unknown_color_keys_total", METRIC_PREFIX),
        "Distinct unknown color keys seen"
    ).unwrap();

    // ============================================================================
    // Catalog Metrics
    // ============================================================================

    /// Registry installs (initial load and reloads)
    pub static ref CATALOG_LOADS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_catalog_loads_total", METRIC_PREFIX),
        "Total template registries installed"
    ).unwrap();

    /// Failed reloads; the previous registry stayed active
    pub static ref CATALOG_RELOAD_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_catalog_reload_failures_total", METRIC_PREFIX),
        "Total catalog reloads that failed"
    ).unwrap();

    /// Warnings raised while building a registry
    pub static ref CATALOG_WARNINGS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_catalog_warnings_total", METRIC_PREFIX),
        "Total registry build warnings",
        &["kind"]
    ).unwrap();

    /// Templates in the active registry
    pub static ref CATALOG_TEMPLATES: IntGauge = register_int_gauge!(
        format!("{}_catalog_templates", METRIC_PREFIX),
        "Templates in the active registry"
    ).unwrap();

    /// Generation of the active registry
    pub static ref CATALOG_GENERATION: IntGauge = register_int_gauge!(
        format!("{}_catalog_generation", METRIC_PREFIX),
        "Generation number of the active registry"
    ).unwrap();

    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Broadcasts by audience kind
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcasts",
        &["audience"]
    ).unwrap();

    /// Language buckets per broadcast (equals renders per broadcast)
    pub static ref BROADCAST_BUCKETS: Histogram = register_histogram!(
        format!("{}_broadcast_buckets", METRIC_PREFIX),
        "Distribution of language buckets per broadcast",
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 6.0, 8.0, 12.0, 16.0]
    ).unwrap();

    /// Recipients per broadcast
    pub static ref BROADCAST_RECIPIENTS: HistogramVec = register_histogram_vec!(
        format!("{}_broadcast_recipients", METRIC_PREFIX),
        "Distribution of recipients per broadcast",
        &["audience"],
        vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    ).unwrap();

    /// Recipients the sink confirmed
    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total messages delivered to recipients"
    ).unwrap();

    /// Recipients the sink did not confirm
    pub static ref MESSAGES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_failed_total", METRIC_PREFIX),
        "Total message deliveries that failed"
    ).unwrap();

    /// Groupings that could not use the pooled scratch storage
    pub static ref GROUPING_FRESH_ALLOCATIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_grouping_fresh_allocations_total", METRIC_PREFIX),
        "Total groupings that allocated fresh bucket storage"
    ).unwrap();

    /// Players currently online
    pub static ref PLAYERS_ONLINE: IntGauge = register_int_gauge!(
        format!("{}_players_online", METRIC_PREFIX),
        "Players currently in the roster"
    ).unwrap();
}
