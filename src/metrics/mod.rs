//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_histogram_with_registry, CounterVec, Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Pipeline metrics
    pub pipeline_executions: CounterVec,
    pub stage_duration: HistogramVec,

    // Retrieval metrics
    pub candidates_fetched: CounterVec,
    pub remote_failures: CounterVec,
    pub cache_lookups: CounterVec,

    // Source metrics
    pub validation_outcomes: CounterVec,

    // Context budget metrics
    pub context_tokens_used: Histogram,
    pub history_messages_dropped: Histogram,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let pipeline_executions = register_counter_vec_with_registry!(
            Opts::new("forge_pipeline_executions_total", "Pipeline executions by final status"),
            &["status"],
            registry
        )?;

        let stage_duration = register_histogram_vec_with_registry!(
            "forge_stage_duration_seconds",
            "Pipeline stage duration in seconds",
            &["stage"],
            registry
        )?;

        let candidates_fetched = register_counter_vec_with_registry!(
            Opts::new("forge_candidates_fetched_total", "Contract candidates fetched by origin"),
            &["origin"],
            registry
        )?;

        let remote_failures = register_counter_vec_with_registry!(
            Opts::new("forge_remote_failures_total", "Remote source failures by kind"),
            &["kind"],
            registry
        )?;

        let cache_lookups = register_counter_vec_with_registry!(
            Opts::new("forge_cache_lookups_total", "Candidate cache lookups by origin and result"),
            &["origin", "result"],
            registry
        )?;

        let validation_outcomes = register_counter_vec_with_registry!(
            Opts::new("forge_validation_outcomes_total", "Source validation outcomes"),
            &["outcome"],
            registry
        )?;

        let context_tokens_used = register_histogram_with_registry!(
            "forge_context_tokens_used",
            "Estimated tokens of assembled reference context",
            registry
        )?;

        let history_messages_dropped = register_histogram_with_registry!(
            "forge_history_messages_dropped",
            "Conversation messages dropped by history truncation",
            registry
        )?;

        Ok(Self {
            registry,
            pipeline_executions,
            stage_duration,
            candidates_fetched,
            remote_failures,
            cache_lookups,
            validation_outcomes,
            context_tokens_used,
            history_messages_dropped,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the final status of an execution
    pub fn record_execution(&self, success: bool) {
        let status = if success { "completed" } else { "failed" };
        self.pipeline_executions.with_label_values(&[status]).inc();
    }

    /// Record how long a stage took
    pub fn record_stage(&self, stage: &str, seconds: f64) {
        self.stage_duration.with_label_values(&[stage]).observe(seconds);
    }

    /// Record a cache lookup
    pub fn record_cache(&self, origin: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[origin, result]).inc();
    }

    /// Record a validation outcome (`valid`, `repaired`, `dropped`)
    pub fn record_validation(&self, outcome: &str) {
        self.validation_outcomes.with_label_values(&[outcome]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
