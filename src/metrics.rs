//! Prometheus metrics registry and metric definitions.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global registry under crate namespace
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("metro_query".into()), None)
        .expect("failed to create Prometheus registry")
});

/// Queries issued, by operation
pub static QUERY_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("queries_total", "Total number of queries issued");
    let c = IntCounterVec::new(opts, &["operation"]).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Queries that returned an error, by operation
pub static QUERY_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("query_errors_total", "Total number of failed queries");
    let c = IntCounterVec::new(opts, &["operation"]).expect("counter opts");
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

/// Histogram of query round-trip durations
pub static QUERY_HISTOGRAM: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "query_duration_seconds",
        "Duration of a query including the existence check, in seconds",
    );
    let h = HistogramVec::new(opts, &["operation"]).expect("histogram opts");
    REGISTRY.register(Box::new(h.clone())).unwrap();
    h
});

/// Encode all metrics as text
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    encoder.encode(&mf, &mut buffer).expect("failed to encode");
    String::from_utf8(buffer).expect("invalid utf8")
}
