use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref STATUS_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_status_created_total",
        "Total status readings stored"
    ))
    .unwrap();
    pub static ref STATUS_QUERIES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_status_queries_total",
        "Total status history queries served"
    ))
    .unwrap();
    pub static ref NO_ACTION_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_no_action_total",
        "Total requests without device credentials"
    ))
    .unwrap();
    pub static ref AUTH_DENIED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_auth_denied_total",
        "Total requests with invalid device credentials"
    ))
    .unwrap();
    pub static ref STORAGE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_storage_failures_total",
        "Total requests failed by a storage fault or timeout"
    ))
    .unwrap();
    pub static ref REQUEST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ingestor_request_latency_seconds",
            "Time taken to handle one status request"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(STATUS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_QUERIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NO_ACTION_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AUTH_DENIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORAGE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEST_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
