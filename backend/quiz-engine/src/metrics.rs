use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // Question store round-trips
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "store_operations_total",
        "Total number of question store operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "store_operation_duration_seconds",
        "Question store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref QUIZZES_SAMPLED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quizzes_sampled_total",
        "Total number of quizzes assembled by the sampler",
        &["status"]
    )
    .unwrap();

    pub static ref QUESTIONS_REPLACED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_replaced_total",
        "Total number of single-question replacements",
        &["outcome"]
    )
    .unwrap();

    pub static ref DOCUMENTS_INGESTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "documents_ingested_total",
        "Total number of source documents processed by ingestion",
        &["status"]
    )
    .unwrap();

    pub static ref QUESTIONS_INGESTED_TOTAL: IntCounter = register_int_counter!(
        "questions_ingested_total",
        "Total number of questions committed by ingestion"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
