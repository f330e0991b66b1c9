use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

const HTTP_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
const DB_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];
const CACHE_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1];

lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "HTTP requests served",
        &["method", "path", "status"]
    )
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency",
        &["method", "path"],
        HTTP_BUCKETS.to_vec()
    )
    .unwrap();

    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "MongoDB operations",
        &["operation", "collection", "status"]
    )
    .unwrap();
    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "MongoDB operation latency",
        &["operation", "collection"],
        DB_BUCKETS.to_vec()
    )
    .unwrap();

    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Redis operations",
        &["operation", "status"]
    )
    .unwrap();
    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Redis operation latency",
        &["operation"],
        CACHE_BUCKETS.to_vec()
    )
    .unwrap();

    pub static ref PLACEMENT_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "placement_attempts_total",
        "Placement quiz attempts by lifecycle event",
        &["status"]
    )
    .unwrap();
    pub static ref PLACEMENT_ANSWERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "placement_answers_total",
        "Placement answers by correctness",
        &["correct"]
    )
    .unwrap();
    pub static ref PLACEMENT_LEVELS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "placement_levels_total",
        "Final CEFR levels produced by completed attempts",
        &["level"]
    )
    .unwrap();
    pub static ref COURSE_PROGRESS_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "course_progress_requests_total",
        "Course progress computations by outcome",
        &["status"]
    )
    .unwrap();
    pub static ref RESULT_EMAILS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "result_emails_total",
        "Placement result emails by delivery outcome",
        &["status"]
    )
    .unwrap();
}

pub fn render_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

/// Wrap a MongoDB call, recording count and latency under its name.
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let timer = DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .start_timer();
    let result = future.await;
    timer.observe_duration();

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status_label(&result)])
        .inc();
    result
}

/// Wrap a Redis call, recording count and latency under its name.
pub async fn track_cache_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let timer = CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .start_timer();
    let result = future.await;
    timer.observe_duration();

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status_label(&result)])
        .inc();
    result
}
