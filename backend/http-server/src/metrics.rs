use error_stack::ResultExt;
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref payment_sessions_created_total: IntCounter = register_int_counter!(
        "payment_sessions_created_total",
        "Total number of payment sessions created"
    )
    .unwrap();

    pub static ref payment_callbacks_total: IntCounterVec = register_int_counter_vec!(
        "payment_callbacks_total",
        "Return callbacks processed, by terminal outcome",
        &["outcome"]
    )
    .unwrap();

    /// Hard signature mismatches on the return callback (not soft skips).
    pub static ref dv_mismatch_total: IntCounter = register_int_counter!(
        "dv_mismatch_total",
        "Return callbacks rejected for a response digest mismatch"
    )
    .unwrap();

    /// Idempotency fence trips: a callback replay reached the crediting
    /// step but the payment was already credited.
    pub static ref replay_attempt_total: IntCounter = register_int_counter!(
        "replay_attempt_total",
        "Vote crediting attempts fenced off as replays"
    )
    .unwrap();

    /// Credit transactions aborted after funds were captured. Every count
    /// here needs manual reconciliation.
    pub static ref tx_fail_total: IntCounter = register_int_counter!(
        "tx_fail_total",
        "Bulk credit transactions aborted"
    )
    .unwrap();

    pub static ref votes_credited_total: IntCounterVec = register_int_counter_vec!(
        "votes_credited_total",
        "Votes credited to contestants, by crediting path",
        &["path"]
    )
    .unwrap();

    pub static ref s2s_verification_total: IntCounterVec = register_int_counter_vec!(
        "s2s_verification_total",
        "Server-to-server verification attempts, by result",
        &["result"]
    )
    .unwrap();

    /// Per-item failures on the best-effort crediting path; reconciled by
    /// hand from the logs.
    pub static ref credit_item_failures_total: IntCounter = register_int_counter!(
        "credit_item_failures_total",
        "Individual contestant increments that failed on the bypass path"
    )
    .unwrap();
}

pub async fn metrics_handler() -> error_stack::Result<String, MetricsError> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .change_context(MetricsError::EncodingError)?;
    String::from_utf8(buffer).change_context(MetricsError::Utf8Error)
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Error encoding metrics")]
    EncodingError,
    #[error("Error converting metrics to utf8")]
    Utf8Error,
}
