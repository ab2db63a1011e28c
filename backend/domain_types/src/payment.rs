//! Payment session record and its settlement states.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Prefix applied to every payment reference number.
pub const REFERENCE_PREFIX: &str = "prn";

/// Externally meaningful settlement state. Moves forward only:
/// `Created -> (Success | Failed | Pending | Error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Success,
    Failed,
    Pending,
    Error,
}

/// How success was established. Doubles as the idempotency fence: vote
/// crediting is only permitted to transition this field into `Success` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    /// Sandbox mode, or S2S unreachable but the redirect already proved out.
    Skipped,
    /// No merchant-API credentials configured; redirect-trust only.
    Bypassed,
    Success,
    Failed,
}

/// Snapshot of the signed outbound request, kept for audit and replay checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub return_url: String,
    pub request_indicator: String,
    pub date_token: String,
    pub mode_token: String,
    pub request_signature: String,
}

/// Snapshot of the gateway's return callback parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub gateway_success_flag: Option<String>,
    pub response_code: Option<String>,
    pub trace_id: Option<String>,
    pub bank_code: Option<String>,
    pub initiator_code: Option<String>,
    pub paid_amount_raw: Option<String>,
    pub refund_amount_raw: Option<String>,
    pub response_signature: Option<String>,
}

/// One row per purchase attempt.
///
/// Serialized field names are stable API surface for reconciliation tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub id: String,
    pub reference_id: String,
    pub merchant_id: String,
    pub primary_contestant_id: String,
    pub primary_contestant_name: String,
    pub vote_count: u32,
    pub amount: Decimal,
    pub purpose: String,
    pub auxiliary1: Option<String>,
    pub auxiliary2: Option<String>,
    #[serde(flatten)]
    pub request_snapshot: RequestSnapshot,
    #[serde(flatten)]
    pub response_snapshot: ResponseSnapshot,
    pub status: PaymentStatus,
    pub verification_status: VerificationStatus,
    pub gateway_api_response: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PaymentSession {
    /// A callback for a session in this state has already been fully
    /// processed and credited; replays short-circuit.
    pub fn is_settled_and_credited(&self) -> bool {
        self.status == PaymentStatus::Success
            && self.verification_status == VerificationStatus::Success
    }

    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// Normalize a client- or gateway-supplied reference by prefixing `prn_`
/// when missing. Bare numeric/alphanumeric ids are accepted this way.
pub fn normalize_reference(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("prn_") {
        trimmed.to_string()
    } else {
        format!("{REFERENCE_PREFIX}_{trimmed}")
    }
}

/// Permitted discrepancy between the expected and the paid amount.
pub fn amount_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// The amount a session must carry: `vote_count x unit price`.
pub fn expected_amount(vote_count: u32, unit_price: Decimal) -> Decimal {
    unit_price * Decimal::from(vote_count)
}

/// Amount check used at session creation and again on every callback.
pub fn amount_within_tolerance(expected: Decimal, actual: Decimal) -> bool {
    (expected - actual).abs() <= amount_tolerance()
}
