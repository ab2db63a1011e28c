//! The gateway return callback state machine.
//!
//! The gateway redirects the payer's browser here after a payment attempt,
//! and will happily do so more than once (retries, back button, refresh).
//! Every guard below is therefore safe to re-enter; the only non-idempotent
//! effect, vote crediting, sits behind the store's conditional update.
//! Every determinable outcome ends in a 302 to the status page; only an
//! unrecoverable internal failure propagates as an error.

use std::sync::Arc;

use domain_types::{
    errors::{CallbackErrorCode, PaymentError},
    payment::{
        amount_within_tolerance, expected_amount, normalize_reference, PaymentSession,
        PaymentStatus, ResponseSnapshot,
    },
};
use error_stack::ResultExt;
use gateway_integration::fonepay::{
    decision::{self, ConfirmationContext, CreditAction, S2sResult, Settlement},
    dv::DigestOutcome,
    types::ReturnCallbackParams,
    verification::{build_verification_request, parse_verification_response, MerchantApiParams},
};
use rust_decimal::Decimal;
use storage::{ContestantStore, CreditOutcome, PaymentStore};

use crate::{configs, creditor::VoteCreditor, metrics};

/// Window for the diagnostic search when a callback carries an unknown PRN.
pub const FALLBACK_SEARCH_WINDOW: time::Duration = time::Duration::minutes(10);

/// Where the browser gets sent once the callback is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRedirect {
    Status { prn: String },
    Error {
        prn: Option<String>,
        code: CallbackErrorCode,
    },
}

impl CallbackRedirect {
    pub fn location(&self, status_page_url: &str) -> String {
        let Ok(mut url) = url::Url::parse(status_page_url) else {
            return status_page_url.to_string();
        };
        {
            let mut pairs = url.query_pairs_mut();
            match self {
                Self::Status { prn } => {
                    pairs.append_pair("prn", prn);
                }
                Self::Error { prn, code } => {
                    pairs.append_pair("error", &code.to_string());
                    if let Some(prn) = prn {
                        pairs.append_pair("prn", prn);
                    }
                }
            }
        }
        url.into()
    }
}

pub struct ReturnHandler {
    config: Arc<configs::Config>,
    payments: Arc<dyn PaymentStore>,
    contestants: Arc<dyn ContestantStore>,
}

impl ReturnHandler {
    pub fn new(
        config: Arc<configs::Config>,
        payments: Arc<dyn PaymentStore>,
        contestants: Arc<dyn ContestantStore>,
    ) -> Self {
        Self {
            config,
            payments,
            contestants,
        }
    }

    fn creditor(&self) -> VoteCreditor {
        VoteCreditor::new(Arc::clone(&self.payments), Arc::clone(&self.contestants))
    }

    pub async fn process(
        &self,
        params: ReturnCallbackParams,
    ) -> error_stack::Result<CallbackRedirect, PaymentError> {
        let gateway = &self.config.gateway;

        // Required fields. No state exists to change yet.
        let (Some(prn_raw), Some(pid), Some(_)) = (
            params.prn.as_deref(),
            params.pid.as_deref(),
            params.digest.as_deref(),
        ) else {
            tracing::warn!("return callback missing PRN, PID or DV");
            metrics::payment_callbacks_total
                .with_label_values(&["rejected"])
                .inc();
            return Ok(CallbackRedirect::Error {
                prn: params.prn.clone(),
                code: CallbackErrorCode::MissingFields,
            });
        };

        // Lookup, normalizing bare references.
        let reference = normalize_reference(prn_raw);
        let Some(session) = self
            .payments
            .find_by_reference(&reference)
            .await
            .change_context(PaymentError::TransactionFailure(
                "session lookup failed".to_string(),
            ))?
        else {
            self.log_fallback_candidates(&params).await;
            metrics::payment_callbacks_total
                .with_label_values(&["rejected"])
                .inc();
            return Ok(CallbackRedirect::Error {
                prn: Some(reference),
                code: CallbackErrorCode::UnknownPrn,
            });
        };

        // Idempotent replay short-circuit: fully settled and credited.
        if session.is_settled_and_credited() {
            tracing::info!(prn = %reference, "callback replay for a settled payment");
            metrics::payment_callbacks_total
                .with_label_values(&["replayed"])
                .inc();
            return Ok(CallbackRedirect::Status { prn: reference });
        }

        // Merchant id must match what the session was created with.
        if session.merchant_id != pid {
            tracing::warn!(
                prn = %reference,
                expected = %session.merchant_id,
                got = %pid,
                "merchant id mismatch on return callback"
            );
            metrics::payment_callbacks_total
                .with_label_values(&["rejected"])
                .inc();
            return Ok(CallbackRedirect::Error {
                prn: Some(reference),
                code: CallbackErrorCode::PidMismatch,
            });
        }

        let snapshot = response_snapshot(&params);

        // Gateway-declared failure: record it and stop, no crediting.
        if !params.indicates_success() {
            self.payments
                .update_on_callback(&session.id, snapshot, PaymentStatus::Failed, None)
                .await
                .change_context(PaymentError::TransactionFailure(
                    "failed-status persistence failed".to_string(),
                ))?;
            tracing::info!(prn = %reference, ps = ?params.payment_status, rc = ?params.response_code, "gateway reported failure");
            metrics::payment_callbacks_total
                .with_label_values(&["failed"])
                .inc();
            return Ok(CallbackRedirect::Error {
                prn: Some(reference),
                code: CallbackErrorCode::PaymentFailed,
            });
        }

        // Response digest. A soft skip continues; a hard mismatch is
        // tamper evidence and terminates with an error.
        match params
            .verify_digest(&gateway.secret_key)
            .change_context(PaymentError::SignatureUnavailable)?
        {
            DigestOutcome::Mismatch => {
                metrics::dv_mismatch_total.inc();
                self.payments
                    .update_on_callback(&session.id, snapshot, PaymentStatus::Error, None)
                    .await
                    .change_context(PaymentError::TransactionFailure(
                        "error-status persistence failed".to_string(),
                    ))?;
                tracing::warn!(
                    prn = %reference,
                    classification = %PaymentError::SignatureMismatch,
                    "response digest mismatch"
                );
                metrics::payment_callbacks_total
                    .with_label_values(&["error"])
                    .inc();
                return Ok(CallbackRedirect::Error {
                    prn: Some(reference),
                    code: CallbackErrorCode::DvMismatch,
                });
            }
            DigestOutcome::Skipped => {
                tracing::warn!(
                    prn = %reference,
                    classification = %PaymentError::SignatureUnavailable,
                    "response digest not verifiable, continuing"
                );
            }
            DigestOutcome::Valid => {}
        }

        // Paid amount must match the session's vote count at the unit price.
        let expected = expected_amount(session.vote_count, self.config.voting.unit_price_per_vote);
        let amount_ok = params
            .paid_amount_decimal()
            .is_some_and(|paid| amount_within_tolerance(expected, paid));
        if !amount_ok {
            self.payments
                .update_on_callback(&session.id, snapshot, PaymentStatus::Error, None)
                .await
                .change_context(PaymentError::TransactionFailure(
                    "error-status persistence failed".to_string(),
                ))?;
            tracing::warn!(
                prn = %reference,
                expected = %expected,
                paid = ?params.paid_amount,
                classification = %PaymentError::AmountMismatch,
                "paid amount outside tolerance"
            );
            metrics::payment_callbacks_total
                .with_label_values(&["error"])
                .inc();
            return Ok(CallbackRedirect::Error {
                prn: Some(reference),
                code: CallbackErrorCode::AmountMismatch,
            });
        }

        // Confirmation branch, via the decision table.
        let (s2s, raw_api_response) = match (gateway.sandbox, gateway.api.as_ref()) {
            (false, Some(api)) => {
                let (result, raw) = self.call_merchant_api(api, &session, expected).await;
                (Some(result), raw)
            }
            _ => (None, None),
        };

        let settlement = decision::settle(ConfirmationContext {
            sandbox: gateway.sandbox,
            credentials_configured: gateway.api.is_some(),
            redirect_indicated_success: true,
            amount_matches: true,
            s2s,
        });

        self.payments
            .update_on_callback(
                &session.id,
                snapshot.clone(),
                settlement.status,
                raw_api_response,
            )
            .await
            .change_context(PaymentError::TransactionFailure(
                "settlement persistence failed".to_string(),
            ))?;

        self.apply_settlement(&session, settlement, snapshot, reference)
            .await
    }

    async fn apply_settlement(
        &self,
        session: &PaymentSession,
        settlement: Settlement,
        snapshot: ResponseSnapshot,
        reference: String,
    ) -> error_stack::Result<CallbackRedirect, PaymentError> {
        match settlement.action {
            CreditAction::None => {
                metrics::payment_callbacks_total
                    .with_label_values(&[&settlement.status.to_string()])
                    .inc();
                match settlement.error {
                    Some(code) => Ok(CallbackRedirect::Error {
                        prn: Some(reference),
                        code,
                    }),
                    None => Ok(CallbackRedirect::Status { prn: reference }),
                }
            }
            CreditAction::BestEffort => {
                self.creditor()
                    .credit_best_effort(session, settlement.verification)
                    .await?;
                metrics::payment_callbacks_total
                    .with_label_values(&["success"])
                    .inc();
                Ok(CallbackRedirect::Status { prn: reference })
            }
            CreditAction::Transactional => {
                match self.creditor().credit_transactional(session).await? {
                    CreditOutcome::Credited { .. } | CreditOutcome::Replayed => {
                        metrics::payment_callbacks_total
                            .with_label_values(&["success"])
                            .inc();
                        Ok(CallbackRedirect::Status { prn: reference })
                    }
                    CreditOutcome::Aborted { .. } => {
                        // Downgrade outside the aborted transaction: funds
                        // were captured but no votes moved.
                        self.payments
                            .update_on_callback(&session.id, snapshot, PaymentStatus::Error, None)
                            .await
                            .change_context(PaymentError::TransactionFailure(
                                "error-status persistence failed".to_string(),
                            ))?;
                        metrics::payment_callbacks_total
                            .with_label_values(&["error"])
                            .inc();
                        Ok(CallbackRedirect::Error {
                            prn: Some(reference),
                            code: CallbackErrorCode::Internal,
                        })
                    }
                }
            }
        }
    }

    /// S2S confirmation call. Transport failures are classified as
    /// unreachable and degrade per the decision table; a completed exchange
    /// is interpreted whatever its HTTP status.
    async fn call_merchant_api(
        &self,
        api: &MerchantApiParams,
        session: &PaymentSession,
        expected: Decimal,
    ) -> (S2sResult, Option<serde_json::Value>) {
        let request = match build_verification_request(
            api,
            &session.reference_id,
            &session.merchant_id,
            session.amount,
        ) {
            Ok(request) => request,
            Err(error) => {
                tracing::error!(prn = %session.reference_id, ?error, "failed to build verification request");
                metrics::s2s_verification_total
                    .with_label_values(&["unreachable"])
                    .inc();
                return (S2sResult::Unreachable, None);
            }
        };

        let sent = external_services::send_request(request)
            .await
            .change_context(PaymentError::GatewayUnreachable);
        let response = match sent {
            Ok(Ok(response)) | Ok(Err(response)) => response,
            Err(error) => {
                tracing::warn!(
                    prn = %session.reference_id,
                    ?error,
                    "verification endpoint unreachable, falling back to redirect trust"
                );
                metrics::s2s_verification_total
                    .with_label_values(&["unreachable"])
                    .inc();
                return (S2sResult::Unreachable, None);
            }
        };

        let report = parse_verification_response(&response.response);
        let remote_amount_matches = report
            .remote_amount
            .map(|remote| amount_within_tolerance(expected, remote));
        metrics::s2s_verification_total
            .with_label_values(&[&report.status.to_string()])
            .inc();
        tracing::info!(
            prn = %session.reference_id,
            status = %report.status,
            http_status = response.status_code,
            "verification response received"
        );
        (
            S2sResult::Completed {
                status: report.status,
                remote_amount_matches,
            },
            Some(report.raw),
        )
    }

    /// Diagnostics for operators when a callback references no known
    /// session: surface recent `created` sessions with a matching amount.
    /// Never credits, never guesses.
    async fn log_fallback_candidates(&self, params: &ReturnCallbackParams) {
        let Some(paid) = params.paid_amount_decimal() else {
            tracing::warn!(prn = ?params.prn, "unknown PRN and no parsable paid amount");
            return;
        };
        match self
            .payments
            .find_recent_created_with_amount(paid, FALLBACK_SEARCH_WINDOW)
            .await
        {
            Ok(candidates) if !candidates.is_empty() => {
                let references: Vec<_> = candidates
                    .iter()
                    .map(|session| session.reference_id.clone())
                    .collect();
                tracing::warn!(
                    prn = ?params.prn,
                    candidates = ?references,
                    "unknown PRN; recent created sessions match the paid amount"
                );
            }
            Ok(_) => {
                tracing::warn!(prn = ?params.prn, "unknown PRN; no recent amount match");
            }
            Err(error) => {
                tracing::error!(?error, "fallback search failed");
            }
        }
    }
}

fn response_snapshot(params: &ReturnCallbackParams) -> ResponseSnapshot {
    ResponseSnapshot {
        gateway_success_flag: params.payment_status.clone(),
        response_code: params.response_code.clone(),
        trace_id: params.trace_id.clone(),
        bank_code: params.bank_code.clone(),
        initiator_code: params.initiator_code.clone(),
        paid_amount_raw: params.paid_amount.clone(),
        refund_amount_raw: params.refund_amount.clone(),
        response_signature: params.digest.clone(),
    }
}
