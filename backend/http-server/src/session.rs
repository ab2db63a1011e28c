//! Payment session creation: persist a `created` row and hand the browser
//! a signed gateway redirect URL.

use std::sync::Arc;

use common_utils::id;
use domain_types::{
    errors::PaymentError,
    payment::{
        amount_within_tolerance, expected_amount, normalize_reference, PaymentSession,
        PaymentStatus, RequestSnapshot, ResponseSnapshot, VerificationStatus, REFERENCE_PREFIX,
    },
};
use error_stack::ResultExt;
use gateway_integration::fonepay::{
    bulk,
    dv::DvError,
    types::{RedirectRequest, R2_MAX_LEN},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storage::{ContestantStore, PaymentStore};
use time::OffsetDateTime;

use crate::{configs, metrics};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub amount: Decimal,
    pub vote: u32,
    pub contestant: String,
    pub prn: Option<String>,
    pub description: Option<String>,
    pub r1: Option<String>,
    pub r2: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub prn: String,
    pub redirect_url: String,
}

pub struct PaymentSessionManager {
    config: Arc<configs::Config>,
    payments: Arc<dyn PaymentStore>,
    contestants: Arc<dyn ContestantStore>,
}

impl PaymentSessionManager {
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

    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> error_stack::Result<CreatedSession, PaymentError> {
        let gateway = &self.config.gateway;

        if request.vote == 0 {
            return Err(PaymentError::ValidationError("vote must be at least 1".to_string()).into());
        }
        if request.contestant.trim().is_empty() {
            return Err(
                PaymentError::ValidationError("contestant id must not be empty".to_string()).into(),
            );
        }
        let expected = expected_amount(request.vote, self.config.voting.unit_price_per_vote);
        if !amount_within_tolerance(expected, request.amount) {
            return Err(PaymentError::ValidationError(format!(
                "amount {} does not match {} votes at the configured unit price",
                request.amount, request.vote
            ))
            .into());
        }

        let contestant = self
            .contestants
            .find(&request.contestant)
            .await
            .change_context(PaymentError::TransactionFailure(
                "contestant lookup failed".to_string(),
            ))?
            .ok_or(PaymentError::NotFound("contestant"))?;

        // The gateway's transport caps on the auxiliary fields are
        // documented but unverified in practice; surface, don't reject.
        if let Some(r1) = request.r1.as_deref() {
            if !bulk::fits_transport(r1) {
                tracing::warn!(
                    len = r1.len(),
                    "auxiliary1 exceeds the gateway's documented transport cap"
                );
            }
        }
        if let Some(r2) = request.r2.as_deref() {
            if r2.len() > R2_MAX_LEN {
                tracing::warn!(
                    len = r2.len(),
                    "auxiliary2 exceeds the gateway's documented transport cap"
                );
            }
        }

        let reference_id = match request.prn.as_deref() {
            Some(prn) => normalize_reference(prn),
            None => id::generate_time_reference(REFERENCE_PREFIX),
        };
        let return_url = gateway.return_url();
        let now = OffsetDateTime::now_utc();

        let params = RedirectRequest {
            merchant_id: gateway.merchant_id.clone(),
            reference_id: reference_id.clone(),
            amount: request.amount,
            currency: gateway.currency.clone(),
            return_url: return_url.clone(),
            auxiliary1: request.r1.clone(),
            auxiliary2: request.r2.clone(),
            date: now.date(),
        }
        .into_signed_params(&gateway.secret_key)
        .map_err(|report| match report.current_context() {
            DvError::DelimiterInField => report.change_context(PaymentError::ValidationError(
                "a request field contains a character the gateway cannot sign".to_string(),
            )),
            DvError::DigestFailed => report.change_context(PaymentError::TransactionFailure(
                "request signing failed".to_string(),
            )),
        })?;

        let session = PaymentSession {
            id: id::generate_id_with_prefix("pay"),
            reference_id: reference_id.clone(),
            merchant_id: gateway.merchant_id.clone(),
            primary_contestant_id: contestant.id,
            primary_contestant_name: contestant.name,
            vote_count: request.vote,
            amount: request.amount,
            purpose: request
                .description
                .unwrap_or_else(|| "vote purchase".to_string()),
            auxiliary1: request.r1,
            auxiliary2: request.r2,
            request_snapshot: RequestSnapshot {
                return_url,
                request_indicator: params.request_indicator.clone(),
                date_token: params.date_token.clone(),
                mode_token: params.mode.clone(),
                request_signature: params.digest.clone(),
            },
            response_snapshot: ResponseSnapshot::default(),
            status: PaymentStatus::Created,
            verification_status: VerificationStatus::Pending,
            gateway_api_response: None,
            created_at: now,
            updated_at: now,
        };

        self.payments
            .insert(session)
            .await
            .map_err(|report| match report.current_context() {
                domain_types::errors::StorageError::DuplicateReference => report.change_context(
                    PaymentError::ValidationError("payment reference already exists".to_string()),
                ),
                _ => report.change_context(PaymentError::TransactionFailure(
                    "session persistence failed".to_string(),
                )),
            })?;

        let redirect_url = params
            .redirect_url(&gateway.base_url)
            .change_context(PaymentError::TransactionFailure(
                "gateway base URL is not a valid URL".to_string(),
            ))?;

        metrics::payment_sessions_created_total.inc();
        tracing::info!(
            prn = %reference_id,
            contestant = %request.contestant,
            vote = request.vote,
            "payment session created"
        );

        Ok(CreatedSession {
            prn: reference_id,
            redirect_url,
        })
    }
}
