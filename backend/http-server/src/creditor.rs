//! Vote crediting: turn a settled payment into contestant counter
//! increments, exactly once.
//!
//! Two paths, deliberately asymmetric (a long-standing product tradeoff):
//! the S2S-confirmed path is all-or-nothing inside the store transaction,
//! while the sandbox/bypass paths apply per-item increments best-effort and
//! only log failures. Both enter through a conditional update on
//! `verification_status`, so a replayed callback can never credit twice.

use std::sync::Arc;

use domain_types::{
    contestant::VoteCredit,
    errors::PaymentError,
    payment::{PaymentSession, VerificationStatus},
};
use error_stack::ResultExt;
use gateway_integration::fonepay::bulk;
use storage::{ContestantStore, CreditOutcome, PaymentStore};

use crate::metrics;

pub struct VoteCreditor {
    payments: Arc<dyn PaymentStore>,
    contestants: Arc<dyn ContestantStore>,
}

/// Result of the best-effort (non-transactional) crediting path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffortOutcome {
    /// The fence had already been passed; nothing was credited.
    Replayed,
    Applied {
        credited_votes: u64,
        /// Contestant ids whose increment failed; reconciled manually.
        failures: Vec<String>,
    },
}

impl VoteCreditor {
    pub fn new(payments: Arc<dyn PaymentStore>, contestants: Arc<dyn ContestantStore>) -> Self {
        Self {
            payments,
            contestants,
        }
    }

    /// Decode the bulk payload; an empty decode falls back to the payment's
    /// primary contestant.
    pub fn crediting_targets(session: &PaymentSession) -> Vec<VoteCredit> {
        let decoded = session
            .auxiliary1
            .as_deref()
            .map(bulk::decode)
            .unwrap_or_default();
        if decoded.is_empty() {
            vec![VoteCredit::new(
                session.primary_contestant_id.clone(),
                session.vote_count,
            )]
        } else {
            decoded
        }
    }

    /// All-or-nothing credit under the store transaction, fenced by the
    /// conditional update `verification_status != success -> success`.
    pub async fn credit_transactional(
        &self,
        session: &PaymentSession,
    ) -> error_stack::Result<CreditOutcome, PaymentError> {
        let targets = Self::crediting_targets(session);
        let total_votes: u64 = targets.iter().map(|t| u64::from(t.votes)).sum();

        let outcome = self
            .payments
            .credit_transaction(&session.id, &targets)
            .await
            .change_context(PaymentError::TransactionFailure(
                "credit transaction failed".to_string(),
            ))?;

        match &outcome {
            CreditOutcome::Credited { applied } => {
                metrics::votes_credited_total
                    .with_label_values(&["s2s"])
                    .inc_by(total_votes);
                tracing::info!(
                    prn = %session.reference_id,
                    contestants = applied,
                    votes = total_votes,
                    "votes credited"
                );
            }
            CreditOutcome::Replayed => {
                metrics::replay_attempt_total.inc();
                tracing::info!(
                    prn = %session.reference_id,
                    classification = %PaymentError::ReplayDetected,
                    "credit fenced off"
                );
            }
            CreditOutcome::Aborted { missing_contestant } => {
                metrics::tx_fail_total.inc();
                tracing::error!(
                    prn = %session.reference_id,
                    contestant = %missing_contestant,
                    "bulk credit aborted; funds captured but no votes credited, manual reconciliation required"
                );
            }
        }
        Ok(outcome)
    }

    /// Best-effort per-item credit for the sandbox/bypass paths. The fence
    /// is the conditional move of `verification_status` out of its
    /// uncredited states into `target`; item failures are logged, not
    /// retried, and never fail the payment.
    pub async fn credit_best_effort(
        &self,
        session: &PaymentSession,
        target: VerificationStatus,
    ) -> error_stack::Result<BestEffortOutcome, PaymentError> {
        let fenced = self
            .payments
            .mark_verification_if_uncredited(&session.id, target)
            .await
            .change_context(PaymentError::TransactionFailure(
                "verification fence update failed".to_string(),
            ))?;
        if !fenced {
            metrics::replay_attempt_total.inc();
            tracing::info!(
                prn = %session.reference_id,
                classification = %PaymentError::ReplayDetected,
                "credit fenced off"
            );
            return Ok(BestEffortOutcome::Replayed);
        }

        let targets = Self::crediting_targets(session);
        let mut credited_votes = 0u64;
        let mut failures = Vec::new();
        for credit in &targets {
            match self
                .contestants
                .increment_votes(&credit.contestant_id, credit.votes)
                .await
            {
                Ok(total) => {
                    credited_votes += u64::from(credit.votes);
                    tracing::debug!(
                        contestant = %credit.contestant_id,
                        votes = credit.votes,
                        total,
                        "vote counter incremented"
                    );
                }
                Err(error) => {
                    metrics::credit_item_failures_total.inc();
                    tracing::error!(
                        prn = %session.reference_id,
                        contestant = %credit.contestant_id,
                        ?error,
                        "vote credit failed on bypass path, manual reconciliation required"
                    );
                    failures.push(credit.contestant_id.clone());
                }
            }
        }

        if credited_votes > 0 {
            metrics::votes_credited_total
                .with_label_values(&[&target.to_string()])
                .inc_by(credited_votes);
        }
        if failures.len() == targets.len() {
            tracing::error!(
                prn = %session.reference_id,
                "every credit item failed; payment stays successful for the user"
            );
        }
        Ok(BestEffortOutcome::Applied {
            credited_votes,
            failures,
        })
    }
}
