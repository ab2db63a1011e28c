//! Persistence seams for payment sessions and contestant counters.
//!
//! The handlers only ever see the two traits below. All consistency the
//! settlement core relies on is part of the trait contract, not an
//! implementation accident:
//!
//! * [`PaymentStore::credit_transaction`] is the idempotency fence plus the
//!   all-or-nothing bulk credit: it atomically performs the conditional
//!   update `verification_status := success WHERE verification_status !=
//!   success` and, only when that matched, applies every contestant
//!   increment — or none of them.
//! * [`PaymentStore::mark_verification_if_uncredited`] is the fence the
//!   best-effort (sandbox/bypass) paths enter through: a conditional update
//!   that only matches a session whose verification never left
//!   `pending`/`failed`, so a replayed callback cannot credit twice.
//! * Callback writes are field-scoped ([`PaymentStore::update_on_callback`])
//!   and never touch `verification_status`; only the two conditional
//!   updates above may move it forward. A session that reached `success`
//!   is never moved off it by a later write.

pub mod memory;

use async_trait::async_trait;
use domain_types::{
    contestant::{Contestant, VoteCredit},
    errors::StorageError,
    payment::{
        PaymentSession, PaymentStatus, ResponseSnapshot, VerificationStatus,
    },
};
use rust_decimal::Decimal;
use serde::Serialize;

pub use memory::InMemoryStore;

pub type StorageResult<T> = error_stack::Result<T, StorageError>;

/// Result of the conditional-update credit transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Fence passed; every increment applied.
    Credited { applied: usize },
    /// Fence matched no row: another execution already credited this
    /// payment. Nothing was mutated.
    Replayed,
    /// A crediting target does not exist; the transaction was rolled back
    /// and nothing was mutated, including the fence.
    Aborted { missing_contestant: String },
}

/// Aggregate figures for the read-only stats endpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStats {
    pub total: usize,
    pub created: usize,
    pub success: usize,
    pub failed: usize,
    pub pending: usize,
    pub error: usize,
    pub votes_sold: u64,
    pub gross_success_amount: Decimal,
}

impl PaymentStats {
    pub fn absorb(&mut self, session: &PaymentSession) {
        self.total += 1;
        match session.status {
            PaymentStatus::Created => self.created += 1,
            PaymentStatus::Success => {
                self.success += 1;
                self.votes_sold += u64::from(session.vote_count);
                self.gross_success_amount += session.amount;
            }
            PaymentStatus::Failed => self.failed += 1,
            PaymentStatus::Pending => self.pending += 1,
            PaymentStatus::Error => self.error += 1,
        }
    }
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, session: PaymentSession) -> StorageResult<()>;

    async fn find_by_reference(&self, reference_id: &str)
        -> StorageResult<Option<PaymentSession>>;

    async fn find_by_id(&self, id: &str) -> StorageResult<Option<PaymentSession>>;

    /// Record the callback outcome: response snapshot, settlement status
    /// and, when an S2S call was made, the raw gateway payload. Does not
    /// touch `verification_status`; does not move a `success` session off
    /// `success`.
    async fn update_on_callback(
        &self,
        session_id: &str,
        snapshot: ResponseSnapshot,
        status: PaymentStatus,
        gateway_api_response: Option<serde_json::Value>,
    ) -> StorageResult<()>;

    /// Conditional update used by the best-effort crediting paths: set
    /// `verification_status := target` only when the session has never been
    /// credited (`pending` or `failed`). Returns whether the update matched.
    async fn mark_verification_if_uncredited(
        &self,
        session_id: &str,
        target: VerificationStatus,
    ) -> StorageResult<bool>;

    /// The idempotency fence and the all-or-nothing bulk credit, in one
    /// atomic unit. See [`CreditOutcome`].
    async fn credit_transaction(
        &self,
        session_id: &str,
        credits: &[VoteCredit],
    ) -> StorageResult<CreditOutcome>;

    /// Diagnostic fallback: `created` sessions from the last `window`
    /// whose amount matches the paid amount within tolerance.
    async fn find_recent_created_with_amount(
        &self,
        paid_amount: Decimal,
        window: time::Duration,
    ) -> StorageResult<Vec<PaymentSession>>;

    async fn list_all(&self) -> StorageResult<Vec<PaymentSession>>;

    async fn stats(&self) -> StorageResult<PaymentStats>;
}

#[async_trait]
pub trait ContestantStore: Send + Sync {
    async fn find(&self, id: &str) -> StorageResult<Option<Contestant>>;

    /// Increment one contestant's counter; returns the new total.
    async fn increment_votes(&self, id: &str, votes: u32) -> StorageResult<u64>;

    async fn upsert(&self, contestant: Contestant) -> StorageResult<()>;
}
