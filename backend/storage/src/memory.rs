//! In-memory store engine.
//!
//! Both traits are implemented on one store so the credit transaction can
//! cover the session fence and the contestant counters under a single
//! writer lock, which is what gives [`PaymentStore::credit_transaction`]
//! its atomicity.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use domain_types::{
    contestant::{Contestant, VoteCredit},
    errors::StorageError,
    payment::{
        amount_within_tolerance, PaymentSession, PaymentStatus, ResponseSnapshot,
        VerificationStatus,
    },
};
use error_stack::report;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{ContestantStore, CreditOutcome, PaymentStats, PaymentStore, StorageResult};

#[derive(Default)]
struct Inner {
    payments: HashMap<String, PaymentSession>,
    reference_index: HashMap<String, String>,
    contestants: HashMap<String, Contestant>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

/// A session whose verification never moved past `pending`/`failed` has
/// not had votes credited.
fn is_uncredited(status: VerificationStatus) -> bool {
    matches!(
        status,
        VerificationStatus::Pending | VerificationStatus::Failed
    )
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_contestants(&self, contestants: impl IntoIterator<Item = Contestant>) {
        let mut inner = self.inner.write().await;
        for contestant in contestants {
            inner.contestants.insert(contestant.id.clone(), contestant);
        }
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert(&self, session: PaymentSession) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if inner.reference_index.contains_key(&session.reference_id) {
            return Err(report!(StorageError::DuplicateReference));
        }
        inner
            .reference_index
            .insert(session.reference_id.clone(), session.id.clone());
        inner.payments.insert(session.id.clone(), session);
        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference_id: &str,
    ) -> StorageResult<Option<PaymentSession>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reference_index
            .get(reference_id)
            .and_then(|id| inner.payments.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> StorageResult<Option<PaymentSession>> {
        let inner = self.inner.read().await;
        Ok(inner.payments.get(id).cloned())
    }

    async fn update_on_callback(
        &self,
        session_id: &str,
        snapshot: ResponseSnapshot,
        status: PaymentStatus,
        gateway_api_response: Option<serde_json::Value>,
    ) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .payments
            .get_mut(session_id)
            .ok_or_else(|| report!(StorageError::NotFound))?;
        session.response_snapshot = snapshot;
        // Forward-only: success is never reverted by a later callback.
        if session.status != PaymentStatus::Success || status == PaymentStatus::Success {
            session.status = status;
        }
        if gateway_api_response.is_some() {
            session.gateway_api_response = gateway_api_response;
        }
        session.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn mark_verification_if_uncredited(
        &self,
        session_id: &str,
        target: VerificationStatus,
    ) -> StorageResult<bool> {
        let mut inner = self.inner.write().await;
        let session = inner
            .payments
            .get_mut(session_id)
            .ok_or_else(|| report!(StorageError::NotFound))?;
        if !is_uncredited(session.verification_status) {
            return Ok(false);
        }
        session.verification_status = target;
        session.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn credit_transaction(
        &self,
        session_id: &str,
        credits: &[VoteCredit],
    ) -> StorageResult<CreditOutcome> {
        let mut inner = self.inner.write().await;

        // Conditional update: the fence.
        let Some(session) = inner.payments.get(session_id) else {
            return Err(report!(StorageError::NotFound));
        };
        if session.verification_status == VerificationStatus::Success {
            return Ok(CreditOutcome::Replayed);
        }

        // Validate every target before touching anything: all-or-nothing.
        for credit in credits {
            if !inner.contestants.contains_key(&credit.contestant_id) {
                return Ok(CreditOutcome::Aborted {
                    missing_contestant: credit.contestant_id.clone(),
                });
            }
        }

        if let Some(session) = inner.payments.get_mut(session_id) {
            session.verification_status = VerificationStatus::Success;
            session.updated_at = OffsetDateTime::now_utc();
        }
        for credit in credits {
            if let Some(contestant) = inner.contestants.get_mut(&credit.contestant_id) {
                contestant.vote_total += u64::from(credit.votes);
            }
        }
        Ok(CreditOutcome::Credited {
            applied: credits.len(),
        })
    }

    async fn find_recent_created_with_amount(
        &self,
        paid_amount: Decimal,
        window: time::Duration,
    ) -> StorageResult<Vec<PaymentSession>> {
        let cutoff = OffsetDateTime::now_utc() - window;
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .filter(|session| {
                session.status == PaymentStatus::Created
                    && session.created_at >= cutoff
                    && amount_within_tolerance(session.amount, paid_amount)
            })
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> StorageResult<Vec<PaymentSession>> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<_> = inner.payments.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn stats(&self) -> StorageResult<PaymentStats> {
        let inner = self.inner.read().await;
        let mut stats = PaymentStats::default();
        for session in inner.payments.values() {
            stats.absorb(session);
        }
        Ok(stats)
    }
}

#[async_trait]
impl ContestantStore for InMemoryStore {
    async fn find(&self, id: &str) -> StorageResult<Option<Contestant>> {
        let inner = self.inner.read().await;
        Ok(inner.contestants.get(id).cloned())
    }

    async fn increment_votes(&self, id: &str, votes: u32) -> StorageResult<u64> {
        let mut inner = self.inner.write().await;
        let contestant = inner
            .contestants
            .get_mut(id)
            .ok_or_else(|| report!(StorageError::NotFound))?;
        contestant.vote_total += u64::from(votes);
        Ok(contestant.vote_total)
    }

    async fn upsert(&self, contestant: Contestant) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        inner.contestants.insert(contestant.id.clone(), contestant);
        Ok(())
    }
}
