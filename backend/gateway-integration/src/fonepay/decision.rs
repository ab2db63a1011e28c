//! Settlement decision table for the confirmation step.
//!
//! The return callback's confirmation branch is a pure mapping from what is
//! known (mode, credentials, what the redirect said, whether amounts agree,
//! what the S2S call returned) to one terminal settlement. Keeping it a
//! table makes the state machine exhaustively testable.

use domain_types::{
    errors::CallbackErrorCode,
    payment::{PaymentStatus, VerificationStatus},
};

use super::verification::GatewayTxnStatus;

/// Outcome of the S2S confirmation attempt, when one was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S2sResult {
    /// Transport failure: timeout, connection refused, DNS.
    Unreachable,
    Completed {
        status: GatewayTxnStatus,
        /// `None` when the API response carried no amount field.
        remote_amount_matches: Option<bool>,
    },
}

/// Everything the confirmation step knows when it decides.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationContext {
    pub sandbox: bool,
    pub credentials_configured: bool,
    pub redirect_indicated_success: bool,
    pub amount_matches: bool,
    /// `None` when no S2S call was attempted.
    pub s2s: Option<S2sResult>,
}

/// How (and whether) votes get credited for this settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditAction {
    None,
    /// Per-item, non-transactional. Sandbox and bypass paths.
    BestEffort,
    /// All-or-nothing under the store transaction. S2S-confirmed path.
    Transactional,
}

/// One terminal settlement decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub status: PaymentStatus,
    pub verification: VerificationStatus,
    pub action: CreditAction,
    pub error: Option<CallbackErrorCode>,
}

pub fn settle(ctx: ConfirmationContext) -> Settlement {
    // The handler only enters confirmation after the redirect indicated
    // success; anything else is a defensive terminal failure.
    if !ctx.redirect_indicated_success {
        return Settlement {
            status: PaymentStatus::Failed,
            verification: VerificationStatus::Failed,
            action: CreditAction::None,
            error: Some(CallbackErrorCode::PaymentFailed),
        };
    }

    if ctx.sandbox {
        return Settlement {
            status: PaymentStatus::Success,
            verification: VerificationStatus::Skipped,
            action: CreditAction::BestEffort,
            error: None,
        };
    }

    if !ctx.credentials_configured {
        // Redirect-trust only; the amount is re-checked on this branch and
        // a violation here reads as deliberate tampering.
        if !ctx.amount_matches {
            return Settlement {
                status: PaymentStatus::Error,
                verification: VerificationStatus::Failed,
                action: CreditAction::None,
                error: Some(CallbackErrorCode::AmountManipulation),
            };
        }
        return Settlement {
            status: PaymentStatus::Success,
            verification: VerificationStatus::Bypassed,
            action: CreditAction::BestEffort,
            error: None,
        };
    }

    if !ctx.amount_matches {
        return Settlement {
            status: PaymentStatus::Error,
            verification: VerificationStatus::Failed,
            action: CreditAction::None,
            error: Some(CallbackErrorCode::AmountMismatch),
        };
    }

    match ctx.s2s {
        // Credentials configured but the call never completed: do not
        // strand a paid user. The redirect said success and the amount
        // matches, so trust the redirect and record that verification was
        // skipped.
        None | Some(S2sResult::Unreachable) => Settlement {
            status: PaymentStatus::Success,
            verification: VerificationStatus::Skipped,
            action: CreditAction::BestEffort,
            error: None,
        },
        Some(S2sResult::Completed {
            status: GatewayTxnStatus::Success,
            remote_amount_matches,
        }) => {
            if remote_amount_matches == Some(false) {
                return Settlement {
                    status: PaymentStatus::Error,
                    verification: VerificationStatus::Failed,
                    action: CreditAction::None,
                    error: Some(CallbackErrorCode::AmountMismatch),
                };
            }
            Settlement {
                status: PaymentStatus::Success,
                verification: VerificationStatus::Success,
                action: CreditAction::Transactional,
                error: None,
            }
        }
        Some(S2sResult::Completed {
            status: GatewayTxnStatus::Failed,
            ..
        }) => Settlement {
            status: PaymentStatus::Failed,
            verification: VerificationStatus::Failed,
            action: CreditAction::None,
            error: Some(CallbackErrorCode::PaymentFailed),
        },
        Some(S2sResult::Completed {
            status: GatewayTxnStatus::Other,
            ..
        }) => Settlement {
            status: PaymentStatus::Pending,
            verification: VerificationStatus::Pending,
            action: CreditAction::None,
            error: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_ctx() -> ConfirmationContext {
        ConfirmationContext {
            sandbox: false,
            credentials_configured: true,
            redirect_indicated_success: true,
            amount_matches: true,
            s2s: None,
        }
    }

    #[test]
    fn sandbox_succeeds_with_skipped_verification() {
        let settlement = settle(ConfirmationContext {
            sandbox: true,
            credentials_configured: false,
            ..live_ctx()
        });
        assert_eq!(settlement.status, PaymentStatus::Success);
        assert_eq!(settlement.verification, VerificationStatus::Skipped);
        assert_eq!(settlement.action, CreditAction::BestEffort);
    }

    #[test]
    fn missing_credentials_bypass_recheck_amount() {
        let ok = settle(ConfirmationContext {
            credentials_configured: false,
            ..live_ctx()
        });
        assert_eq!(ok.verification, VerificationStatus::Bypassed);
        assert_eq!(ok.action, CreditAction::BestEffort);

        let tampered = settle(ConfirmationContext {
            credentials_configured: false,
            amount_matches: false,
            ..live_ctx()
        });
        assert_eq!(tampered.status, PaymentStatus::Error);
        assert_eq!(tampered.action, CreditAction::None);
        assert_eq!(
            tampered.error,
            Some(CallbackErrorCode::AmountManipulation)
        );
    }

    #[test]
    fn unreachable_s2s_degrades_to_redirect_trust() {
        let settlement = settle(ConfirmationContext {
            s2s: Some(S2sResult::Unreachable),
            ..live_ctx()
        });
        assert_eq!(settlement.status, PaymentStatus::Success);
        assert_eq!(settlement.verification, VerificationStatus::Skipped);
    }

    #[test]
    fn unreachable_s2s_without_redirect_success_fails() {
        let settlement = settle(ConfirmationContext {
            redirect_indicated_success: false,
            s2s: Some(S2sResult::Unreachable),
            ..live_ctx()
        });
        assert_eq!(settlement.status, PaymentStatus::Failed);
        assert_eq!(settlement.action, CreditAction::None);
    }

    #[test]
    fn confirmed_success_credits_transactionally() {
        let settlement = settle(ConfirmationContext {
            s2s: Some(S2sResult::Completed {
                status: GatewayTxnStatus::Success,
                remote_amount_matches: Some(true),
            }),
            ..live_ctx()
        });
        assert_eq!(settlement.status, PaymentStatus::Success);
        assert_eq!(settlement.verification, VerificationStatus::Success);
        assert_eq!(settlement.action, CreditAction::Transactional);
    }

    #[test]
    fn remote_amount_disagreement_is_an_error() {
        let settlement = settle(ConfirmationContext {
            s2s: Some(S2sResult::Completed {
                status: GatewayTxnStatus::Success,
                remote_amount_matches: Some(false),
            }),
            ..live_ctx()
        });
        assert_eq!(settlement.status, PaymentStatus::Error);
        assert_eq!(settlement.action, CreditAction::None);
    }

    #[test]
    fn confirmed_failure_fails_without_credit() {
        let settlement = settle(ConfirmationContext {
            s2s: Some(S2sResult::Completed {
                status: GatewayTxnStatus::Failed,
                remote_amount_matches: None,
            }),
            ..live_ctx()
        });
        assert_eq!(settlement.status, PaymentStatus::Failed);
        assert_eq!(settlement.error, Some(CallbackErrorCode::PaymentFailed));
    }

    #[test]
    fn indeterminate_s2s_parks_as_pending() {
        let settlement = settle(ConfirmationContext {
            s2s: Some(S2sResult::Completed {
                status: GatewayTxnStatus::Other,
                remote_amount_matches: None,
            }),
            ..live_ctx()
        });
        assert_eq!(settlement.status, PaymentStatus::Pending);
        assert_eq!(settlement.action, CreditAction::None);
    }
}
