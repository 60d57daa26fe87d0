//! Maker/checker workflow for levy rate changes.
//!
//! A rate change moves a levy through two states:
//!
//! ```text
//!            propose (maker)
//!  Active ─────────────────────▶ PendingApproval
//!    ▲                                │
//!    │   approve (checker): proposed  │
//!    └────────────────────────────────┘
//!        reject (checker): current
//! ```
//!
//! These functions only compute the next state. The rate-configuration store
//! applies them and is responsible for serializing transitions per levy.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::RateState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("a rate change is already awaiting approval (proposed {proposed_rate})")]
    AlreadyPending { proposed_rate: Decimal },

    #[error("no rate change is awaiting approval")]
    NoPendingChange,

    #[error("proposed rate cannot be negative, got {0}")]
    NegativeRate(Decimal),

    #[error("proposed rate {0} equals the current rate")]
    UnchangedRate(Decimal),

    #[error("{0} must be identified")]
    MissingActor(&'static str),

    #[error("'{0}' submitted this change and cannot also decide it")]
    SelfApproval(String),
}

fn require_actor(
    role: &'static str,
    actor: &str,
) -> Result<(), ApprovalError> {
    if actor.trim().is_empty() {
        return Err(ApprovalError::MissingActor(role));
    }
    Ok(())
}

fn same_actor(
    a: &str,
    b: &str,
) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Maker proposes `proposed_rate` for an active levy.
pub fn propose(
    state: &RateState,
    proposed_rate: Decimal,
    submitted_by: &str,
) -> Result<RateState, ApprovalError> {
    require_actor("maker", submitted_by)?;

    let current_rate = match state {
        RateState::Active { rate } => *rate,
        RateState::PendingApproval { proposed_rate, .. } => {
            return Err(ApprovalError::AlreadyPending {
                proposed_rate: *proposed_rate,
            });
        }
    };

    if proposed_rate.is_sign_negative() && !proposed_rate.is_zero() {
        return Err(ApprovalError::NegativeRate(proposed_rate));
    }
    if proposed_rate == current_rate {
        return Err(ApprovalError::UnchangedRate(proposed_rate));
    }

    Ok(RateState::PendingApproval {
        current_rate,
        proposed_rate,
        submitted_by: submitted_by.trim().to_string(),
    })
}

/// Checker approves the pending proposal; the proposed rate becomes active.
pub fn approve(
    state: &RateState,
    approved_by: &str,
) -> Result<RateState, ApprovalError> {
    let (_, proposed_rate) = decide(state, approved_by)?;
    Ok(RateState::Active {
        rate: proposed_rate,
    })
}

/// Checker rejects the pending proposal; the current rate stays active.
pub fn reject(
    state: &RateState,
    rejected_by: &str,
) -> Result<RateState, ApprovalError> {
    let (current_rate, _) = decide(state, rejected_by)?;
    Ok(RateState::Active { rate: current_rate })
}

/// Shared checks for a checker decision. Returns (current, proposed).
fn decide(
    state: &RateState,
    checker: &str,
) -> Result<(Decimal, Decimal), ApprovalError> {
    require_actor("checker", checker)?;

    match state {
        RateState::Active { .. } => Err(ApprovalError::NoPendingChange),
        RateState::PendingApproval {
            current_rate,
            proposed_rate,
            submitted_by,
        } => {
            if same_actor(submitted_by, checker) {
                return Err(ApprovalError::SelfApproval(checker.trim().to_string()));
            }
            Ok((*current_rate, *proposed_rate))
        }
    }
}
