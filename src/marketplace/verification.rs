//! Identity verification state machine.
//!
//! ```text
//! none ──submit──▶ pending ──approve──▶ approved
//!                     │  ▲
//!                  reject │ submit
//!                     ▼  │
//!                   rejected
//! ```
//!
//! Functions here are pure: they take the current user and queue and return the values the
//! façade should commit. Resolving a request deletes it from the queue, so the queue is always
//! exactly the set of pending requests.

use chrono::{DateTime, Utc};

use super::domain::{
    RequestStatus, User, ValidationError, VerificationDecision, VerificationDetails,
    VerificationRequest, VerificationStatus,
};
use super::repository::DecisionLedger;

/// Workflow rule violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("a verification request for '{0}' is already pending")]
    AlreadyPending(String),
    #[error("'{0}' is already verified")]
    AlreadyVerified(String),
    #[error("no pending verification request for '{0}'")]
    NoSuchPendingRequest(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Result of accepting a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub request: VerificationRequest,
    pub user: User,
    pub queue: Vec<VerificationRequest>,
}

pub fn has_pending(queue: &[VerificationRequest], user_id: &str) -> bool {
    queue.iter().any(|request| request.user_id == user_id)
}

/// Queue a request for `user` and move them to `pending`. `verified` is left untouched.
pub fn submit(
    user: &User,
    queue: &[VerificationRequest],
    details: VerificationDetails,
    submitted_at: DateTime<Utc>,
) -> Result<Submission, VerificationError> {
    if has_pending(queue, &user.name) {
        return Err(VerificationError::AlreadyPending(user.name.clone()));
    }
    match user.verification_status {
        VerificationStatus::None | VerificationStatus::Rejected => {}
        VerificationStatus::Pending => {
            return Err(VerificationError::AlreadyPending(user.name.clone()))
        }
        VerificationStatus::Approved => {
            return Err(VerificationError::AlreadyVerified(user.name.clone()))
        }
    }
    details.validate(user.user_type)?;

    let request = VerificationRequest {
        user_id: user.name.clone(),
        user_type: user.user_type,
        submitted_at,
        status: RequestStatus::Pending,
        details,
    };

    let mut next_queue = queue.to_vec();
    next_queue.push(request.clone());

    let mut next_user = user.clone();
    next_user.verification_status = VerificationStatus::Pending;
    next_user.rejection_reason = None;

    Ok(Submission {
        request,
        user: next_user,
        queue: next_queue,
    })
}

/// Check a rejection reason, returning it trimmed.
pub fn rejection(reason: &str) -> Result<VerificationDecision, VerificationError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::MissingReason.into());
    }
    Ok(VerificationDecision::Rejected {
        reason: reason.to_string(),
    })
}

/// Remove `user_id`'s request from the queue. Any stray duplicates go with it.
pub fn resolve(
    queue: &[VerificationRequest],
    user_id: &str,
) -> Result<Vec<VerificationRequest>, VerificationError> {
    if !has_pending(queue, user_id) {
        return Err(VerificationError::NoSuchPendingRequest(user_id.to_string()));
    }
    Ok(queue
        .iter()
        .filter(|request| request.user_id != user_id)
        .cloned()
        .collect())
}

/// The user as they look once `decision` has been applied.
pub fn decide(user: &User, decision: &VerificationDecision) -> User {
    let mut next = user.clone();
    match decision {
        VerificationDecision::Approved => {
            next.verified = true;
            next.verification_status = VerificationStatus::Approved;
            next.rejection_reason = None;
        }
        VerificationDecision::Rejected { reason } => {
            next.verified = false;
            next.verification_status = VerificationStatus::Rejected;
            next.rejection_reason = Some(reason.clone());
        }
    }
    next
}

/// Bring a user who is starting or resuming a session up to date with the admin queue.
///
/// A decision recorded while they were away is applied and consumed. Otherwise a request
/// still in the queue puts them back in `pending`. Returns the reconciled user and, when a
/// decision was consumed, the ledger without it.
pub fn reconcile(
    user: &User,
    queue: &[VerificationRequest],
    ledger: &DecisionLedger,
) -> (User, Option<DecisionLedger>) {
    let user = user.clone().normalized();

    if let Some(decision) = ledger.get(&user.name) {
        let mut remaining = ledger.clone();
        remaining.remove(&user.name);
        // A newer submission supersedes an older ruling.
        if has_pending(queue, &user.name) {
            let mut pending = user;
            pending.verified = false;
            pending.verification_status = VerificationStatus::Pending;
            pending.rejection_reason = None;
            return (pending, Some(remaining));
        }
        return (decide(&user, decision), Some(remaining));
    }

    let queued = has_pending(queue, &user.name);
    match user.verification_status {
        VerificationStatus::Pending if !queued => {
            // Nothing left to wait for; let them submit again.
            let mut reset = user;
            reset.verification_status = VerificationStatus::None;
            (reset, None)
        }
        VerificationStatus::Pending => (user, None),
        _ if queued => {
            let mut pending = user;
            pending.verified = false;
            pending.verification_status = VerificationStatus::Pending;
            pending.rejection_reason = None;
            (pending, None)
        }
        _ => (user, None),
    }
}
