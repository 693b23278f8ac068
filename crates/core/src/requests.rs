//! Requisition lifecycle engine.
//!
//! Every operation here is pure: it validates, mutates the in-memory
//! `Request`, and reports the notification intents the caller should
//! dispatch after a successful store write. No I/O happens in this module.
//!
//! The approval chain is baked into the trail at submission time, so the
//! engine never needs the policy again: slot 0 is the creator's
//! pre-approved entry, the slots after it are the chain in order, and the
//! final slot always belongs to issuance rather than a plain decision.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::ChainPolicy;
use crate::domain::request::{
    ApprovalStep, Request, RequestId, RequestItem, RequestStatus, RequestType, StepStatus,
};
use crate::domain::role::{Principal, Role};
use crate::errors::RequestError;

/// Workflow moments the notification hub knows how to announce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestEvent {
    Submitted,
    StageAdvanced,
    FullyApproved,
    Rejected,
    Issued,
    Delivered,
    Cancelled,
}

/// A notification intent produced by an engine operation. The engine names
/// who should hear about what; delivery belongs to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Followup {
    NotifyRole { role: Role, event: RequestEvent },
    NotifyUser { user_id: String, event: RequestEvent },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub advanced_to: Option<Role>,
    /// True once every decision stage has approved and only issuance remains.
    pub fully_approved: bool,
    pub followups: Vec<Followup>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueOutcome {
    Finalized { followups: Vec<Followup> },
    /// The request was already Issued or Delivered; nothing changed.
    AlreadyFinal,
}

/// Submission input before any workflow state exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub request_type: RequestType,
    pub title: String,
    pub reason: String,
    /// Required for cash requests. Material requests derive their amount
    /// from the item lines and ignore any submitted value.
    pub amount: Option<Decimal>,
    pub items: Vec<RequestItem>,
    pub needed_by: Option<NaiveDate>,
    pub delivery_location: Option<String>,
}

/// Validates a submission and builds the request with its full approval
/// trail. The first chain role is notified that the request now waits on it.
pub fn submit(
    new_request: NewRequest,
    principal: &Principal,
    policy: &ChainPolicy,
    now: DateTime<Utc>,
) -> Result<(Request, Vec<Followup>), RequestError> {
    let title = new_request.title.trim();
    if title.is_empty() {
        return Err(RequestError::Validation("title must not be blank".to_owned()));
    }
    let reason = new_request.reason.trim();
    if reason.is_empty() {
        return Err(RequestError::Validation("reason must not be blank".to_owned()));
    }

    let amount = match new_request.request_type {
        RequestType::Cash => {
            if !new_request.items.is_empty() {
                return Err(RequestError::Validation(
                    "cash requests do not carry item lines".to_owned(),
                ));
            }
            let amount = new_request
                .amount
                .ok_or_else(|| RequestError::Validation("cash requests need an amount".to_owned()))?;
            if amount <= Decimal::ZERO {
                return Err(RequestError::Validation(
                    "amount must be greater than zero".to_owned(),
                ));
            }
            amount
        }
        RequestType::Material => {
            if new_request.items.is_empty() {
                return Err(RequestError::Validation(
                    "material requests need at least one item".to_owned(),
                ));
            }
            for item in &new_request.items {
                if item.name.trim().is_empty() {
                    return Err(RequestError::Validation(
                        "every item needs a name".to_owned(),
                    ));
                }
                if item.quantity == 0 {
                    return Err(RequestError::Validation(
                        "item quantities must be at least one".to_owned(),
                    ));
                }
            }
            Request::items_total(&new_request.items)
        }
    };

    let chain = policy.chain(new_request.request_type);
    let first_stage = *chain
        .first()
        .ok_or_else(|| RequestError::TrailCorrupt("approval chain is empty".to_owned()))?;

    let mut trail = Vec::with_capacity(chain.len() + 1);
    trail.push(ApprovalStep::approved_by(principal.role, principal.user_id.clone(), now));
    trail.extend(chain.iter().map(|role| ApprovalStep::pending(*role)));

    let request = Request {
        id: RequestId::generate(),
        request_type: new_request.request_type,
        title: title.to_owned(),
        reason: reason.to_owned(),
        amount,
        items: new_request.items,
        status: RequestStatus::Pending,
        current_stage: Some(first_stage),
        trail,
        created_by: principal.user_id.clone(),
        creator_role: principal.role,
        needed_by: new_request.needed_by,
        delivery_location: new_request.delivery_location,
        revision: 0,
        created_at: now,
        updated_at: now,
    };

    let followups =
        vec![Followup::NotifyRole { role: first_stage, event: RequestEvent::Submitted }];
    Ok((request, followups))
}

/// Records an approve/reject decision for the stage the request currently
/// waits on. Out-of-turn actors are refused before anything mutates.
pub fn decide(
    request: &mut Request,
    principal: &Principal,
    decision: Decision,
    now: DateTime<Utc>,
) -> Result<DecisionOutcome, RequestError> {
    if request.status != RequestStatus::Pending {
        return Err(RequestError::InvalidState { status: request.status });
    }

    let index = request.current_step_index().ok_or_else(|| {
        RequestError::TrailCorrupt("pending request without a pending trail slot".to_owned())
    })?;
    let stage_role = request.trail[index].role;
    if request.current_stage != Some(stage_role) {
        return Err(RequestError::TrailCorrupt(format!(
            "current stage {:?} disagrees with the trail, which waits on {:?}",
            request.current_stage, stage_role
        )));
    }
    if principal.role != stage_role {
        return Err(RequestError::OutOfTurn {
            acting: principal.role,
            expected: Some(stage_role),
        });
    }

    let last = request.trail.len() - 1;
    if index == last {
        // The final slot is filled by issuance, never by a decision. A
        // pending request can only end up here through corrupted storage.
        return Err(RequestError::TrailCorrupt(
            "request marked pending but only the issuance slot remains".to_owned(),
        ));
    }

    match decision {
        Decision::Reject => {
            let step = &mut request.trail[index];
            step.status = StepStatus::Rejected;
            step.actor = Some(principal.user_id.clone());
            step.decided_at = Some(now);

            request.status = RequestStatus::Rejected;
            request.current_stage = None;
            request.updated_at = now;

            Ok(DecisionOutcome {
                advanced_to: None,
                fully_approved: false,
                followups: vec![Followup::NotifyUser {
                    user_id: request.created_by.clone(),
                    event: RequestEvent::Rejected,
                }],
            })
        }
        Decision::Approve => {
            {
                let step = &mut request.trail[index];
                step.status = StepStatus::Approved;
                step.actor = Some(principal.user_id.clone());
                step.decided_at = Some(now);
            }

            let next_role = request.trail[index + 1].role;
            request.current_stage = Some(next_role);
            request.updated_at = now;

            if index + 1 == last {
                // Every decision stage has approved; the issuing role takes over.
                request.status = RequestStatus::Approved;
                Ok(DecisionOutcome {
                    advanced_to: Some(next_role),
                    fully_approved: true,
                    followups: vec![
                        Followup::NotifyRole {
                            role: next_role,
                            event: RequestEvent::FullyApproved,
                        },
                        Followup::NotifyUser {
                            user_id: request.created_by.clone(),
                            event: RequestEvent::FullyApproved,
                        },
                    ],
                })
            } else {
                Ok(DecisionOutcome {
                    advanced_to: Some(next_role),
                    fully_approved: false,
                    followups: vec![Followup::NotifyRole {
                        role: next_role,
                        event: RequestEvent::StageAdvanced,
                    }],
                })
            }
        }
    }
}

/// Finalizes a fully-approved request: cash is issued, material is
/// delivered. Calling it again on a finalized request is a harmless no-op.
pub fn issue(
    request: &mut Request,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<IssueOutcome, RequestError> {
    if request.status.is_finalized() {
        return Ok(IssueOutcome::AlreadyFinal);
    }
    if request.status != RequestStatus::Approved {
        return Err(RequestError::InvalidState { status: request.status });
    }

    let index = request.current_step_index().ok_or_else(|| {
        RequestError::TrailCorrupt("approved request without a pending issuance slot".to_owned())
    })?;
    if index != request.trail.len() - 1 {
        return Err(RequestError::TrailCorrupt(
            "approved request still has undecided review stages".to_owned(),
        ));
    }
    let issuing_role = request.trail[index].role;
    if principal.role != issuing_role {
        return Err(RequestError::OutOfTurn {
            acting: principal.role,
            expected: Some(issuing_role),
        });
    }

    let step = &mut request.trail[index];
    step.status = StepStatus::Approved;
    step.actor = Some(principal.user_id.clone());
    step.decided_at = Some(now);

    request.status = match request.request_type {
        RequestType::Cash => RequestStatus::Issued,
        RequestType::Material => RequestStatus::Delivered,
    };
    request.current_stage = None;
    request.updated_at = now;

    let event = match request.request_type {
        RequestType::Cash => RequestEvent::Issued,
        RequestType::Material => RequestEvent::Delivered,
    };
    Ok(IssueOutcome::Finalized {
        followups: vec![Followup::NotifyUser {
            user_id: request.created_by.clone(),
            event,
        }],
    })
}

/// Withdraws a still-pending request. Only the creator may do this.
pub fn cancel(
    request: &mut Request,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<Followup>, RequestError> {
    if principal.user_id != request.created_by {
        return Err(RequestError::NotCreator);
    }
    if request.status != RequestStatus::Pending {
        return Err(RequestError::InvalidState { status: request.status });
    }

    let waiting_on = request.current_stage;
    request.status = RequestStatus::Cancelled;
    request.current_stage = None;
    request.updated_at = now;

    let mut followups = Vec::new();
    if let Some(role) = waiting_on {
        followups.push(Followup::NotifyRole { role, event: RequestEvent::Cancelled });
    }
    Ok(followups)
}
