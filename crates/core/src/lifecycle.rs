//! Request lifecycle commands.
//!
//! Each command validates the transition, mutates the aggregate and records
//! its audit events through the injected [`EventRecorder`]. Persistence and
//! cross-aggregate side effects (authorization issuance, notifications) are
//! orchestrated by the application command handlers, never hidden here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{EventKind, EventRecorder, RequestEvent};
use crate::deadline::{request_due_at, RequestPriority};
use crate::documents::{DocumentHandle, DocumentMetadata};
use crate::domain::request::{Request, RequestStatus};
use crate::errors::DomainError;

/// An existing request that blocks a submission for the same vessel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselConflict {
    pub code: String,
    pub status: RequestStatus,
}

/// Pre-submit invariant: no two active requests may share a vessel IMO.
/// `conflicts` is the caller's lookup of active requests for the same IMO,
/// excluding the candidate itself.
pub fn ensure_vessel_available(
    imo_number: Option<&str>,
    conflicts: &[VesselConflict],
) -> Result<(), DomainError> {
    let Some(imo_number) = imo_number.filter(|imo| !imo.trim().is_empty()) else {
        return Ok(());
    };

    match conflicts.first() {
        Some(conflict) => Err(DomainError::DuplicateVesselRequest {
            imo_number: imo_number.to_owned(),
            existing_code: conflict.code.clone(),
        }),
        None => Ok(()),
    }
}

pub fn record_creation(request: &Request, recorder: &dyn EventRecorder, now: DateTime<Utc>) {
    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(&request.applicant_party),
            EventKind::Created,
            "Request created",
            now,
        )
        .with_description(format!("Request {} was created as a draft", request.code))
        .with_metadata("initial_status", request.status.as_str())
        .with_metadata("port", request.port_name.clone()),
    );
}

/// Files the draft: stamps the submission time and computes the due time
/// from the current priority.
pub fn submit(
    request: &mut Request,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if request.entry_at >= request.exit_at {
        return Err(DomainError::Validation(
            "scheduled exit must be after scheduled entry".to_owned(),
        ));
    }

    let from = request.status;
    request.transition_to(RequestStatus::Submitted)?;
    request.submitted_at = Some(now);
    request.sla_hours = request.priority.sla_hours();
    request.due_at = Some(request_due_at(request.priority, now));
    request.updated_at = now;

    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(&request.applicant_party),
            EventKind::Submitted,
            "Request submitted",
            now,
        )
        .with_description("The request was submitted for evaluation")
        .with_metadata("from", from.as_str())
        .with_metadata("to", request.status.as_str())
        .with_metadata("due_at", request.due_at.map(|due| due.to_rfc3339()).unwrap_or_default()),
    );
    Ok(())
}

/// Intake acknowledgment: the submission enters the evaluation queue.
pub fn mark_pending(
    request: &mut Request,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let from = request.status;
    request.transition_to(RequestStatus::Pending)?;
    request.updated_at = now;
    recorder.record(
        RequestEvent::new(request.id.clone(), None, EventKind::StatusChanged, "Queued for review", now)
            .with_metadata("from", from.as_str())
            .with_metadata("to", request.status.as_str()),
    );
    Ok(())
}

/// Intake found no evaluator to route to.
pub fn mark_unassigned(
    request: &mut Request,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let from = request.status;
    request.transition_to(RequestStatus::Unassigned)?;
    request.updated_at = now;
    recorder.record(
        RequestEvent::new(request.id.clone(), None, EventKind::StatusChanged, "Awaiting assignment", now)
            .with_metadata("from", from.as_str())
            .with_metadata("to", request.status.as_str())
            .internal(),
    );
    Ok(())
}

/// Evaluator self-assignment. First assignment only; a request that already
/// has an evaluator is reassigned through [`reassign`] instead.
pub fn start_review(
    request: &mut Request,
    evaluator: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if request.assigned_evaluator.is_some() {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "first assignment of an already-assigned request",
        });
    }

    let from = request.status;
    request.transition_to(RequestStatus::InReview)?;
    request.assigned_evaluator = Some(evaluator.to_owned());
    request.updated_at = now;

    recorder.record(
        RequestEvent::new(request.id.clone(), Some(evaluator), EventKind::Assigned, "Request assigned", now)
            .with_metadata("evaluator", evaluator)
            .internal(),
    );
    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(evaluator),
            EventKind::ReviewStarted,
            "Review started",
            now,
        )
        .with_description("The evaluator has started reviewing the request")
        .with_metadata("from", from.as_str())
        .with_metadata("to", request.status.as_str()),
    );
    Ok(())
}

pub fn approve(
    request: &mut Request,
    evaluator: &str,
    comments: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if request.status != RequestStatus::InReview {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "approval outside of review",
        });
    }

    let from = request.status;
    request.transition_to(RequestStatus::Approved)?;
    request.evaluated_at = Some(now);
    request.evaluation_comments = comments.to_owned();
    request.updated_at = now;

    recorder.record(
        RequestEvent::new(request.id.clone(), Some(evaluator), EventKind::Approved, "Request approved", now)
            .with_description("The request has been approved")
            .with_metadata("from", from.as_str())
            .with_metadata("to", request.status.as_str()),
    );
    Ok(())
}

pub fn reject(
    request: &mut Request,
    evaluator: &str,
    reason: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if reason.trim().is_empty() {
        return Err(DomainError::Validation("a rejection reason is required".to_owned()));
    }
    if request.status != RequestStatus::InReview {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "rejection outside of review",
        });
    }

    let from = request.status;
    request.transition_to(RequestStatus::Rejected)?;
    request.evaluated_at = Some(now);
    request.rejection_reason = reason.to_owned();
    request.updated_at = now;

    recorder.record(
        RequestEvent::new(request.id.clone(), Some(evaluator), EventKind::Rejected, "Request rejected", now)
            .with_description("The request has been rejected")
            .with_metadata("from", from.as_str())
            .with_metadata("to", request.status.as_str())
            .with_metadata("reason", reason),
    );
    Ok(())
}

pub fn request_documents(
    request: &mut Request,
    evaluator: &str,
    missing_items: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if missing_items.trim().is_empty() {
        return Err(DomainError::Validation(
            "a description of the missing documents is required".to_owned(),
        ));
    }
    if request.status != RequestStatus::InReview {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "document request outside of review",
        });
    }

    let from = request.status;
    request.transition_to(RequestStatus::DocumentsRequested)?;
    request.evaluation_comments = format!("Missing documents: {missing_items}");
    request.updated_at = now;

    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(evaluator),
            EventKind::DocumentsRequested,
            "Additional documents requested",
            now,
        )
        .with_description("Additional documents were requested from the applicant")
        .with_metadata("from", from.as_str())
        .with_metadata("to", request.status.as_str())
        .with_metadata("missing_items", missing_items),
    );
    Ok(())
}

pub fn documents_resubmitted(
    request: &mut Request,
    actor: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let from = request.status;
    request.transition_to(RequestStatus::InReview)?;
    request.updated_at = now;
    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(actor),
            EventKind::DocumentsCompleted,
            "Documents completed",
            now,
        )
        .with_description("The requested documents were provided and the review resumed")
        .with_metadata("from", from.as_str())
        .with_metadata("to", request.status.as_str()),
    );
    Ok(())
}

/// Changing the priority re-triggers the due time computation from the
/// original submission time and records the change with old/new values.
pub fn change_priority(
    request: &mut Request,
    actor: Option<&str>,
    priority: RequestPriority,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if request.status.is_terminal() {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "priority change after a terminal outcome",
        });
    }
    if request.priority == priority {
        return Ok(());
    }

    let previous = request.priority;
    request.priority = priority;
    request.sla_hours = priority.sla_hours();
    if let Some(submitted_at) = request.submitted_at {
        request.due_at = Some(request_due_at(priority, submitted_at));
    }
    request.updated_at = now;

    let mut event =
        RequestEvent::new(request.id.clone(), actor, EventKind::PriorityChanged, "Priority updated", now)
            .with_metadata("old", previous.as_str())
            .with_metadata("new", priority.as_str())
            .internal();
    if let Some(due_at) = request.due_at {
        event = event.with_metadata("due_at", due_at.to_rfc3339());
    }
    recorder.record(event);
    Ok(())
}

/// Hands the case to another evaluator. No status change.
pub fn reassign(
    request: &mut Request,
    actor: &str,
    evaluator: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if request.status.is_terminal() {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "reassignment after a terminal outcome",
        });
    }

    let previous = request.assigned_evaluator.take();
    request.assigned_evaluator = Some(evaluator.to_owned());
    request.updated_at = now;

    recorder.record(
        RequestEvent::new(request.id.clone(), Some(actor), EventKind::Reassigned, "Request reassigned", now)
            .with_metadata("old_evaluator", previous.unwrap_or_default())
            .with_metadata("new_evaluator", evaluator)
            .internal(),
    );
    Ok(())
}

/// Lazy expiry: applies open -> expired only when the deployment opted in.
/// Returns whether the request transitioned.
pub fn refresh_expiry(
    request: &mut Request,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
    auto_expire: bool,
) -> bool {
    if !auto_expire || !request.is_overdue(now) {
        return false;
    }

    let from = request.status;
    if request.transition_to(RequestStatus::Expired).is_err() {
        return false;
    }
    request.updated_at = now;
    recorder.record(
        RequestEvent::new(request.id.clone(), None, EventKind::Expired, "Request expired", now)
            .with_description("The request passed its due time without an evaluation decision")
            .with_metadata("from", from.as_str())
            .with_metadata("to", request.status.as_str()),
    );
    true
}

pub fn attach_document(
    request: &mut Request,
    actor: &str,
    document: DocumentMetadata,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if request.status.is_terminal() {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "document upload after a terminal outcome",
        });
    }
    if request.documents.iter().any(|existing| existing.handle == document.handle) {
        return Err(DomainError::Validation("document handle already attached".to_owned()));
    }

    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(actor),
            EventKind::DocumentAttached,
            "Document uploaded",
            now,
        )
        .with_metadata("kind", document.kind.as_str())
        .with_metadata("name", document.original_name.clone()),
    );
    request.documents.push(document);
    request.updated_at = now;
    Ok(())
}

pub fn verify_document(
    request: &mut Request,
    evaluator: &str,
    handle: &DocumentHandle,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let document = request
        .documents
        .iter_mut()
        .find(|document| document.handle == *handle)
        .ok_or_else(|| DomainError::NotFound { entity: "document", key: handle.0.clone() })?;

    document.verified = true;
    document.verified_by = Some(evaluator.to_owned());
    document.verified_at = Some(now);
    let name = document.original_name.clone();
    request.updated_at = now;

    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(evaluator),
            EventKind::DocumentVerified,
            "Document verified",
            now,
        )
        .with_metadata("name", name)
        .internal(),
    );
    Ok(())
}

/// Free-form narration on the timeline; no state change.
pub fn add_comment(
    request: &Request,
    actor: &str,
    text: &str,
    internal: bool,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::Validation("a comment cannot be empty".to_owned()));
    }

    let kind = if internal { EventKind::InternalNote } else { EventKind::Comment };
    let title = if internal { "Internal note" } else { "Comment added" };
    let mut event = RequestEvent::new(request.id.clone(), Some(actor), kind, title, now)
        .with_description(text);
    if internal {
        event = event.internal();
    }
    recorder.record(event);
    Ok(())
}

pub fn ensure_deletable(request: &Request) -> Result<(), DomainError> {
    if request.can_be_deleted() {
        return Ok(());
    }
    Err(DomainError::StateConflict {
        entity: "request",
        current: request.status.as_str().to_owned(),
        attempted: "deletion of a submitted request",
    })
}
