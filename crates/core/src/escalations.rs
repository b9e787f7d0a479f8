//! Supervisor escalations: a Request flagged for supervisor attention spins
//! off a ticket with its own SLA; resolving that ticket writes the decision
//! back into the owning Request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{EventKind, EventRecorder, RequestEvent};
use crate::deadline::{escalation_due_at, EscalationPriority};
use crate::domain::escalation::{
    Escalation, EscalationDecision, EscalationId, EscalationKind, EscalationStatus,
};
use crate::domain::request::{Request, RequestStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiseEscalation {
    pub kind: EscalationKind,
    pub priority: EscalationPriority,
    pub motive: String,
    pub description: String,
    pub raised_by: String,
    pub assigned_to: Option<String>,
}

/// What the command handler must do after a resolution: issue an
/// authorization when the supervisor approved the underlying request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscalationResolution {
    pub decision: EscalationDecision,
    pub issue_authorization: bool,
}

/// Flags the request and opens the supervisor ticket with its own due time.
pub fn raise(
    request: &mut Request,
    code: String,
    input: RaiseEscalation,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<Escalation, DomainError> {
    if input.motive.trim().is_empty() {
        return Err(DomainError::Validation("an escalation motive is required".to_owned()));
    }

    let from = request.status;
    request.transition_to(RequestStatus::Escalated)?;
    request.updated_at = now;

    let escalation = Escalation {
        id: EscalationId::new(),
        code,
        request_id: request.id.clone(),
        kind: input.kind,
        priority: input.priority,
        raised_by: input.raised_by.clone(),
        assigned_to: input.assigned_to,
        motive: input.motive,
        description: input.description,
        status: EscalationStatus::Pending,
        decision: None,
        resolution: String::new(),
        resolved_by: None,
        resolved_at: None,
        due_at: escalation_due_at(input.priority, now),
        created_at: now,
        updated_at: now,
    };

    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(&input.raised_by),
            EventKind::Escalated,
            "Escalated to supervisor",
            now,
        )
        .with_description("The request was escalated for supervisor review")
        .with_metadata("from", from.as_str())
        .with_metadata("to", request.status.as_str())
        .with_metadata("escalation_code", escalation.code.clone())
        .with_metadata("escalation_kind", input.kind.as_str())
        .internal(),
    );

    Ok(escalation)
}

/// Settles the ticket and drives the owning Request accordingly.
///
/// `reassign_to` is only consulted for the reassign decision, which swaps
/// the evaluator without touching the Request status.
pub fn resolve(
    escalation: &mut Escalation,
    request: &mut Request,
    resolver: &str,
    decision: EscalationDecision,
    notes: &str,
    reassign_to: Option<&str>,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<EscalationResolution, DomainError> {
    if escalation.request_id != request.id {
        return Err(DomainError::Invariant(format!(
            "escalation {} does not belong to request {}",
            escalation.code, request.code
        )));
    }
    if escalation.status.is_settled() {
        return Err(DomainError::StateConflict {
            entity: "escalation",
            current: escalation.status.as_str().to_owned(),
            attempted: "resolution of a settled escalation",
        });
    }

    let mut issue_authorization = false;
    match decision {
        EscalationDecision::Approve => {
            request.transition_to(RequestStatus::Approved)?;
            request.assigned_evaluator = Some(resolver.to_owned());
            request.evaluated_at = Some(now);
            request.evaluation_comments =
                format!("Approved via escalation {}: {notes}", escalation.code);
            issue_authorization = true;
        }
        EscalationDecision::Reject => {
            if notes.trim().is_empty() {
                return Err(DomainError::Validation(
                    "a rejection reason is required to resolve with a rejection".to_owned(),
                ));
            }
            request.transition_to(RequestStatus::Rejected)?;
            request.assigned_evaluator = Some(resolver.to_owned());
            request.evaluated_at = Some(now);
            request.rejection_reason = notes.to_owned();
        }
        EscalationDecision::RequestDocuments => {
            if notes.trim().is_empty() {
                return Err(DomainError::Validation(
                    "a description of the missing documents is required".to_owned(),
                ));
            }
            request.transition_to(RequestStatus::DocumentsRequested)?;
            request.evaluation_comments = format!("Missing documents: {notes}");
        }
        EscalationDecision::Reassign => {
            let evaluator = reassign_to.filter(|evaluator| !evaluator.trim().is_empty()).ok_or_else(
                || DomainError::Validation("a target evaluator is required to reassign".to_owned()),
            )?;
            request.assigned_evaluator = Some(evaluator.to_owned());
        }
        EscalationDecision::Other => {}
    }
    request.updated_at = now;

    escalation.status = EscalationStatus::Resolved;
    escalation.decision = Some(decision);
    escalation.resolution = notes.to_owned();
    escalation.resolved_by = Some(resolver.to_owned());
    escalation.resolved_at = Some(now);
    escalation.updated_at = now;

    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(resolver),
            EventKind::EscalationResolved,
            "Escalation resolved",
            now,
        )
        .with_description(notes)
        .with_metadata("escalation_code", escalation.code.clone())
        .with_metadata("decision", decision.as_str())
        .with_metadata("request_status", request.status.as_str())
        .internal(),
    );

    Ok(EscalationResolution { decision, issue_authorization })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{raise, resolve, RaiseEscalation};
    use crate::audit::{EventKind, InMemoryEventRecorder};
    use crate::deadline::{EscalationPriority, RequestPriority};
    use crate::domain::escalation::{EscalationDecision, EscalationKind, EscalationStatus};
    use crate::domain::request::{NewRequest, Request, RequestStatus};
    use crate::errors::DomainError;
    use crate::lifecycle::{start_review, submit};

    fn request_in_review(recorder: &InMemoryEventRecorder) -> Request {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        let mut request = Request::draft(
            "SOL-2024-010".to_owned(),
            NewRequest {
                imo_number: None,
                shipping_line: None,
                applicant_party: "user-9".to_owned(),
                applicant_name: "Luis Peña".to_owned(),
                applicant_id_number: "001-7654321-0".to_owned(),
                company_name: "Muelle Services".to_owned(),
                company_tax_id: "130-99999-1".to_owned(),
                port_name: "Puerto Plata".to_owned(),
                place_name: None,
                access_purpose: "Crane maintenance".to_owned(),
                entry_at: Utc.with_ymd_and_hms(2024, 2, 10, 7, 0, 0).unwrap(),
                exit_at: Utc.with_ymd_and_hms(2024, 2, 10, 19, 0, 0).unwrap(),
                description: "Scheduled maintenance window".to_owned(),
                priority: RequestPriority::High,
                vehicles: Vec::new(),
            },
            now,
        );
        submit(&mut request, recorder, now).expect("submit");
        start_review(&mut request, "evaluator-1", recorder, now).expect("review");
        request
    }

    fn raise_input(priority: EscalationPriority) -> RaiseEscalation {
        RaiseEscalation {
            kind: EscalationKind::ComplexCase,
            priority,
            motive: "Requires supervisor judgment".to_owned(),
            description: "Conflicting documentation from the shipping line".to_owned(),
            raised_by: "evaluator-1".to_owned(),
            assigned_to: Some("supervisor-1".to_owned()),
        }
    }

    #[test]
    fn raising_flags_the_request_and_computes_the_ticket_sla() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = request_in_review(&recorder);
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();

        let escalation = raise(
            &mut request,
            "ESC-2024-001".to_owned(),
            raise_input(EscalationPriority::High),
            &recorder,
            now,
        )
        .expect("raise");

        assert_eq!(request.status, RequestStatus::Escalated);
        assert_eq!(escalation.status, EscalationStatus::Pending);
        // high escalations carry a 4h SLA of their own
        assert_eq!(escalation.due_at, now + Duration::hours(4));

        let escalated: Vec<_> = recorder
            .events()
            .into_iter()
            .filter(|event| event.kind == EventKind::Escalated)
            .collect();
        assert_eq!(escalated.len(), 1);
        assert!(escalated[0].internal_only);
        assert_eq!(
            escalated[0].metadata.get("escalation_code").map(String::as_str),
            Some("ESC-2024-001")
        );
    }

    #[test]
    fn raising_twice_conflicts_while_one_is_open() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = request_in_review(&recorder);
        let now = Utc::now();

        raise(&mut request, "ESC-2024-001".to_owned(), raise_input(EscalationPriority::Medium), &recorder, now)
            .expect("first");
        let error = raise(
            &mut request,
            "ESC-2024-002".to_owned(),
            raise_input(EscalationPriority::Medium),
            &recorder,
            now,
        )
        .expect_err("second");
        assert!(matches!(error, DomainError::InvalidRequestTransition { .. }));
    }

    #[test]
    fn approve_resolution_approves_the_request_and_asks_for_issuance() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = request_in_review(&recorder);
        let now = Utc::now();
        let mut escalation = raise(
            &mut request,
            "ESC-2024-001".to_owned(),
            raise_input(EscalationPriority::Critical),
            &recorder,
            now,
        )
        .expect("raise");

        let resolution = resolve(
            &mut escalation,
            &mut request,
            "supervisor-1",
            EscalationDecision::Approve,
            "Cleared after document review",
            None,
            &recorder,
            now,
        )
        .expect("resolve");

        assert!(resolution.issue_authorization);
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.assigned_evaluator.as_deref(), Some("supervisor-1"));
        assert!(request.evaluation_comments.contains("ESC-2024-001"));
        assert_eq!(escalation.status, EscalationStatus::Resolved);
        assert_eq!(escalation.decision, Some(EscalationDecision::Approve));
        assert!(escalation.resolved_at.is_some());
    }

    #[test]
    fn reject_resolution_requires_notes_and_sets_the_rejection_reason() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = request_in_review(&recorder);
        let now = Utc::now();
        let mut escalation = raise(
            &mut request,
            "ESC-2024-001".to_owned(),
            raise_input(EscalationPriority::Medium),
            &recorder,
            now,
        )
        .expect("raise");

        let error = resolve(
            &mut escalation,
            &mut request,
            "supervisor-1",
            EscalationDecision::Reject,
            " ",
            None,
            &recorder,
            now,
        )
        .expect_err("empty notes");
        assert!(matches!(error, DomainError::Validation(_)));

        resolve(
            &mut escalation,
            &mut request,
            "supervisor-1",
            EscalationDecision::Reject,
            "Vessel is under an active sanction list entry",
            None,
            &recorder,
            now,
        )
        .expect("resolve");

        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(request.rejection_reason, "Vessel is under an active sanction list entry");
    }

    #[test]
    fn reassign_resolution_swaps_the_evaluator_without_changing_status() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = request_in_review(&recorder);
        let now = Utc::now();
        let mut escalation = raise(
            &mut request,
            "ESC-2024-001".to_owned(),
            raise_input(EscalationPriority::Low),
            &recorder,
            now,
        )
        .expect("raise");

        let resolution = resolve(
            &mut escalation,
            &mut request,
            "supervisor-1",
            EscalationDecision::Reassign,
            "Handing to the senior evaluator",
            Some("evaluator-7"),
            &recorder,
            now,
        )
        .expect("resolve");

        assert!(!resolution.issue_authorization);
        assert_eq!(request.status, RequestStatus::Escalated);
        assert_eq!(request.assigned_evaluator.as_deref(), Some("evaluator-7"));
    }

    #[test]
    fn settled_escalations_cannot_be_resolved_again() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = request_in_review(&recorder);
        let now = Utc::now();
        let mut escalation = raise(
            &mut request,
            "ESC-2024-001".to_owned(),
            raise_input(EscalationPriority::Medium),
            &recorder,
            now,
        )
        .expect("raise");

        resolve(
            &mut escalation,
            &mut request,
            "supervisor-1",
            EscalationDecision::RequestDocuments,
            "Port authority clearance letter",
            None,
            &recorder,
            now,
        )
        .expect("first resolution");
        assert_eq!(request.status, RequestStatus::DocumentsRequested);

        let error = resolve(
            &mut escalation,
            &mut request,
            "supervisor-1",
            EscalationDecision::Approve,
            "Changed my mind",
            None,
            &recorder,
            now,
        )
        .expect_err("second resolution");
        assert!(matches!(error, DomainError::StateConflict { .. }));
    }

    #[test]
    fn resolution_checks_ticket_ownership() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = request_in_review(&recorder);
        let mut other = request_in_review(&recorder);
        let now = Utc::now();
        let mut escalation = raise(
            &mut request,
            "ESC-2024-001".to_owned(),
            raise_input(EscalationPriority::Medium),
            &recorder,
            now,
        )
        .expect("raise");

        let error = resolve(
            &mut escalation,
            &mut other,
            "supervisor-1",
            EscalationDecision::Other,
            "n/a",
            None,
            &recorder,
            now,
        )
        .expect_err("wrong request");
        assert!(matches!(error, DomainError::Invariant(_)));
    }
}
