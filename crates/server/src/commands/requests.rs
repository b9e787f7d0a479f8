use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

use portgate_core::audit::{EventKind, EventRecorder, InMemoryEventRecorder, RequestEvent};
use portgate_core::codes::CodeKind;
use portgate_core::deadline::RequestPriority;
use portgate_core::documents::{DocumentHandle, DocumentMetadata};
use portgate_core::domain::authorization::{Authorization, VerificationToken};
use portgate_core::domain::escalation::{Escalation, EscalationDecision, EscalationId};
use portgate_core::domain::request::{NewRequest, Request, RequestId};
use portgate_core::errors::DomainError;
use portgate_core::escalations::{self, RaiseEscalation};
use portgate_core::issuance;
use portgate_core::lifecycle;
use portgate_core::notify::{Notification, NotificationCode};

use super::{AppServices, CommandError};

#[derive(Clone, Debug)]
pub struct ApprovalOutcome {
    pub request: Request,
    /// None when the approval stands but issuance degraded to
    /// "authorization pending".
    pub authorization: Option<Authorization>,
}

#[derive(Clone, Debug)]
pub struct EscalationOutcome {
    pub escalation: Escalation,
    pub request: Request,
    pub authorization: Option<Authorization>,
}

impl AppServices {
    pub async fn load_request(&self, id: &RequestId) -> Result<Request, CommandError> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| CommandError::not_found("request", id.0.clone()))
    }

    pub async fn create_draft(&self, input: NewRequest) -> Result<Request, CommandError> {
        let now = Utc::now();
        let code = self.codes.allocate(CodeKind::Request, now.year()).await?;
        let request = Request::draft(code, input, now);

        let recorder = InMemoryEventRecorder::default();
        lifecycle::record_creation(&request, &recorder, now);
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;
        Ok(request)
    }

    /// Files the draft. The vessel-uniqueness invariant is validated here,
    /// before anything is persisted.
    pub async fn submit_request(&self, id: &RequestId) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        if let Some(imo_number) = request.imo_number.clone() {
            let conflicts =
                self.requests.active_conflicts_for_vessel(&imo_number, Some(id)).await?;
            lifecycle::ensure_vessel_available(Some(&imo_number), &conflicts)?;
        }

        let recorder = InMemoryEventRecorder::default();
        lifecycle::submit(&mut request, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::RequestReceived)
                .with_context("request_code", request.code.clone())
                .with_context("applicant", request.applicant_party.clone()),
        );
        Ok(request)
    }

    /// Intake routing for a filed submission: into the evaluation queue, or
    /// parked as unassigned when no evaluator is available.
    pub async fn route_intake(
        &self,
        id: &RequestId,
        evaluator_available: bool,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        if evaluator_available {
            lifecycle::mark_pending(&mut request, &recorder, now)?;
        } else {
            lifecycle::mark_unassigned(&mut request, &recorder, now)?;
        }
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;
        Ok(request)
    }

    pub async fn delete_draft(&self, id: &RequestId) -> Result<(), CommandError> {
        let request = self.load_request(id).await?;
        lifecycle::ensure_deletable(&request)?;
        self.requests.delete(id).await?;
        Ok(())
    }

    pub async fn claim_request(
        &self,
        id: &RequestId,
        evaluator: &str,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::start_review(&mut request, evaluator, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::EvaluatorAssigned)
                .with_context("request_code", request.code.clone())
                .with_context("evaluator", evaluator),
        );
        Ok(request)
    }

    /// Approval is one visible sequence: transition, persist, issue the
    /// authorization, notify. A failed issuance degrades to "approved,
    /// authorization pending" instead of rolling the approval back.
    pub async fn approve_request(
        &self,
        id: &RequestId,
        evaluator: &str,
        comments: &str,
    ) -> Result<ApprovalOutcome, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::approve(&mut request, evaluator, comments, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;

        let authorization = self.issue_authorization_guarded(&request, evaluator, now).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::RequestApproved)
                .with_context("request_code", request.code.clone())
                .with_context(
                    "authorization_code",
                    authorization.as_ref().map(|issued| issued.code.clone()).unwrap_or_default(),
                ),
        );
        Ok(ApprovalOutcome { request, authorization })
    }

    pub async fn reject_request(
        &self,
        id: &RequestId,
        evaluator: &str,
        reason: &str,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::reject(&mut request, evaluator, reason, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::RequestRejected)
                .with_context("request_code", request.code.clone())
                .with_context("reason", reason),
        );
        Ok(request)
    }

    pub async fn request_more_documents(
        &self,
        id: &RequestId,
        evaluator: &str,
        missing_items: &str,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::request_documents(&mut request, evaluator, missing_items, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::DocumentsRequested)
                .with_context("request_code", request.code.clone())
                .with_context("missing_items", missing_items),
        );
        Ok(request)
    }

    pub async fn resubmit_documents(
        &self,
        id: &RequestId,
        actor: &str,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::documents_resubmitted(&mut request, actor, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;
        Ok(request)
    }

    pub async fn change_request_priority(
        &self,
        id: &RequestId,
        actor: Option<&str>,
        priority: RequestPriority,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::change_priority(&mut request, actor, priority, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;
        Ok(request)
    }

    pub async fn reassign_evaluator(
        &self,
        id: &RequestId,
        actor: &str,
        evaluator: &str,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::reassign(&mut request, actor, evaluator, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;
        Ok(request)
    }

    /// Attaches a declared document. The store is consulted only for the
    /// handle's existence; file contents never enter the core.
    pub async fn attach_document(
        &self,
        id: &RequestId,
        actor: &str,
        document: DocumentMetadata,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let stored = self
            .documents
            .exists(&document.handle)
            .map_err(|error| CommandError::Repository(error.to_string()))?;
        if !stored {
            return Err(CommandError::Domain(DomainError::NotFound {
                entity: "document",
                key: document.handle.0.clone(),
            }));
        }

        let recorder = InMemoryEventRecorder::default();
        lifecycle::attach_document(&mut request, actor, document, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;
        Ok(request)
    }

    pub async fn verify_document(
        &self,
        id: &RequestId,
        evaluator: &str,
        handle: &DocumentHandle,
    ) -> Result<Request, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;

        let recorder = InMemoryEventRecorder::default();
        lifecycle::verify_document(&mut request, evaluator, handle, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.persist_events(&recorder).await?;
        Ok(request)
    }

    pub async fn escalate_request(
        &self,
        id: &RequestId,
        input: RaiseEscalation,
    ) -> Result<EscalationOutcome, CommandError> {
        let now = Utc::now();
        let mut request = self.load_request(id).await?;
        let code = self.codes.allocate(CodeKind::Escalation, now.year()).await?;

        let recorder = InMemoryEventRecorder::default();
        let escalation = escalations::raise(&mut request, code, input, &recorder, now)?;
        self.requests.save(request.clone()).await?;
        self.escalations.save(escalation.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::EscalationRaised)
                .with_context("request_code", request.code.clone())
                .with_context("escalation_code", escalation.code.clone()),
        );
        Ok(EscalationOutcome { escalation, request, authorization: None })
    }

    pub async fn resolve_escalation(
        &self,
        id: &EscalationId,
        resolver: &str,
        decision: EscalationDecision,
        notes: &str,
        reassign_to: Option<&str>,
    ) -> Result<EscalationOutcome, CommandError> {
        let now = Utc::now();
        let mut escalation = self
            .escalations
            .find_by_id(id)
            .await?
            .ok_or_else(|| CommandError::not_found("escalation", id.0.clone()))?;
        let mut request = self.load_request(&escalation.request_id.clone()).await?;

        let recorder = InMemoryEventRecorder::default();
        let resolution = escalations::resolve(
            &mut escalation,
            &mut request,
            resolver,
            decision,
            notes,
            reassign_to,
            &recorder,
            now,
        )?;
        self.requests.save(request.clone()).await?;
        self.escalations.save(escalation.clone()).await?;
        self.persist_events(&recorder).await?;

        let authorization = if resolution.issue_authorization {
            self.issue_authorization_guarded(&request, resolver, now).await?
        } else {
            None
        };

        self.notify_best_effort(
            Notification::new(NotificationCode::EscalationResolved)
                .with_context("request_code", request.code.clone())
                .with_context("escalation_code", escalation.code.clone())
                .with_context("decision", decision.as_str()),
        );
        Ok(EscalationOutcome { escalation, request, authorization })
    }

    /// The applicant timeline hides internal-only entries.
    pub async fn request_timeline(
        &self,
        id: &RequestId,
        include_internal: bool,
    ) -> Result<Vec<RequestEvent>, CommandError> {
        self.load_request(id).await?;
        let events = self.events.list_for_request(id).await?;
        if include_internal {
            return Ok(events);
        }
        Ok(events.into_iter().filter(|event| event.visible_to_applicant).collect())
    }

    /// Optional reconciliation sweep: only acts when the deployment enabled
    /// auto-expiry; otherwise overdue requests stay visible as overdue.
    pub async fn expire_overdue_requests(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, CommandError> {
        if !self.workflow.auto_expire_overdue_requests {
            return Ok(0);
        }

        let mut expired = 0;
        for mut request in self.requests.list_overdue(now).await? {
            let recorder = InMemoryEventRecorder::default();
            if lifecycle::refresh_expiry(&mut request, &recorder, now, true) {
                self.requests.save(request).await?;
                self.persist_events(&recorder).await?;
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Issuance half of an approval. On repository failure the approval
    /// stands: the degradation is recorded on the timeline and logged, and
    /// the caller gets `None`. Fatal allocator exhaustion still aborts.
    pub(crate) async fn issue_authorization_guarded(
        &self,
        request: &Request,
        issued_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Authorization>, CommandError> {
        let recorder = InMemoryEventRecorder::default();
        let issued: Result<Authorization, CommandError> = async {
            let code = self.codes.allocate(CodeKind::Authorization, now.year()).await?;
            let authorization =
                issuance::issue(request, code, VerificationToken::new(), issued_by, &recorder, now)?;
            self.authorizations.save(authorization.clone()).await?;
            Ok(authorization)
        }
        .await;

        match issued {
            Ok(authorization) => {
                self.persist_events(&recorder).await?;
                Ok(Some(authorization))
            }
            Err(CommandError::Fatal(message)) => Err(CommandError::Fatal(message)),
            Err(error) => {
                warn!(
                    event_name = "issuance.degraded",
                    request_code = request.code.as_str(),
                    error = %error,
                    "authorization issuance failed after approval; flagged as pending"
                );
                let pending = InMemoryEventRecorder::default();
                pending.record(
                    RequestEvent::new(
                        request.id.clone(),
                        None,
                        EventKind::AuthorizationPending,
                        "Authorization issuance pending",
                        now,
                    )
                    .with_description(error.to_string())
                    .internal(),
                );
                self.persist_events(&pending).await?;
                Ok(None)
            }
        }
    }
}
