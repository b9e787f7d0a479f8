//! Append-only audit trail for the Request timeline.
//!
//! Every state-changing operation calls an injectable [`EventRecorder`]
//! directly, so trail completeness is enforced at the call sites rather
//! than by persistence hooks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::RequestId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Submitted,
    StatusChanged,
    Assigned,
    Reassigned,
    ReviewStarted,
    DocumentsRequested,
    DocumentsCompleted,
    DocumentAttached,
    DocumentVerified,
    Approved,
    Rejected,
    Escalated,
    EscalationResolved,
    PriorityChanged,
    Expired,
    Comment,
    InternalNote,
    AuthorizationIssued,
    AuthorizationPending,
    AuthorizationRevoked,
    ExtensionRequested,
    ExtensionDecided,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::StatusChanged => "status_changed",
            Self::Assigned => "assigned",
            Self::Reassigned => "reassigned",
            Self::ReviewStarted => "review_started",
            Self::DocumentsRequested => "documents_requested",
            Self::DocumentsCompleted => "documents_completed",
            Self::DocumentAttached => "document_attached",
            Self::DocumentVerified => "document_verified",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::EscalationResolved => "escalation_resolved",
            Self::PriorityChanged => "priority_changed",
            Self::Expired => "expired",
            Self::Comment => "comment",
            Self::InternalNote => "internal_note",
            Self::AuthorizationIssued => "authorization_issued",
            Self::AuthorizationPending => "authorization_pending",
            Self::AuthorizationRevoked => "authorization_revoked",
            Self::ExtensionRequested => "extension_requested",
            Self::ExtensionDecided => "extension_decided",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(Self::Created),
            "submitted" => Some(Self::Submitted),
            "status_changed" => Some(Self::StatusChanged),
            "assigned" => Some(Self::Assigned),
            "reassigned" => Some(Self::Reassigned),
            "review_started" => Some(Self::ReviewStarted),
            "documents_requested" => Some(Self::DocumentsRequested),
            "documents_completed" => Some(Self::DocumentsCompleted),
            "document_attached" => Some(Self::DocumentAttached),
            "document_verified" => Some(Self::DocumentVerified),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "escalated" => Some(Self::Escalated),
            "escalation_resolved" => Some(Self::EscalationResolved),
            "priority_changed" => Some(Self::PriorityChanged),
            "expired" => Some(Self::Expired),
            "comment" => Some(Self::Comment),
            "internal_note" => Some(Self::InternalNote),
            "authorization_issued" => Some(Self::AuthorizationIssued),
            "authorization_pending" => Some(Self::AuthorizationPending),
            "authorization_revoked" => Some(Self::AuthorizationRevoked),
            "extension_requested" => Some(Self::ExtensionRequested),
            "extension_decided" => Some(Self::ExtensionDecided),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub id: String,
    pub request_id: RequestId,
    /// None means the event was generated by the system itself.
    pub actor: Option<String>,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub visible_to_applicant: bool,
    pub internal_only: bool,
    pub recorded_at: DateTime<Utc>,
}

impl RequestEvent {
    pub fn new(
        request_id: RequestId,
        actor: Option<&str>,
        kind: EventKind,
        title: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id,
            actor: actor.map(str::to_owned),
            kind,
            title: title.into(),
            description: String::new(),
            metadata: BTreeMap::new(),
            visible_to_applicant: true,
            internal_only: false,
            recorded_at,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Marks the event as internal: hidden from the applicant timeline.
    pub fn internal(mut self) -> Self {
        self.visible_to_applicant = false;
        self.internal_only = true;
        self
    }
}

pub trait EventRecorder: Send + Sync {
    fn record(&self, event: RequestEvent);
}

/// Buffering recorder. Command handlers pass one through the domain
/// operations, then drain it into durable storage in the same sequence.
#[derive(Clone, Default)]
pub struct InMemoryEventRecorder {
    events: Arc<Mutex<Vec<RequestEvent>>>,
}

impl InMemoryEventRecorder {
    pub fn events(&self) -> Vec<RequestEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn drain(&self) -> Vec<RequestEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventRecorder for InMemoryEventRecorder {
    fn record(&self, event: RequestEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{EventKind, EventRecorder, InMemoryEventRecorder, RequestEvent};
    use crate::domain::request::RequestId;

    #[test]
    fn recorder_keeps_events_in_emission_order() {
        let recorder = InMemoryEventRecorder::default();
        let request_id = RequestId::new();
        let now = Utc::now();

        recorder.record(RequestEvent::new(
            request_id.clone(),
            Some("evaluator-1"),
            EventKind::ReviewStarted,
            "Review started",
            now,
        ));
        recorder.record(
            RequestEvent::new(request_id.clone(), None, EventKind::PriorityChanged, "Priority updated", now)
                .with_metadata("old", "normal")
                .with_metadata("new", "critical")
                .internal(),
        );

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::ReviewStarted);
        assert_eq!(events[1].kind, EventKind::PriorityChanged);
        assert!(events[1].internal_only);
        assert!(!events[1].visible_to_applicant);
        assert_eq!(events[1].metadata.get("new").map(String::as_str), Some("critical"));
    }

    #[test]
    fn drain_empties_the_buffer() {
        let recorder = InMemoryEventRecorder::default();
        recorder.record(RequestEvent::new(
            RequestId::new(),
            None,
            EventKind::Created,
            "Request created",
            Utc::now(),
        ));

        assert_eq!(recorder.drain().len(), 1);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn event_kinds_round_trip_through_their_wire_names() {
        for kind in [
            EventKind::Created,
            EventKind::Submitted,
            EventKind::Approved,
            EventKind::AuthorizationPending,
            EventKind::ExtensionDecided,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("unknown"), None);
    }
}
