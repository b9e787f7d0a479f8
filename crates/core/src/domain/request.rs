use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deadline::RequestPriority;
use crate::documents::DocumentMetadata;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Submitted,
    Unassigned,
    Pending,
    InReview,
    DocumentsRequested,
    Approved,
    Rejected,
    Expired,
    Escalated,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Expired)
    }

    /// Filed and awaiting action: everything between submission and a
    /// terminal outcome.
    pub fn is_open(&self) -> bool {
        !self.is_terminal() && *self != Self::Draft
    }

    /// Statuses that count toward the one-active-request-per-vessel
    /// invariant. Approved requests still count because a live
    /// authorization exists for that vessel.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Draft | Self::Rejected | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Unassigned => "unassigned",
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::DocumentsRequested => "documents_requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Escalated => "escalated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "unassigned" => Some(Self::Unassigned),
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "documents_requested" => Some(Self::DocumentsRequested),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Car,
    Truck,
    Pickup,
    Motorcycle,
    SpecialEquipment,
}

impl VehicleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Pickup => "pickup",
            Self::Motorcycle => "motorcycle",
            Self::SpecialEquipment => "special_equipment",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "car" => Some(Self::Car),
            "truck" => Some(Self::Truck),
            "pickup" => Some(Self::Pickup),
            "motorcycle" => Some(Self::Motorcycle),
            "special_equipment" => Some(Self::SpecialEquipment),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub plate: String,
    pub kind: VehicleKind,
    pub driver_name: String,
    pub driver_licence: Option<String>,
}

/// Applicant-declared fields of a new access request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub imo_number: Option<String>,
    pub shipping_line: Option<String>,
    pub applicant_party: String,
    pub applicant_name: String,
    pub applicant_id_number: String,
    pub company_name: String,
    pub company_tax_id: String,
    pub port_name: String,
    pub place_name: Option<String>,
    pub access_purpose: String,
    pub entry_at: DateTime<Utc>,
    pub exit_at: DateTime<Utc>,
    pub description: String,
    pub priority: RequestPriority,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub code: String,
    pub imo_number: Option<String>,
    pub shipping_line: Option<String>,
    pub applicant_party: String,
    pub applicant_name: String,
    pub applicant_id_number: String,
    pub company_name: String,
    pub company_tax_id: String,
    pub port_name: String,
    pub place_name: Option<String>,
    pub access_purpose: String,
    pub entry_at: DateTime<Utc>,
    pub exit_at: DateTime<Utc>,
    pub description: String,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub assigned_evaluator: Option<String>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub evaluation_comments: String,
    pub rejection_reason: String,
    pub due_at: Option<DateTime<Utc>>,
    pub sla_hours: u32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub vehicles: Vec<Vehicle>,
    pub documents: Vec<DocumentMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn draft(code: String, input: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            code,
            imo_number: input.imo_number,
            shipping_line: input.shipping_line,
            applicant_party: input.applicant_party,
            applicant_name: input.applicant_name,
            applicant_id_number: input.applicant_id_number,
            company_name: input.company_name,
            company_tax_id: input.company_tax_id,
            port_name: input.port_name,
            place_name: input.place_name,
            access_purpose: input.access_purpose,
            entry_at: input.entry_at,
            exit_at: input.exit_at,
            description: input.description,
            priority: input.priority,
            status: RequestStatus::Draft,
            assigned_evaluator: None,
            evaluated_at: None,
            evaluation_comments: String::new(),
            rejection_reason: String::new(),
            due_at: None,
            sla_hours: input.priority.sla_hours(),
            submitted_at: None,
            vehicles: input.vehicles,
            documents: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::{
            Approved, DocumentsRequested, Draft, Escalated, Expired, InReview, Pending, Rejected,
            Submitted, Unassigned,
        };

        matches!(
            (self.status, next),
            (Draft, Submitted)
                | (Draft, Pending)
                | (Submitted, Unassigned)
                | (Submitted, Pending)
                | (Submitted, InReview)
                | (Unassigned, Pending)
                | (Unassigned, InReview)
                | (Pending, InReview)
                | (InReview, Approved)
                | (InReview, Rejected)
                | (InReview, DocumentsRequested)
                | (DocumentsRequested, InReview)
                | (Submitted, Escalated)
                | (Unassigned, Escalated)
                | (Pending, Escalated)
                | (InReview, Escalated)
                | (DocumentsRequested, Escalated)
                | (Escalated, Approved)
                | (Escalated, Rejected)
                | (Escalated, DocumentsRequested)
                | (Submitted, Expired)
                | (Unassigned, Expired)
                | (Pending, Expired)
                | (InReview, Expired)
                | (DocumentsRequested, Expired)
                | (Escalated, Expired)
        )
    }

    pub fn transition_to(&mut self, next: RequestStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidRequestTransition { from: self.status, to: next })
    }

    /// Overdue is a read-time predicate, never an automatic transition.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_at {
            Some(due_at) => self.status.is_open() && now > due_at,
            None => false,
        }
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let due_at = self.due_at?;
        if now > due_at {
            return Some(Duration::zero());
        }
        Some(due_at - now)
    }

    pub fn needs_urgent_attention(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_open() {
            return false;
        }
        if self.is_overdue(now) {
            return true;
        }
        if let Some(remaining) = self.time_remaining(now) {
            if remaining < Duration::hours(1) {
                return true;
            }
        }
        matches!(self.priority, RequestPriority::Critical | RequestPriority::Vip)
    }

    pub fn can_be_edited(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Draft | RequestStatus::Submitted | RequestStatus::DocumentsRequested
        )
    }

    /// Once submitted a request is never physically deleted.
    pub fn can_be_deleted(&self) -> bool {
        self.status == RequestStatus::Draft
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{NewRequest, Request, RequestStatus, Vehicle, VehicleKind};
    use crate::deadline::RequestPriority;
    use crate::errors::DomainError;

    fn sample_request(status: RequestStatus) -> Request {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut request = Request::draft(
            "SOL-2024-001".to_owned(),
            NewRequest {
                imo_number: Some("9074729".to_owned()),
                shipping_line: Some("Blue Anchor Lines".to_owned()),
                applicant_party: "user-17".to_owned(),
                applicant_name: "Marta Reyes".to_owned(),
                applicant_id_number: "001-1234567-8".to_owned(),
                company_name: "Caribe Logistics".to_owned(),
                company_tax_id: "130-12345-6".to_owned(),
                port_name: "Puerto Haina".to_owned(),
                place_name: Some("Muelle 3".to_owned()),
                access_purpose: "Container discharge".to_owned(),
                entry_at: Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap(),
                exit_at: Utc.with_ymd_and_hms(2024, 1, 12, 18, 0, 0).unwrap(),
                description: "Unloading operation for vessel call 2024-011".to_owned(),
                priority: RequestPriority::Normal,
                vehicles: vec![Vehicle {
                    plate: "ABC-1234".to_owned(),
                    kind: VehicleKind::Truck,
                    driver_name: "Pedro Soto".to_owned(),
                    driver_licence: Some("LIC-555".to_owned()),
                }],
            },
            now,
        );
        request.status = status;
        request
    }

    #[test]
    fn draft_submits_but_never_jumps_to_review() {
        let mut request = sample_request(RequestStatus::Draft);
        request.transition_to(RequestStatus::Pending).expect("draft -> pending");

        let mut request = sample_request(RequestStatus::Draft);
        let error = request.transition_to(RequestStatus::InReview).expect_err("draft -> in_review");
        assert!(matches!(error, DomainError::InvalidRequestTransition { .. }));
    }

    #[test]
    fn terminal_states_admit_no_outgoing_transition() {
        for terminal in [RequestStatus::Approved, RequestStatus::Rejected, RequestStatus::Expired] {
            let request = sample_request(terminal);
            for next in [
                RequestStatus::Draft,
                RequestStatus::Submitted,
                RequestStatus::Pending,
                RequestStatus::InReview,
                RequestStatus::DocumentsRequested,
                RequestStatus::Approved,
                RequestStatus::Rejected,
                RequestStatus::Expired,
                RequestStatus::Escalated,
            ] {
                assert!(
                    !request.can_transition_to(next),
                    "{terminal:?} must not transition to {next:?}"
                );
            }
        }
    }

    #[test]
    fn every_open_state_can_escalate() {
        for open in [
            RequestStatus::Submitted,
            RequestStatus::Unassigned,
            RequestStatus::Pending,
            RequestStatus::InReview,
            RequestStatus::DocumentsRequested,
        ] {
            assert!(sample_request(open).can_transition_to(RequestStatus::Escalated));
        }
        // at most one open escalation is meaningful
        assert!(!sample_request(RequestStatus::Escalated)
            .can_transition_to(RequestStatus::Escalated));
    }

    #[test]
    fn escalated_returns_only_through_resolution_outcomes() {
        let request = sample_request(RequestStatus::Escalated);
        assert!(request.can_transition_to(RequestStatus::Approved));
        assert!(request.can_transition_to(RequestStatus::Rejected));
        assert!(request.can_transition_to(RequestStatus::DocumentsRequested));
        assert!(!request.can_transition_to(RequestStatus::InReview));
        assert!(!request.can_transition_to(RequestStatus::Pending));
    }

    #[test]
    fn overdue_is_computed_lazily_from_due_time() {
        let mut request = sample_request(RequestStatus::Pending);
        let submitted = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        request.submitted_at = Some(submitted);
        request.due_at = Some(submitted + Duration::hours(24));

        assert!(!request.is_overdue(submitted + Duration::hours(23)));
        assert!(request.is_overdue(submitted + Duration::hours(25)));
        // the status does not change as a side effect of asking
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[test]
    fn terminal_requests_are_never_overdue() {
        let mut request = sample_request(RequestStatus::Approved);
        let due = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        request.due_at = Some(due);
        assert!(!request.is_overdue(due + Duration::hours(5)));
    }

    #[test]
    fn urgency_tracks_priority_and_remaining_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        let mut vip = sample_request(RequestStatus::Pending);
        vip.priority = RequestPriority::Vip;
        vip.due_at = Some(now + Duration::hours(6));
        assert!(vip.needs_urgent_attention(now));

        let mut normal = sample_request(RequestStatus::Pending);
        normal.due_at = Some(now + Duration::minutes(30));
        assert!(normal.needs_urgent_attention(now));

        let mut relaxed = sample_request(RequestStatus::Pending);
        relaxed.due_at = Some(now + Duration::hours(6));
        assert!(!relaxed.needs_urgent_attention(now));
    }

    #[test]
    fn only_drafts_may_be_deleted() {
        assert!(sample_request(RequestStatus::Draft).can_be_deleted());
        for status in [
            RequestStatus::Submitted,
            RequestStatus::Pending,
            RequestStatus::InReview,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ] {
            assert!(!sample_request(status).can_be_deleted());
        }
    }

    #[test]
    fn active_statuses_cover_everything_but_draft_and_closed_outcomes() {
        assert!(!RequestStatus::Draft.is_active());
        assert!(!RequestStatus::Rejected.is_active());
        assert!(!RequestStatus::Expired.is_active());
        for status in [
            RequestStatus::Submitted,
            RequestStatus::Unassigned,
            RequestStatus::Pending,
            RequestStatus::InReview,
            RequestStatus::DocumentsRequested,
            RequestStatus::Escalated,
            RequestStatus::Approved,
        ] {
            assert!(status.is_active(), "{status:?} should count as active");
        }
    }
}
