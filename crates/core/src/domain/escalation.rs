use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deadline::EscalationPriority;
use crate::domain::request::RequestId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscalationId(pub String);

impl EscalationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for EscalationId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationKind {
    VipGovernment,
    ComplexCase,
    SpecialDocumentation,
    OverdueRequest,
    SeriousDiscrepancy,
    ManualReview,
    Other,
}

impl EscalationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VipGovernment => "vip_government",
            Self::ComplexCase => "complex_case",
            Self::SpecialDocumentation => "special_documentation",
            Self::OverdueRequest => "overdue_request",
            Self::SeriousDiscrepancy => "serious_discrepancy",
            Self::ManualReview => "manual_review",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "vip_government" => Some(Self::VipGovernment),
            "complex_case" => Some(Self::ComplexCase),
            "special_documentation" => Some(Self::SpecialDocumentation),
            "overdue_request" => Some(Self::OverdueRequest),
            "serious_discrepancy" => Some(Self::SeriousDiscrepancy),
            "manual_review" => Some(Self::ManualReview),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    InReview,
    Resolved,
    Reassigned,
    Closed,
}

impl EscalationStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Resolved => "resolved",
            Self::Reassigned => "reassigned",
            Self::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "resolved" => Some(Self::Resolved),
            "reassigned" => Some(Self::Reassigned),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationDecision {
    Approve,
    Reject,
    RequestDocuments,
    Reassign,
    Other,
}

impl EscalationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestDocuments => "request_documents",
            Self::Reassign => "reassign",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "request_documents" => Some(Self::RequestDocuments),
            "reassign" => Some(Self::Reassign),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: EscalationId,
    pub code: String,
    pub request_id: RequestId,
    pub kind: EscalationKind,
    pub priority: EscalationPriority,
    pub raised_by: String,
    pub assigned_to: Option<String>,
    pub motive: String,
    pub description: String,
    pub status: EscalationStatus,
    pub decision: Option<EscalationDecision>,
    pub resolution: String,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Escalation {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_settled() && now > self.due_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Escalation, EscalationId, EscalationKind, EscalationStatus};
    use crate::deadline::EscalationPriority;
    use crate::domain::request::RequestId;

    #[test]
    fn settled_escalations_are_never_overdue() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut escalation = Escalation {
            id: EscalationId::new(),
            code: "ESC-2024-001".to_owned(),
            request_id: RequestId::new(),
            kind: EscalationKind::ComplexCase,
            priority: EscalationPriority::High,
            raised_by: "evaluator-1".to_owned(),
            assigned_to: None,
            motive: "Conflicting cargo manifests".to_owned(),
            description: String::new(),
            status: EscalationStatus::Pending,
            decision: None,
            resolution: String::new(),
            resolved_by: None,
            resolved_at: None,
            due_at: created + Duration::hours(4),
            created_at: created,
            updated_at: created,
        };

        let late = created + Duration::hours(8);
        assert!(escalation.is_overdue(late));

        escalation.status = EscalationStatus::Resolved;
        assert!(!escalation.is_overdue(late));
    }
}
