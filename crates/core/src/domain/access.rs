use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::authorization::AuthorizationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRecordId(pub String);

impl AccessRecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for AccessRecordId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDirection {
    Entry,
    Exit,
}

impl AccessDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "entry" => Some(Self::Entry),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    Admitted,
    Denied,
    PendingVerification,
}

impl AccessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Denied => "denied",
            Self::PendingVerification => "pending_verification",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admitted" => Some(Self::Admitted),
            "denied" => Some(Self::Denied),
            "pending_verification" => Some(Self::PendingVerification),
            _ => None,
        }
    }
}

/// Verification checklist worked through by the field agent at the gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistFlags {
    pub document_verified: bool,
    pub vehicle_verified: bool,
    pub driver_verified: bool,
}

impl ChecklistFlags {
    pub fn all_passed(&self) -> bool {
        self.document_verified && self.vehicle_verified && self.driver_verified
    }

    pub fn failed_checks(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.document_verified {
            failed.push("document");
        }
        if !self.vehicle_verified {
            failed.push("vehicle");
        }
        if !self.driver_verified {
            failed.push("driver");
        }
        failed
    }
}

/// One physical admission or denial at the gate. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub id: AccessRecordId,
    pub authorization_id: AuthorizationId,
    pub direction: AccessDirection,
    pub vehicle_plate: String,
    pub driver_name: String,
    pub verifying_agent: String,
    pub outcome: AccessOutcome,
    pub checks: ChecklistFlags,
    pub notes: String,
    pub denial_reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscrepancyId(pub String);

impl DiscrepancyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for DiscrepancyId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    VehicleMismatch,
    DriverMismatch,
    ExpiredDocument,
    IllegibleDocument,
    ExpiredAuthorization,
    IncorrectData,
    Other,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VehicleMismatch => "vehicle_mismatch",
            Self::DriverMismatch => "driver_mismatch",
            Self::ExpiredDocument => "expired_document",
            Self::IllegibleDocument => "illegible_document",
            Self::ExpiredAuthorization => "expired_authorization",
            Self::IncorrectData => "incorrect_data",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "vehicle_mismatch" => Some(Self::VehicleMismatch),
            "driver_mismatch" => Some(Self::DriverMismatch),
            "expired_document" => Some(Self::ExpiredDocument),
            "illegible_document" => Some(Self::IllegibleDocument),
            "expired_authorization" => Some(Self::ExpiredAuthorization),
            "incorrect_data" => Some(Self::IncorrectData),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    Reported,
    InReview,
    Resolved,
    Closed,
}

impl DiscrepancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::InReview => "in_review",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "reported" => Some(Self::Reported),
            "in_review" => Some(Self::InReview),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Breach ticket raised against an access record whose checklist failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub id: DiscrepancyId,
    pub code: String,
    pub access_record_id: AccessRecordId,
    pub kind: DiscrepancyKind,
    pub description: String,
    pub reported_by: String,
    pub status: DiscrepancyStatus,
    pub assigned_to: Option<String>,
    pub resolved_by: Option<String>,
    pub resolution: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
