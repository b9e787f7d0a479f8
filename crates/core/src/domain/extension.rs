use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::authorization::AuthorizationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionId(pub String);

impl ExtensionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ExtensionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExtensionStatus {
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Petition to prolong an authorization's validity. Immutable once decided.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    pub id: ExtensionId,
    pub code: String,
    pub authorization_id: AuthorizationId,
    /// The authorization's expiry at the moment the extension was filed,
    /// kept for audit purposes.
    pub current_expiry: DateTime<Utc>,
    pub requested_expiry: DateTime<Utc>,
    pub justification: String,
    pub requested_by: String,
    pub status: ExtensionStatus,
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub decision_notes: String,
    pub rejection_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtensionRequest {
    pub fn requested_extension_days(&self) -> i64 {
        (self.requested_expiry - self.current_expiry).num_days()
    }
}
