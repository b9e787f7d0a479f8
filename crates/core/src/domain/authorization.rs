use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::{RequestId, VehicleKind};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationId(pub String);

impl AuthorizationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for AuthorizationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque verification key used in public lookup URLs. Random and
/// unguessable; never the human-readable code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationToken(pub String);

impl VerificationToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl Default for VerificationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Active,
    Expired,
    Revoked,
    Consumed,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Consumed => "consumed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            "consumed" => Some(Self::Consumed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedVehicle {
    pub plate: String,
    pub kind: VehicleKind,
    pub driver_name: String,
    pub driver_licence: Option<String>,
}

/// Credential derived from an approved Request. Snapshot fields are copied
/// at issuance and never re-read from the Request; the validity window moves
/// only through the extension workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    pub code: String,
    pub token: VerificationToken,
    pub request_id: RequestId,
    pub company_name: String,
    pub company_tax_id: String,
    pub representative_name: String,
    pub representative_id_number: String,
    pub port_name: String,
    pub place_name: Option<String>,
    pub access_purpose: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub vehicles: Vec<AuthorizedVehicle>,
    pub status: AuthorizationStatus,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_by: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: String,
}

impl Authorization {
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    /// Active status and inside the validity window.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == AuthorizationStatus::Active && self.is_in_window(now)
    }

    pub fn verification_path(&self) -> String {
        format!("/verify/{}", self.token.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Authorization, AuthorizationId, AuthorizationStatus, VerificationToken};
    use crate::domain::request::RequestId;

    fn sample_authorization() -> Authorization {
        let issued = Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap();
        Authorization {
            id: AuthorizationId::new(),
            code: "AUT-2024-001".to_owned(),
            token: VerificationToken::new(),
            request_id: RequestId::new(),
            company_name: "Caribe Logistics".to_owned(),
            company_tax_id: "130-12345-6".to_owned(),
            representative_name: "Marta Reyes".to_owned(),
            representative_id_number: "001-1234567-8".to_owned(),
            port_name: "Puerto Haina".to_owned(),
            place_name: None,
            access_purpose: "Container discharge".to_owned(),
            valid_from: issued + Duration::days(1),
            valid_until: issued + Duration::days(3),
            vehicles: Vec::new(),
            status: AuthorizationStatus::Active,
            issued_by: "evaluator-1".to_owned(),
            issued_at: issued,
            updated_at: issued,
            revoked_by: None,
            revoked_at: None,
            revocation_reason: String::new(),
        }
    }

    #[test]
    fn current_means_active_and_inside_the_window() {
        let authorization = sample_authorization();
        let inside = authorization.valid_from + Duration::hours(2);
        let before = authorization.valid_from - Duration::hours(2);
        let after = authorization.valid_until + Duration::hours(2);

        assert!(authorization.is_current(inside));
        assert!(!authorization.is_current(before));
        assert!(!authorization.is_current(after));
    }

    #[test]
    fn revoked_is_never_current_even_inside_the_window() {
        let mut authorization = sample_authorization();
        authorization.status = AuthorizationStatus::Revoked;
        let inside = authorization.valid_from + Duration::hours(2);
        assert!(!authorization.is_current(inside));
    }

    #[test]
    fn verification_tokens_are_unique_and_opaque() {
        let first = VerificationToken::new();
        let second = VerificationToken::new();
        assert_ne!(first, second);
        assert_eq!(first.0.len(), 32);
        assert!(!first.0.contains('-'));
    }
}
