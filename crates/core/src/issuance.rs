//! Authorization issuance, verification, revocation and gate admissions.
//!
//! Issuance snapshots the approved Request at a single instant; the
//! credential payload is solely the verification URL so an intercepted
//! credential image leaks nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{EventKind, EventRecorder, RequestEvent};
use crate::domain::access::{
    AccessDirection, AccessOutcome, AccessRecord, AccessRecordId, ChecklistFlags, Discrepancy,
    DiscrepancyId, DiscrepancyKind, DiscrepancyStatus,
};
use crate::domain::authorization::{
    Authorization, AuthorizationId, AuthorizationStatus, AuthorizedVehicle, VerificationToken,
};
use crate::domain::request::{Request, RequestStatus};
use crate::errors::DomainError;

/// Mints the credential from an approved request: code, opaque token,
/// snapshot of the applicant-facing fields, and the validity window derived
/// from the scheduled entry/exit pair.
pub fn issue(
    request: &Request,
    code: String,
    token: VerificationToken,
    issued_by: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<Authorization, DomainError> {
    if request.status != RequestStatus::Approved {
        return Err(DomainError::StateConflict {
            entity: "request",
            current: request.status.as_str().to_owned(),
            attempted: "authorization issuance before approval",
        });
    }

    let authorization = Authorization {
        id: AuthorizationId::new(),
        code,
        token,
        request_id: request.id.clone(),
        company_name: request.company_name.clone(),
        company_tax_id: request.company_tax_id.clone(),
        representative_name: request.applicant_name.clone(),
        representative_id_number: request.applicant_id_number.clone(),
        port_name: request.port_name.clone(),
        place_name: request.place_name.clone(),
        access_purpose: request.access_purpose.clone(),
        valid_from: request.entry_at,
        valid_until: request.exit_at,
        vehicles: request
            .vehicles
            .iter()
            .map(|vehicle| AuthorizedVehicle {
                plate: vehicle.plate.clone(),
                kind: vehicle.kind,
                driver_name: vehicle.driver_name.clone(),
                driver_licence: vehicle.driver_licence.clone(),
            })
            .collect(),
        status: AuthorizationStatus::Active,
        issued_by: issued_by.to_owned(),
        issued_at: now,
        updated_at: now,
        revoked_by: None,
        revoked_at: None,
        revocation_reason: String::new(),
    };

    recorder.record(
        RequestEvent::new(
            request.id.clone(),
            Some(issued_by),
            EventKind::AuthorizationIssued,
            "Authorization issued",
            now,
        )
        .with_description("An access authorization was issued for the approved request")
        .with_metadata("authorization_code", authorization.code.clone())
        .with_metadata("valid_from", authorization.valid_from.to_rfc3339())
        .with_metadata("valid_until", authorization.valid_until.to_rfc3339()),
    );

    Ok(authorization)
}

/// The credential payload: a single URL, no embedded PII.
pub fn credential_payload(base_url: &str, authorization: &Authorization) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), authorization.verification_path())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStatus {
    ValidAndActive,
    NotYetValid,
    Expired,
    Revoked,
    NotFound,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidAndActive => "valid-and-active",
            Self::NotYetValid => "not-yet-valid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::NotFound => "not-found",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    /// Whether lazy expiry transitioned the authorization; the caller must
    /// persist the new state before answering.
    pub state_changed: bool,
}

/// Answers a scan. An active authorization past its validity end expires as
/// a side effect of the read, so no caller ever observes a logically-expired
/// authorization reported as active.
pub fn verify(authorization: &mut Authorization, now: DateTime<Utc>) -> VerificationOutcome {
    let mut state_changed = false;
    if authorization.status == AuthorizationStatus::Active && now > authorization.valid_until {
        authorization.status = AuthorizationStatus::Expired;
        authorization.updated_at = now;
        state_changed = true;
    }

    let status = match authorization.status {
        AuthorizationStatus::Revoked => VerificationStatus::Revoked,
        AuthorizationStatus::Expired | AuthorizationStatus::Consumed => VerificationStatus::Expired,
        AuthorizationStatus::Active if now < authorization.valid_from => {
            VerificationStatus::NotYetValid
        }
        AuthorizationStatus::Active => VerificationStatus::ValidAndActive,
    };

    VerificationOutcome { status, state_changed }
}

/// One-way revocation, irrespective of current validity.
pub fn revoke(
    authorization: &mut Authorization,
    actor: &str,
    reason: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if reason.trim().is_empty() {
        return Err(DomainError::Validation("a revocation reason is required".to_owned()));
    }
    if authorization.status == AuthorizationStatus::Revoked {
        return Err(DomainError::StateConflict {
            entity: "authorization",
            current: authorization.status.as_str().to_owned(),
            attempted: "revocation of an already revoked authorization",
        });
    }

    authorization.status = AuthorizationStatus::Revoked;
    authorization.revoked_by = Some(actor.to_owned());
    authorization.revoked_at = Some(now);
    authorization.revocation_reason = reason.to_owned();
    authorization.updated_at = now;

    recorder.record(
        RequestEvent::new(
            authorization.request_id.clone(),
            Some(actor),
            EventKind::AuthorizationRevoked,
            "Authorization revoked",
            now,
        )
        .with_description(reason)
        .with_metadata("authorization_code", authorization.code.clone())
        .internal(),
    );
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateObservation {
    pub direction: AccessDirection,
    pub vehicle_plate: String,
    pub driver_name: String,
    pub verifying_agent: String,
    pub checks: ChecklistFlags,
    pub notes: String,
}

/// Records a physical admission at the gate. Requires a currently valid
/// authorization; the checklist flags are recorded as observed and may still
/// warrant a discrepancy.
pub fn admit(
    authorization: &Authorization,
    observation: GateObservation,
    now: DateTime<Utc>,
) -> Result<AccessRecord, DomainError> {
    if !authorization.is_current(now) {
        return Err(DomainError::StateConflict {
            entity: "authorization",
            current: authorization.status.as_str().to_owned(),
            attempted: "admission against a non-current authorization",
        });
    }

    Ok(AccessRecord {
        id: AccessRecordId::new(),
        authorization_id: authorization.id.clone(),
        direction: observation.direction,
        vehicle_plate: observation.vehicle_plate,
        driver_name: observation.driver_name,
        verifying_agent: observation.verifying_agent,
        outcome: AccessOutcome::Admitted,
        checks: observation.checks,
        notes: observation.notes,
        denial_reason: String::new(),
        recorded_at: now,
    })
}

/// Records a denial. Denials are valid against any authorization state: the
/// gate turns traffic away precisely when the credential does not hold up.
pub fn deny(
    authorization: &Authorization,
    observation: GateObservation,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<AccessRecord, DomainError> {
    if reason.trim().is_empty() {
        return Err(DomainError::Validation("a denial reason is required".to_owned()));
    }

    Ok(AccessRecord {
        id: AccessRecordId::new(),
        authorization_id: authorization.id.clone(),
        direction: observation.direction,
        vehicle_plate: observation.vehicle_plate,
        driver_name: observation.driver_name,
        verifying_agent: observation.verifying_agent,
        outcome: AccessOutcome::Denied,
        checks: observation.checks,
        notes: observation.notes,
        denial_reason: reason.to_owned(),
        recorded_at: now,
    })
}

/// Opens a breach ticket against an access record whose checks failed.
pub fn raise_discrepancy(
    record: &AccessRecord,
    code: String,
    kind: DiscrepancyKind,
    description: &str,
    reported_by: &str,
    now: DateTime<Utc>,
) -> Result<Discrepancy, DomainError> {
    if description.trim().is_empty() {
        return Err(DomainError::Validation("a discrepancy description is required".to_owned()));
    }

    Ok(Discrepancy {
        id: DiscrepancyId::new(),
        code,
        access_record_id: record.id.clone(),
        kind,
        description: description.to_owned(),
        reported_by: reported_by.to_owned(),
        status: DiscrepancyStatus::Reported,
        assigned_to: None,
        resolved_by: None,
        resolution: String::new(),
        resolved_at: None,
        created_at: now,
    })
}

pub fn resolve_discrepancy(
    discrepancy: &mut Discrepancy,
    resolver: &str,
    resolution: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if resolution.trim().is_empty() {
        return Err(DomainError::Validation("a resolution text is required".to_owned()));
    }
    if !matches!(discrepancy.status, DiscrepancyStatus::Reported | DiscrepancyStatus::InReview) {
        return Err(DomainError::StateConflict {
            entity: "discrepancy",
            current: discrepancy.status.as_str().to_owned(),
            attempted: "resolution of a settled discrepancy",
        });
    }

    discrepancy.status = DiscrepancyStatus::Resolved;
    discrepancy.resolved_by = Some(resolver.to_owned());
    discrepancy.resolution = resolution.to_owned();
    discrepancy.resolved_at = Some(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{
        admit, credential_payload, deny, issue, raise_discrepancy, resolve_discrepancy, revoke,
        verify, GateObservation, VerificationStatus,
    };
    use crate::audit::{EventKind, InMemoryEventRecorder};
    use crate::deadline::RequestPriority;
    use crate::domain::access::{AccessDirection, AccessOutcome, ChecklistFlags, DiscrepancyKind};
    use crate::domain::authorization::{Authorization, AuthorizationStatus, VerificationToken};
    use crate::domain::request::{NewRequest, Request, RequestStatus, Vehicle, VehicleKind};
    use crate::errors::DomainError;

    fn approved_request() -> Request {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let mut request = Request::draft(
            "SOL-2024-003".to_owned(),
            NewRequest {
                imo_number: Some("9321483".to_owned()),
                shipping_line: Some("Harbor Star".to_owned()),
                applicant_party: "user-4".to_owned(),
                applicant_name: "Rosa Díaz".to_owned(),
                applicant_id_number: "002-2222222-2".to_owned(),
                company_name: "Atlantic Stevedores".to_owned(),
                company_tax_id: "130-55555-5".to_owned(),
                port_name: "Puerto Caucedo".to_owned(),
                place_name: Some("Container yard".to_owned()),
                access_purpose: "Reefer plug-in service".to_owned(),
                entry_at: Utc.with_ymd_and_hms(2024, 1, 4, 6, 0, 0).unwrap(),
                exit_at: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
                description: "Night shift servicing".to_owned(),
                priority: RequestPriority::High,
                vehicles: vec![Vehicle {
                    plate: "XYZ-9876".to_owned(),
                    kind: VehicleKind::Pickup,
                    driver_name: "Julio Marte".to_owned(),
                    driver_licence: None,
                }],
            },
            now,
        );
        request.status = RequestStatus::Approved;
        request.evaluated_at = Some(now);
        request
    }

    fn issued_authorization() -> Authorization {
        let recorder = InMemoryEventRecorder::default();
        issue(
            &approved_request(),
            "AUT-2024-001".to_owned(),
            VerificationToken::new(),
            "evaluator-1",
            &recorder,
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
        )
        .expect("issue")
    }

    fn observation() -> GateObservation {
        GateObservation {
            direction: AccessDirection::Entry,
            vehicle_plate: "XYZ-9876".to_owned(),
            driver_name: "Julio Marte".to_owned(),
            verifying_agent: "agent-3".to_owned(),
            checks: ChecklistFlags {
                document_verified: true,
                vehicle_verified: true,
                driver_verified: true,
            },
            notes: String::new(),
        }
    }

    #[test]
    fn issuance_snapshots_the_request_and_derives_the_window() {
        let recorder = InMemoryEventRecorder::default();
        let request = approved_request();
        let authorization = issue(
            &request,
            "AUT-2024-001".to_owned(),
            VerificationToken::new(),
            "evaluator-1",
            &recorder,
            Utc::now(),
        )
        .expect("issue");

        assert_eq!(authorization.status, AuthorizationStatus::Active);
        assert_eq!(authorization.valid_from, request.entry_at);
        assert_eq!(authorization.valid_until, request.exit_at);
        assert_eq!(authorization.company_name, request.company_name);
        assert_eq!(authorization.representative_name, request.applicant_name);
        assert_eq!(authorization.vehicles.len(), 1);
        assert_eq!(authorization.vehicles[0].plate, "XYZ-9876");

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::AuthorizationIssued);
    }

    #[test]
    fn issuance_requires_an_approved_request() {
        let recorder = InMemoryEventRecorder::default();
        let mut request = approved_request();
        request.status = RequestStatus::InReview;

        let error = issue(
            &request,
            "AUT-2024-001".to_owned(),
            VerificationToken::new(),
            "evaluator-1",
            &recorder,
            Utc::now(),
        )
        .expect_err("not approved");
        assert!(matches!(error, DomainError::StateConflict { .. }));
    }

    #[test]
    fn credential_payload_is_only_the_verification_url() {
        let authorization = issued_authorization();
        let payload = credential_payload("https://access.port.example/", &authorization);
        assert_eq!(
            payload,
            format!("https://access.port.example/verify/{}", authorization.token.0)
        );
        assert!(!payload.contains(&authorization.company_name));
        assert!(!payload.contains(&authorization.code));
    }

    #[test]
    fn verification_reports_the_window_edges() {
        let mut authorization = issued_authorization();

        let before = authorization.valid_from - Duration::hours(1);
        assert_eq!(verify(&mut authorization, before).status, VerificationStatus::NotYetValid);

        let inside = authorization.valid_from + Duration::hours(2);
        assert_eq!(verify(&mut authorization, inside).status, VerificationStatus::ValidAndActive);
    }

    #[test]
    fn lazy_expiry_persists_and_is_idempotent() {
        let mut authorization = issued_authorization();
        let after = authorization.valid_until + Duration::days(1);

        let first = verify(&mut authorization, after);
        assert_eq!(first.status, VerificationStatus::Expired);
        assert!(first.state_changed);
        assert_eq!(authorization.status, AuthorizationStatus::Expired);

        let second = verify(&mut authorization, after + Duration::days(1));
        assert_eq!(second.status, VerificationStatus::Expired);
        assert!(!second.state_changed);
    }

    #[test]
    fn revoked_authorizations_never_report_active_again() {
        let recorder = InMemoryEventRecorder::default();
        let mut authorization = issued_authorization();
        revoke(&mut authorization, "supervisor-1", "Credential misuse reported", &recorder, Utc::now())
            .expect("revoke");

        let inside = authorization.valid_from + Duration::hours(1);
        assert_eq!(verify(&mut authorization, inside).status, VerificationStatus::Revoked);

        let error = revoke(&mut authorization, "supervisor-1", "again", &recorder, Utc::now())
            .expect_err("double revoke");
        assert!(matches!(error, DomainError::StateConflict { .. }));
    }

    #[test]
    fn revocation_works_past_the_validity_window() {
        let recorder = InMemoryEventRecorder::default();
        let mut authorization = issued_authorization();
        authorization.status = AuthorizationStatus::Expired;

        revoke(&mut authorization, "supervisor-1", "Retroactive investigation", &recorder, Utc::now())
            .expect("revoke expired");
        assert_eq!(authorization.status, AuthorizationStatus::Revoked);
    }

    #[test]
    fn admission_requires_a_current_authorization() {
        let authorization = issued_authorization();
        let inside = authorization.valid_from + Duration::hours(1);
        let record = admit(&authorization, observation(), inside).expect("admit");
        assert_eq!(record.outcome, AccessOutcome::Admitted);
        assert_eq!(record.authorization_id, authorization.id);

        let after = authorization.valid_until + Duration::hours(1);
        let error = admit(&authorization, observation(), after).expect_err("outside window");
        assert!(matches!(error, DomainError::StateConflict { .. }));
    }

    #[test]
    fn denial_records_the_reason_against_any_state() {
        let mut authorization = issued_authorization();
        authorization.status = AuthorizationStatus::Revoked;

        let mut failed = observation();
        failed.checks.driver_verified = false;
        let record = deny(&authorization, failed, "Driver does not match the credential", Utc::now())
            .expect("deny");
        assert_eq!(record.outcome, AccessOutcome::Denied);
        assert_eq!(record.denial_reason, "Driver does not match the credential");
        assert_eq!(record.checks.failed_checks(), vec!["driver"]);
    }

    #[test]
    fn discrepancies_open_against_the_record_and_resolve_once() {
        let authorization = issued_authorization();
        let inside = authorization.valid_from + Duration::hours(1);
        let mut failed = observation();
        failed.checks.vehicle_verified = false;
        let record = admit(&authorization, failed, inside).expect("admit");

        let mut discrepancy = raise_discrepancy(
            &record,
            "DISC-2024-001".to_owned(),
            DiscrepancyKind::VehicleMismatch,
            "Plate differs from the authorized vehicle",
            "agent-3",
            inside,
        )
        .expect("raise");
        assert_eq!(discrepancy.access_record_id, record.id);

        resolve_discrepancy(&mut discrepancy, "supervisor-1", "Vehicle substitution confirmed", inside)
            .expect("resolve");
        let error =
            resolve_discrepancy(&mut discrepancy, "supervisor-1", "again", inside).expect_err("twice");
        assert!(matches!(error, DomainError::StateConflict { .. }));
    }
}
