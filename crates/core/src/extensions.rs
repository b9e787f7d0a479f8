//! Extension workflow: petitions to prolong an authorization's validity.
//! Approval moves only the owning authorization's end; the start and every
//! snapshot field are immutable.

use chrono::{DateTime, Utc};

use crate::audit::{EventKind, EventRecorder, RequestEvent};
use crate::domain::authorization::{Authorization, AuthorizationStatus};
use crate::domain::extension::{ExtensionId, ExtensionRequest, ExtensionStatus};
use crate::errors::DomainError;

pub fn request_extension(
    authorization: &Authorization,
    code: String,
    requested_expiry: DateTime<Utc>,
    justification: &str,
    requested_by: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<ExtensionRequest, DomainError> {
    if matches!(authorization.status, AuthorizationStatus::Revoked | AuthorizationStatus::Consumed) {
        return Err(DomainError::StateConflict {
            entity: "authorization",
            current: authorization.status.as_str().to_owned(),
            attempted: "extension of a closed authorization",
        });
    }
    if requested_expiry <= authorization.valid_until {
        return Err(DomainError::Validation(
            "the requested expiry must be after the current expiry".to_owned(),
        ));
    }
    if justification.trim().is_empty() {
        return Err(DomainError::Validation("an extension justification is required".to_owned()));
    }

    let extension = ExtensionRequest {
        id: ExtensionId::new(),
        code,
        authorization_id: authorization.id.clone(),
        current_expiry: authorization.valid_until,
        requested_expiry,
        justification: justification.to_owned(),
        requested_by: requested_by.to_owned(),
        status: ExtensionStatus::Pending,
        processed_by: None,
        processed_at: None,
        decision_notes: String::new(),
        rejection_reason: String::new(),
        created_at: now,
        updated_at: now,
    };

    recorder.record(
        RequestEvent::new(
            authorization.request_id.clone(),
            Some(requested_by),
            EventKind::ExtensionRequested,
            "Validity extension requested",
            now,
        )
        .with_description(justification)
        .with_metadata("extension_code", extension.code.clone())
        .with_metadata("current_expiry", extension.current_expiry.to_rfc3339())
        .with_metadata("requested_expiry", requested_expiry.to_rfc3339()),
    );

    Ok(extension)
}

/// Grants the extension: the one mutation of an authorization's validity
/// window after issuance.
pub fn approve_extension(
    extension: &mut ExtensionRequest,
    authorization: &mut Authorization,
    approver: &str,
    notes: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    ensure_undecided_and_owned(extension, authorization)?;

    extension.status = ExtensionStatus::Approved;
    extension.processed_by = Some(approver.to_owned());
    extension.processed_at = Some(now);
    extension.decision_notes = notes.to_owned();
    extension.updated_at = now;

    authorization.valid_until = extension.requested_expiry;
    authorization.updated_at = now;

    recorder.record(
        RequestEvent::new(
            authorization.request_id.clone(),
            Some(approver),
            EventKind::ExtensionDecided,
            "Extension approved",
            now,
        )
        .with_description(notes)
        .with_metadata("extension_code", extension.code.clone())
        .with_metadata("decision", "approved")
        .with_metadata("valid_until", authorization.valid_until.to_rfc3339()),
    );
    Ok(())
}

pub fn reject_extension(
    extension: &mut ExtensionRequest,
    authorization: &Authorization,
    approver: &str,
    reason: &str,
    recorder: &dyn EventRecorder,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if reason.trim().is_empty() {
        return Err(DomainError::Validation("a rejection reason is required".to_owned()));
    }
    ensure_undecided_and_owned(extension, authorization)?;

    extension.status = ExtensionStatus::Rejected;
    extension.processed_by = Some(approver.to_owned());
    extension.processed_at = Some(now);
    extension.rejection_reason = reason.to_owned();
    extension.updated_at = now;

    recorder.record(
        RequestEvent::new(
            authorization.request_id.clone(),
            Some(approver),
            EventKind::ExtensionDecided,
            "Extension rejected",
            now,
        )
        .with_description(reason)
        .with_metadata("extension_code", extension.code.clone())
        .with_metadata("decision", "rejected"),
    );
    Ok(())
}

fn ensure_undecided_and_owned(
    extension: &ExtensionRequest,
    authorization: &Authorization,
) -> Result<(), DomainError> {
    if extension.authorization_id != authorization.id {
        return Err(DomainError::Invariant(format!(
            "extension {} does not belong to authorization {}",
            extension.code, authorization.code
        )));
    }
    if extension.status.is_decided() {
        return Err(DomainError::StateConflict {
            entity: "extension_request",
            current: extension.status.as_str().to_owned(),
            attempted: "a second decision",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{approve_extension, reject_extension, request_extension};
    use crate::audit::InMemoryEventRecorder;
    use crate::domain::authorization::{
        Authorization, AuthorizationId, AuthorizationStatus, VerificationToken,
    };
    use crate::domain::extension::ExtensionStatus;
    use crate::domain::request::RequestId;
    use crate::errors::DomainError;

    fn authorization() -> Authorization {
        let issued = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        Authorization {
            id: AuthorizationId::new(),
            code: "AUT-2024-002".to_owned(),
            token: VerificationToken::new(),
            request_id: RequestId::new(),
            company_name: "Atlantic Stevedores".to_owned(),
            company_tax_id: "130-55555-5".to_owned(),
            representative_name: "Rosa Díaz".to_owned(),
            representative_id_number: "002-2222222-2".to_owned(),
            port_name: "Puerto Caucedo".to_owned(),
            place_name: None,
            access_purpose: "Reefer plug-in service".to_owned(),
            valid_from: issued + Duration::days(2),
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
    fn extension_snapshots_the_current_expiry() {
        let recorder = InMemoryEventRecorder::default();
        let authorization = authorization();
        let requested = authorization.valid_until + Duration::days(2);

        let extension = request_extension(
            &authorization,
            "EXT-2024-0001".to_owned(),
            requested,
            "Discharge delayed by port congestion",
            "user-4",
            &recorder,
            Utc::now(),
        )
        .expect("request");

        assert_eq!(extension.status, ExtensionStatus::Pending);
        assert_eq!(extension.current_expiry, authorization.valid_until);
        assert_eq!(extension.requested_expiry, requested);
        assert_eq!(extension.requested_extension_days(), 2);
    }

    #[test]
    fn extension_must_move_the_expiry_forward() {
        let recorder = InMemoryEventRecorder::default();
        let authorization = authorization();
        let error = request_extension(
            &authorization,
            "EXT-2024-0001".to_owned(),
            authorization.valid_until - Duration::hours(1),
            "why not",
            "user-4",
            &recorder,
            Utc::now(),
        )
        .expect_err("backwards");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn revoked_authorizations_cannot_be_extended() {
        let recorder = InMemoryEventRecorder::default();
        let mut authorization = authorization();
        authorization.status = AuthorizationStatus::Revoked;

        let error = request_extension(
            &authorization,
            "EXT-2024-0001".to_owned(),
            authorization.valid_until + Duration::days(1),
            "needs more time",
            "user-4",
            &recorder,
            Utc::now(),
        )
        .expect_err("revoked");
        assert!(matches!(error, DomainError::StateConflict { .. }));
    }

    #[test]
    fn approval_moves_only_the_validity_end() {
        let recorder = InMemoryEventRecorder::default();
        let mut authorization = authorization();
        let untouched = authorization.clone();
        let requested = authorization.valid_until + Duration::days(4);
        let mut extension = request_extension(
            &authorization,
            "EXT-2024-0001".to_owned(),
            requested,
            "Vessel still alongside",
            "user-4",
            &recorder,
            Utc::now(),
        )
        .expect("request");

        approve_extension(
            &mut extension,
            &mut authorization,
            "supervisor-1",
            "Confirmed with berth planning",
            &recorder,
            Utc::now(),
        )
        .expect("approve");

        assert_eq!(extension.status, ExtensionStatus::Approved);
        assert_eq!(authorization.valid_until, requested);
        // everything else is untouched
        assert_eq!(authorization.valid_from, untouched.valid_from);
        assert_eq!(authorization.status, untouched.status);
        assert_eq!(authorization.company_name, untouched.company_name);
        assert_eq!(authorization.vehicles, untouched.vehicles);
        assert_eq!(authorization.token, untouched.token);
    }

    #[test]
    fn rejection_leaves_the_authorization_unchanged() {
        let recorder = InMemoryEventRecorder::default();
        let mut authorization = authorization();
        let untouched = authorization.clone();
        let mut extension = request_extension(
            &authorization,
            "EXT-2024-0001".to_owned(),
            authorization.valid_until + Duration::days(4),
            "Vessel still alongside",
            "user-4",
            &recorder,
            Utc::now(),
        )
        .expect("request");

        reject_extension(
            &mut extension,
            &authorization,
            "supervisor-1",
            "Berth is reassigned from that date",
            &recorder,
            Utc::now(),
        )
        .expect("reject");

        assert_eq!(extension.status, ExtensionStatus::Rejected);
        assert_eq!(extension.rejection_reason, "Berth is reassigned from that date");
        assert_eq!(authorization.valid_until, untouched.valid_until);
        assert_eq!(authorization.updated_at, untouched.updated_at);
    }

    #[test]
    fn a_decided_extension_is_immutable() {
        let recorder = InMemoryEventRecorder::default();
        let mut authorization = authorization();
        let mut extension = request_extension(
            &authorization,
            "EXT-2024-0001".to_owned(),
            authorization.valid_until + Duration::days(1),
            "One more day",
            "user-4",
            &recorder,
            Utc::now(),
        )
        .expect("request");

        reject_extension(&mut extension, &authorization, "supervisor-1", "No capacity", &recorder, Utc::now())
            .expect("reject");

        let error = approve_extension(
            &mut extension,
            &mut authorization,
            "supervisor-1",
            "On second thought",
            &recorder,
            Utc::now(),
        )
        .expect_err("already decided");
        assert!(matches!(error, DomainError::StateConflict { .. }));
    }

    #[test]
    fn decisions_check_extension_ownership() {
        let recorder = InMemoryEventRecorder::default();
        let authorization_a = authorization();
        let mut authorization_b = authorization();
        let mut extension = request_extension(
            &authorization_a,
            "EXT-2024-0001".to_owned(),
            authorization_a.valid_until + Duration::days(1),
            "One more day",
            "user-4",
            &recorder,
            Utc::now(),
        )
        .expect("request");

        let error = approve_extension(
            &mut extension,
            &mut authorization_b,
            "supervisor-1",
            "ok",
            &recorder,
            Utc::now(),
        )
        .expect_err("wrong authorization");
        assert!(matches!(error, DomainError::Invariant(_)));
    }
}
